//! The narrow interface to the host game environment
//!
//! Movement, animation, hit detection and attribute bookkeeping live in the
//! host. The decision cycle only reads normalized observations from it and
//! asks it to begin actions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Action;

/// Identifies one triggered action so its completion signal can be matched
/// to the cycle that started it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActionTicket(pub u64);

impl fmt::Display for ActionTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a triggered action concludes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The action finished inside [`CombatHost::begin_action`]
    Immediate,
    /// The host will signal completion later with the action's ticket
    Deferred,
}

/// What the agent can observe about its target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetStatus {
    /// Health as a fraction of maximum, 0.0 to 1.0
    pub health: f32,
    /// Mid-attack
    pub attacking: bool,
    /// Guarding
    pub guarding: bool,
    /// Dodging
    pub dodging: bool,
}

/// What the agent can observe about itself
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelfStatus {
    /// Health as a fraction of maximum, 0.0 to 1.0
    pub health: f32,
    /// Remaining heal items
    pub heals_left: u32,
}

/// Host environment as seen from the decision cycle
pub trait CombatHost {
    /// Current target observation, `None` when there is no live target
    fn target_status(&self) -> Option<TargetStatus>;

    /// The agent's own health and heal items
    fn self_status(&self) -> SelfStatus;

    /// Distance to the target in world units, `None` without a target
    fn distance_to_target(&self) -> Option<f32>;

    /// Begin executing `action`. A [`Completion::Deferred`] action must later
    /// be reported back with the same `ticket`.
    fn begin_action(&mut self, action: Action, ticket: ActionTicket) -> Completion;
}

/// Capability query used to pick the agent's target among live entities
pub trait Targetable {
    /// Whether this entity is the primary target for combat agents
    fn is_primary_target(&self) -> bool;
}

/// First entity in `entities` that is a primary target
pub fn first_primary_target<'a, T, I>(entities: I) -> Option<&'a T>
where
    T: Targetable + ?Sized + 'a,
    I: IntoIterator<Item = &'a T>,
{
    entities.into_iter().find(|e| e.is_primary_target())
}
