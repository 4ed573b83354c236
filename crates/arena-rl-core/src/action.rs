//! The closed set of high-level combat actions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ArenaError;

/// High-level behavior an agent can trigger in the host environment.
///
/// The ordinal of each variant is part of the persisted table format and of
/// the wire protocol. Adding a variant changes [`Action::COUNT`] and needs a
/// migration for existing table files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Action {
    /// Swing at the target
    Attack = 0,
    /// Raise the guard for a fixed duration
    Guard = 1,
    /// Dodge roll
    Dodge = 2,
    /// Consume a heal item
    Heal = 3,
    /// Do nothing this cycle
    #[default]
    Wait = 4,
}

impl Action {
    /// Number of actions
    pub const COUNT: usize = 5;

    /// All actions in ordinal order
    pub const ALL: [Action; Self::COUNT] = [
        Action::Attack,
        Action::Guard,
        Action::Dodge,
        Action::Heal,
        Action::Wait,
    ];

    /// Ordinal used in table files and on the wire
    #[must_use]
    pub fn ordinal(self) -> u32 {
        self as u32
    }

    /// Index into per-action arrays
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Stable display name
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Action::Attack => "Attack",
            Action::Guard => "Guard",
            Action::Dodge => "Dodge",
            Action::Heal => "Heal",
            Action::Wait => "Wait",
        }
    }

    /// Actions whose completion is signaled later by the environment
    #[must_use]
    pub fn is_deferred(self) -> bool {
        matches!(self, Action::Attack | Action::Guard | Action::Dodge)
    }
}

impl TryFrom<u32> for Action {
    type Error = ArenaError;

    fn try_from(id: u32) -> Result<Self, Self::Error> {
        usize::try_from(id)
            .ok()
            .and_then(|i| Action::ALL.get(i).copied())
            .ok_or(ArenaError::InvalidActionId(id))
    }
}

impl FromStr for Action {
    type Err = ArenaError;

    /// Parses the stringified ordinal used as an inner key in table files.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id: u32 = s
            .parse()
            .map_err(|_| ArenaError::MalformedTable(format!("action key {s:?} is not an ordinal")))?;
        Action::try_from(id)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
