//! Core types for arena combat agents
//!
//! This crate holds the pieces every agent variant shares: the discretized
//! [`State`] used as a learning-table key, the closed [`Action`] set, the
//! [`QTable`] and its flat-file document form, reward accumulation and
//! shaping, the wire protocol spoken with an external policy process, and
//! the seams ([`Policy`], [`CombatHost`]) the decision cycle is built on.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod action;
pub mod environment;
pub mod error;
pub mod observation;
pub mod policy;
pub mod protocol;
pub mod reward;
pub mod state;
pub mod table;
pub mod timer;

// Re-export core traits and types
pub use action::Action;
pub use environment::{first_primary_target, ActionTicket, CombatHost, Completion, SelfStatus, TargetStatus, Targetable};
pub use error::{ArenaError, Result};
pub use observation::StateTracker;
pub use policy::{Policy, Transition};
pub use protocol::{Handshake, TransitionMessage};
pub use reward::{CombatEvent, RewardAccumulator, RewardShaping};
pub use state::State;
pub use table::{ActionValues, QTable};
pub use timer::Timers;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Action, ActionTicket, CombatEvent, CombatHost, Completion, Policy, QTable, Result,
        State, Transition,
    };
}
