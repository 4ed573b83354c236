//! Simulated environments for arena combat agents
//!
//! The [`Arena`] is a one-on-one duel between the agent's body and a
//! scripted knight. It implements [`arena_rl_core::CombatHost`], so a
//! decision cycle can drive it directly, and reports combat outcomes and
//! action completions as [`ArenaEvent`]s from each tick.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod arena;

pub use arena::{Arena, ArenaConfig, ArenaEvent, Outcome};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{Arena, ArenaConfig, ArenaEvent, Outcome};
    pub use arena_rl_core::prelude::*;
}
