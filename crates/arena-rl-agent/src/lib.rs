//! Decision agents for arena combat
//!
//! This crate provides the two policy variants and everything around them:
//! - [`TabularPolicy`]: on-device epsilon-greedy Q-learning
//! - [`RemotePolicy`]: delegation to an external learner over [`Transport`]
//! - [`DecisionCycle`]: the two-phase decide/act/observe state machine
//! - [`TableStore`] and [`TableManager`]: private and shared table persistence
//! - [`CombatAgent`]: start and teardown of one agent in a [`World`]

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod agent;
pub mod config;
pub mod cycle;
pub mod manager;
pub mod remote;
pub mod store;
pub mod tabular;
pub mod transport;

// Re-export agents and policies
pub use agent::{CombatAgent, World};
pub use remote::RemotePolicy;
pub use tabular::TabularPolicy;

// Re-export configuration
pub use config::{AgentConfig, CycleConfig, LearningConfig, PolicyVariant, RemoteConfig, TableConfig};

// Re-export cycle and persistence components
pub use cycle::{CycleStats, DecisionCycle, Phase};
pub use manager::{ManagerHandle, Submission, TableManager};
pub use store::{TableMode, TableStore, SHARED_MARKER};
pub use transport::Transport;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        AgentConfig, CombatAgent, DecisionCycle, PolicyVariant, RemotePolicy, TableManager,
        TableStore, TabularPolicy, World,
    };
    pub use arena_rl_core::prelude::*;
}
