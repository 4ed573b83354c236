//! Agent configuration

use arena_rl_core::protocol::{DEFAULT_HOST, DEFAULT_PORT};
use arena_rl_core::{ArenaError, RewardShaping};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which policy drives action selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyVariant {
    /// On-device epsilon-greedy Q-learning
    #[default]
    Tabular,
    /// Delegate to an external policy process over the network
    Remote,
}

/// Q-learning hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Learning rate
    pub alpha: f32,
    /// Exploration probability
    pub epsilon: f32,
    /// Discount factor
    pub gamma: f32,
    /// Seed for exploration, random when unset
    pub seed: Option<u64>,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            epsilon: 0.25,
            gamma: 0.95,
            seed: None,
        }
    }
}

/// Decision cadence and geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Seconds between decisions. Unset picks the policy variant's default.
    pub decision_interval: Option<f32>,
    /// Seconds before an unsignaled action is forced to complete
    pub watchdog_timeout: f32,
    /// Seconds the hit-recency flag stays set after a hit
    pub hit_recently_duration: f32,
    /// Distance below which the target counts as in attack range
    pub attack_radius: f32,
    /// Distance below which guarding is considered reasonable
    pub combat_radius: f32,
    /// Consecutive repeats tolerated before the repeat penalty applies
    pub repeat_threshold: u32,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            decision_interval: None,
            watchdog_timeout: 2.0,
            hit_recently_duration: 2.0,
            attack_radius: 300.0,
            combat_radius: 1000.0,
            repeat_threshold: 3,
        }
    }
}

impl CycleConfig {
    /// Decision interval for the tabular variant when none is configured
    pub const TABULAR_INTERVAL: f32 = 1.0;
    /// Decision interval for the remote variant when none is configured
    pub const REMOTE_INTERVAL: f32 = 0.55;

    /// Effective decision interval for `variant`
    #[must_use]
    pub fn interval_for(&self, variant: PolicyVariant) -> f32 {
        self.decision_interval.unwrap_or(match variant {
            PolicyVariant::Tabular => Self::TABULAR_INTERVAL,
            PolicyVariant::Remote => Self::REMOTE_INTERVAL,
        })
    }
}

/// Table persistence settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Table file name. Unset means `<agent>_QTable.json`; a name containing
    /// `shared` (any case) selects the shared table.
    pub table_name: Option<String>,
    /// File the manager persists the merged table to
    pub shared_filename: String,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            table_name: None,
            shared_filename: "SharedQTable.json".to_string(),
        }
    }
}

/// External policy endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Host to connect to
    pub host: String,
    /// Port to connect to
    pub port: u16,
    /// Seconds to wait for the connection to open
    pub connect_timeout: f32,
    /// Send the informational handshake after connecting
    pub handshake: bool,
    /// Seconds to wait for the handshake reply
    pub handshake_timeout: f32,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            connect_timeout: 2.0,
            handshake: true,
            handshake_timeout: 2.0,
        }
    }
}

impl RemoteConfig {
    /// `host:port` form for connecting
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Full configuration of one combat agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Agent name, used for logs and the default table file name
    pub name: String,
    /// Policy variant
    pub policy: PolicyVariant,
    /// Learning hyperparameters
    pub learning: LearningConfig,
    /// Decision cadence and geometry
    pub cycle: CycleConfig,
    /// Table persistence
    pub table: TableConfig,
    /// External policy endpoint
    pub remote: RemoteConfig,
    /// Reward shaping constants
    pub rewards: RewardShaping,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "Enemy".to_string(),
            policy: PolicyVariant::default(),
            learning: LearningConfig::default(),
            cycle: CycleConfig::default(),
            table: TableConfig::default(),
            remote: RemoteConfig::default(),
            rewards: RewardShaping::default(),
        }
    }
}

impl AgentConfig {
    /// Default configuration with the given agent name
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Load from a JSON file. Missing fields keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> arena_rl_core::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Table file name this agent reads and writes
    #[must_use]
    pub fn table_name(&self) -> String {
        self.table
            .table_name
            .clone()
            .unwrap_or_else(|| format!("{}_QTable.json", self.name))
    }

    /// Effective decision interval
    #[must_use]
    pub fn decision_interval(&self) -> f32 {
        self.cycle.interval_for(self.policy)
    }

    /// Reject values the decision cycle cannot run with
    pub fn validate(&self) -> arena_rl_core::Result<()> {
        let fail = |msg: String| Err(ArenaError::Config(msg));
        let LearningConfig {
            alpha,
            epsilon,
            gamma,
            ..
        } = self.learning;

        if self.name.is_empty() {
            return fail("agent name must not be empty".to_string());
        }
        if !(0.0..=1.0).contains(&alpha) {
            return fail(format!("alpha must be within [0, 1], got {alpha}"));
        }
        if !(0.0..=1.0).contains(&epsilon) {
            return fail(format!("epsilon must be within [0, 1], got {epsilon}"));
        }
        if !(0.0..=1.0).contains(&gamma) {
            return fail(format!("gamma must be within [0, 1], got {gamma}"));
        }
        let interval = self.decision_interval();
        if !(interval.is_finite() && interval > 0.0) {
            return fail(format!("decision interval must be positive, got {interval}"));
        }
        let watchdog = self.cycle.watchdog_timeout;
        if !(watchdog.is_finite() && watchdog > 0.0) {
            return fail(format!("watchdog timeout must be positive, got {watchdog}"));
        }
        let RemoteConfig {
            connect_timeout,
            handshake_timeout,
            ..
        } = self.remote;
        if !(connect_timeout.is_finite() && connect_timeout > 0.0) {
            return fail(format!("connect timeout must be positive, got {connect_timeout}"));
        }
        if !(handshake_timeout.is_finite() && handshake_timeout >= 0.0) {
            return fail(format!(
                "handshake timeout must be finite and not negative, got {handshake_timeout}"
            ));
        }
        if self.table.shared_filename.is_empty() {
            return fail("shared filename must not be empty".to_string());
        }
        Ok(())
    }
}
