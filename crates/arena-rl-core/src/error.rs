//! Error types for the arena RL core

use thiserror::Error;

/// Core error type for agent operations
#[derive(Error, Debug)]
pub enum ArenaError {
    /// The policy connection could not be opened or failed mid-stream
    #[error("Transport error: {0}")]
    Transport(String),

    /// The policy connection is gone
    #[error("Transport disconnected")]
    Disconnected,

    /// A frame violated the wire protocol
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// An inbound action id outside the declared action range
    #[error("Invalid action id: {0}")]
    InvalidActionId(u32),

    /// A state key that does not decode to exactly one state
    #[error("Malformed state key {key:?}: {reason}")]
    MalformedStateKey {
        /// The offending key
        key: String,
        /// Why decoding failed
        reason: String,
    },

    /// A persisted table document that could not be loaded
    #[error("Malformed table document: {0}")]
    MalformedTable(String),

    /// The shared-table manager is gone and cannot take submissions
    #[error("Table manager has shut down")]
    ManagerClosed,

    /// Invalid agent configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for arena operations
pub type Result<T> = std::result::Result<T, ArenaError>;
