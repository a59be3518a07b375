//! Error types for Loopr
//!
//! Centralized error handling using thiserror. Protocol problems (a missing or
//! malformed status block) are not errors; they flow through the breaker
//! counters instead.

use thiserror::Error;

/// All error types that can occur in Loopr
#[derive(Debug, Error)]
pub enum LooprError {
    /// Malformed loop configuration (fatal, raised before any invocation)
    #[error("Config error on line {line}: {message}")]
    Config { line: usize, message: String },

    /// Agent session could not be set up or run
    #[error("Agent error: {0}")]
    Agent(String),

    /// Storage/persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid state transition or operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl LooprError {
    /// Build a configuration error for the given 1-based line.
    pub fn config(line: usize, message: impl Into<String>) -> Self {
        LooprError::Config {
            line,
            message: message.into(),
        }
    }
}

/// Result type alias for Loopr operations
pub type Result<T> = std::result::Result<T, LooprError>;
