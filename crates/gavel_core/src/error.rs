//! Error types for contract runs.
//!
//! Only two things abort a run: a configuration error (detected entirely
//! before any resource is evaluated) and unrecoverable I/O. A term's condition
//! not being met is recorded in the report, never raised.

use thiserror::Error;

/// Result type for contract operations.
pub type Result<T> = std::result::Result<T, ContractError>;

/// Main error type for contract operations.
#[derive(Error, Debug)]
pub enum ContractError {
    /// Invalid rule configuration: unknown rule name, invalid/missing argument
    /// or a violated argument constraint. Always raised before evaluation.
    #[error("Configuration error at '{path}': {message}")]
    Configuration {
        /// Contract path within the rule file (e.g. `tables.columns`)
        path: String,
        /// Description of the problem
        message: String,
    },

    /// Unrecoverable file store failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ContractError {
    /// Shorthand for a configuration error at a contract path.
    pub fn config(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            path: path.into(),
            message: message.into(),
        }
    }
}
