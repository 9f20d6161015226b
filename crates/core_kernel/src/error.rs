//! Kernel error type shared by the domain and the API layer

use thiserror::Error;

/// Errors that are not tied to a port
#[derive(Debug, Error)]
pub enum CoreError {
    /// A workflow was asked to move between states that are not adjacent
    #[error("Invalid workflow transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// A setting the process cannot run with
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CoreError {
    pub fn invalid_transition(from: impl Into<String>, to: impl Into<String>) -> Self {
        CoreError::InvalidTransition {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        CoreError::Configuration(message.into())
    }
}
