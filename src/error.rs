//! Errors returned synchronously to callers.
//!
//! Everything that can go wrong talking to an external service degrades to
//! data instead (see [`crate::gateway::ProviderError`]). What remains here are
//! the conditions a caller has to correct.

use thiserror::Error;

use crate::workflow::WorkflowError;

#[derive(Debug, Error)]
pub enum AdvisorError {
    /// Caller precondition violated; rejected before any network activity.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AdvisorError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}
