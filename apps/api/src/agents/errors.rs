use thiserror::Error;

use crate::domain::repositories::StoreError;
use crate::domain::role::AgentRole;

/// Errors that can occur in the agent system
///
/// Tool failures never appear here: they are reported back to the model as
/// failed tool results. These are the errors that abort a phase.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("LLM API error: {0}")]
    LlmError(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Agent not found: {0}")]
    AgentNotFound(AgentRole),

    #[error("Task execution failed: {0}")]
    TaskExecutionFailed(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Message delivery failed: {0}")]
    MessageDeliveryFailed(String),

    #[error("A project is already running: {0}")]
    ProjectInProgress(String),

    #[error("Invalid project: {0}")]
    InvalidProject(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type AgentResult<T> = Result<T, AgentError>;
