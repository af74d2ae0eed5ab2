use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The two halves of a session's life: running up to the interrupt, and
/// continuing from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Start,
    Resume,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Start => f.write_str("start"),
            Phase::Resume => f.write_str("resume"),
        }
    }
}

#[derive(Debug, Error)]
pub enum FlowError {
    /// A produced or corrected value is outside its declared range.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Raised by a step; the executor rewraps it as [`FlowError::StepExecution`].
    #[error("Task execution failed: {0}")]
    TaskExecutionFailed(String),

    #[error("Step '{step}' failed during {phase}: {message}")]
    StepExecution {
        phase: Phase,
        step: String,
        message: String,
    },

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session busy: {0}")]
    SessionBusy(String),

    #[error("Invalid workflow: {0}")]
    InvalidWorkflow(String),

    #[error("Invalid checkpoint: {0}")]
    InvalidCheckpoint(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FlowError {
    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FlowError::SessionBusy(_) | FlowError::StepExecution { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
