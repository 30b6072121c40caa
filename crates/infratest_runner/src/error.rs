//! Error types for the runner module.

use thiserror::Error;

/// Result type alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Errors that can occur while executing an external command.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Failed to launch {program}: {reason}")]
    LaunchFailed { program: String, reason: String },

    #[error("Command timed out after {0} seconds")]
    Timeout(u64),

    #[error("Failed to wait for process: {0}")]
    WaitFailed(String),

    #[error("Invalid working directory: {0}")]
    InvalidWorkdir(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
