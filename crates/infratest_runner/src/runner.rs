//! Command runner trait and types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::config::CommandSpec;
use crate::error::{RunnerError, RunnerResult};

/// Exit code reported when a command could not be launched or timed out.
pub const SYNTHETIC_FAILURE_CODE: i32 = 1;

/// Message placed in stderr when a command exceeds its timeout.
pub const TIMED_OUT_MESSAGE: &str = "Command timed out";

/// Result of command execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Exit code of the process
    pub exit_code: i32,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
    /// Execution start time
    pub started_at: DateTime<Utc>,
    /// Execution end time
    pub finished_at: DateTime<Utc>,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl ExecutionResult {
    /// Build a failed result that never reached (or never left) the process.
    pub fn synthetic_failure(stderr: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            exit_code: SYNTHETIC_FAILURE_CODE,
            stdout: String::new(),
            stderr: stderr.into(),
            started_at: now,
            finished_at: now,
            duration_ms: 0,
        }
    }

    /// Check if execution was successful (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Get combined output (stdout + stderr).
    pub fn combined_output(&self) -> String {
        if self.stdout.is_empty() {
            self.stderr.clone()
        } else if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }

    /// Parse stdout as JSON.
    pub fn stdout_json<T: DeserializeOwned>(&self) -> RunnerResult<T> {
        Ok(serde_json::from_str(&self.stdout)?)
    }
}

/// Runs external commands.
///
/// Implementors provide [`CommandRunner::execute`], which may fail. Callers
/// normally use [`CommandRunner::run`], which never fails: a command that
/// cannot be launched, or that times out, comes back as a non-zero
/// [`ExecutionResult`] with the reason in stderr.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Execute the command exactly once.
    async fn execute(&self, spec: &CommandSpec) -> RunnerResult<ExecutionResult>;

    /// Check whether `program` can be launched at all.
    async fn is_program_available(&self, program: &str) -> bool;

    /// Execute the command, folding every error into the result.
    async fn run(&self, spec: &CommandSpec) -> ExecutionResult {
        match self.execute(spec).await {
            Ok(result) => result,
            Err(RunnerError::Timeout(secs)) => {
                warn!("{} timed out after {}s", spec, secs);
                ExecutionResult::synthetic_failure(TIMED_OUT_MESSAGE)
            }
            Err(e) => {
                error!("Command execution failed: {}", e);
                ExecutionResult::synthetic_failure(e.to_string())
            }
        }
    }
}
