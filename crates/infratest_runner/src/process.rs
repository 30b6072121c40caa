//! Process-based command runner.
//!
//! Spawns real OS processes through `tokio::process`, capturing stdout and
//! stderr and enforcing the optional per-command timeout.

use std::process::Stdio;

use async_trait::async_trait;
use chrono::Utc;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::config::CommandSpec;
use crate::error::{RunnerError, RunnerResult};
use crate::runner::{CommandRunner, ExecutionResult};

/// Process runner options.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunnerOptions {
    /// Dry-run mode (log commands without executing)
    pub dry_run: bool,
}

impl ProcessRunnerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }
}

/// Runner that executes commands as child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    options: ProcessRunnerOptions,
}

impl ProcessRunner {
    pub fn new(options: ProcessRunnerOptions) -> Self {
        Self { options }
    }

    /// Check if dry-run mode is enabled.
    pub fn is_dry_run(&self) -> bool {
        self.options.dry_run
    }

    fn build_command(&self, spec: &CommandSpec) -> RunnerResult<Command> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &spec.workdir {
            if !dir.is_dir() {
                return Err(RunnerError::InvalidWorkdir(dir.display().to_string()));
            }
            cmd.current_dir(dir);
        }

        Ok(cmd)
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn execute(&self, spec: &CommandSpec) -> RunnerResult<ExecutionResult> {
        if self.options.dry_run {
            info!("[DRY-RUN] Would execute: {}", spec);
            let now = Utc::now();
            return Ok(ExecutionResult {
                exit_code: 0,
                stdout: format!("[DRY-RUN] Command: {}", spec),
                stderr: String::new(),
                started_at: now,
                finished_at: now,
                duration_ms: 0,
            });
        }

        let mut cmd = self.build_command(spec)?;
        debug!("Executing: {}", spec);

        let started_at = Utc::now();
        let child = cmd.spawn().map_err(|e| RunnerError::LaunchFailed {
            program: spec.program.clone(),
            reason: e.to_string(),
        })?;

        // Dropping the pending future on timeout kills the child.
        let output = match spec.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| RunnerError::Timeout(limit.as_secs()))?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| RunnerError::WaitFailed(e.to_string()))?;

        let finished_at = Utc::now();
        let duration_ms = (finished_at - started_at).num_milliseconds().max(0) as u64;
        let exit_code = output.status.code().unwrap_or(-1);

        if exit_code == 0 {
            debug!("{} completed in {}ms", spec.program, duration_ms);
        } else {
            error!(
                "{} failed with exit code {} after {}ms",
                spec.program, exit_code, duration_ms
            );
        }

        Ok(ExecutionResult {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            started_at,
            finished_at,
            duration_ms,
        })
    }

    async fn is_program_available(&self, program: &str) -> bool {
        Command::new(program)
            .arg("version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dry_run_mode() {
        let runner = ProcessRunner::new(ProcessRunnerOptions::new().dry_run());
        assert!(runner.is_dry_run());
        assert!(!ProcessRunner::default().is_dry_run());
    }

    #[tokio::test]
    async fn test_dry_run_does_not_spawn() {
        let runner = ProcessRunner::new(ProcessRunnerOptions::new().dry_run());
        let spec = CommandSpec::new("definitely-not-a-real-binary").arg("init");

        let result = runner.execute(&spec).await.unwrap();

        assert!(result.success());
        assert!(result.stdout.starts_with("[DRY-RUN] Command:"));
        assert!(result.stdout.contains("definitely-not-a-real-binary init"));
    }

    #[tokio::test]
    async fn test_missing_workdir_is_rejected() {
        let runner = ProcessRunner::default();
        let spec = CommandSpec::new("terraform")
            .arg("init")
            .workdir("/no/such/directory/for/infratest");

        let err = runner.execute(&spec).await.unwrap_err();
        assert!(matches!(err, RunnerError::InvalidWorkdir(_)));
    }
}
