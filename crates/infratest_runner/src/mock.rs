//! Mock command runner for testing.
//!
//! Provides a scripted implementation of the CommandRunner trait so that
//! validators can be exercised without `az` or `terraform` installed.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::config::CommandSpec;
use crate::error::{RunnerError, RunnerResult};
use crate::runner::{CommandRunner, ExecutionResult};

/// Predefined outcome for a matched command.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// The process ran and exited.
    Exit {
        exit_code: i32,
        stdout: String,
        stderr: String,
        duration_ms: u64,
    },
    /// The process could not be launched.
    LaunchFailure(String),
    /// The process exceeded its timeout.
    Timeout,
}

impl MockResponse {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self::Exit {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
            duration_ms: 10,
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self::Exit {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
            duration_ms: 10,
        }
    }

    pub fn launch_failure(message: impl Into<String>) -> Self {
        Self::LaunchFailure(message.into())
    }

    pub fn timeout() -> Self {
        Self::Timeout
    }
}

/// Captured call information for verification.
#[derive(Debug, Clone)]
pub struct CapturedCall {
    pub program: String,
    pub args: Vec<String>,
    pub workdir: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
    pub timeout_secs: Option<u64>,
}

impl CapturedCall {
    /// Check whether the captured arguments start with `prefix`.
    pub fn args_start_with(&self, prefix: &[&str]) -> bool {
        prefix.len() <= self.args.len()
            && self.args.iter().zip(prefix).all(|(a, p)| a == p)
    }
}

#[derive(Debug, Clone)]
struct Rule {
    program: String,
    prefix: Vec<String>,
    response: MockResponse,
}

impl Rule {
    fn matches(&self, spec: &CommandSpec) -> bool {
        let prefix: Vec<&str> = self.prefix.iter().map(String::as_str).collect();
        self.program == spec.program && spec.args_start_with(&prefix)
    }
}

/// Mock command runner for testing.
///
/// Rules are matched in registration order on program name and argument
/// prefix; the first match wins. Unmatched commands get the default
/// response, which is a successful exit with empty output.
#[derive(Clone)]
pub struct MockRunner {
    rules: Arc<RwLock<Vec<Rule>>>,
    default_response: Arc<RwLock<MockResponse>>,
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
    unavailable: Arc<RwLock<Vec<String>>>,
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRunner {
    /// Create a new mock runner.
    pub fn new() -> Self {
        Self {
            rules: Arc::new(RwLock::new(Vec::new())),
            default_response: Arc::new(RwLock::new(MockResponse::success(""))),
            captured_calls: Arc::new(RwLock::new(Vec::new())),
            unavailable: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Respond to `program` invoked with arguments starting with `prefix`.
    pub fn on(self, program: &str, prefix: &[&str], response: MockResponse) -> Self {
        self.rules.write().push(Rule {
            program: program.to_string(),
            prefix: prefix.iter().map(|s| s.to_string()).collect(),
            response,
        });
        self
    }

    /// Set the response for commands no rule matches.
    pub fn with_default(self, response: MockResponse) -> Self {
        *self.default_response.write() = response;
        self
    }

    /// Report `program` as not installed.
    pub fn without_program(self, program: &str) -> Self {
        self.unavailable.write().push(program.to_string());
        self
    }

    /// Clear all captured calls.
    pub fn clear_calls(&self) {
        self.captured_calls.write().clear();
    }

    /// Get all captured calls.
    pub fn get_calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.captured_calls.read().len()
    }

    /// Get calls to `program` whose arguments start with `prefix`.
    pub fn calls_to(&self, program: &str, prefix: &[&str]) -> Vec<CapturedCall> {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.program == program && c.args_start_with(prefix))
            .cloned()
            .collect()
    }

    /// Check whether `program` was invoked with arguments starting with `prefix`.
    pub fn was_called(&self, program: &str, prefix: &[&str]) -> bool {
        !self.calls_to(program, prefix).is_empty()
    }

    fn record_call(&self, spec: &CommandSpec) {
        self.captured_calls.write().push(CapturedCall {
            program: spec.program.clone(),
            args: spec.args.clone(),
            workdir: spec.workdir.clone(),
            env: spec.env.clone(),
            timeout_secs: spec.timeout.map(|t| t.as_secs()),
        });
    }

    fn response_for(&self, spec: &CommandSpec) -> MockResponse {
        self.rules
            .read()
            .iter()
            .find(|rule| rule.matches(spec))
            .map(|rule| rule.response.clone())
            .unwrap_or_else(|| self.default_response.read().clone())
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn execute(&self, spec: &CommandSpec) -> RunnerResult<ExecutionResult> {
        self.record_call(spec);

        match self.response_for(spec) {
            MockResponse::Exit {
                exit_code,
                stdout,
                stderr,
                duration_ms,
            } => {
                let started_at = Utc::now();
                let finished_at = started_at + chrono::Duration::milliseconds(duration_ms as i64);
                Ok(ExecutionResult {
                    exit_code,
                    stdout,
                    stderr,
                    started_at,
                    finished_at,
                    duration_ms,
                })
            }
            MockResponse::LaunchFailure(reason) => Err(RunnerError::LaunchFailed {
                program: spec.program.clone(),
                reason,
            }),
            MockResponse::Timeout => Err(RunnerError::Timeout(
                spec.timeout.map(|t| t.as_secs()).unwrap_or_default(),
            )),
        }
    }

    async fn is_program_available(&self, program: &str) -> bool {
        !self.unavailable.read().iter().any(|p| p == program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_runner_basic() {
        let runner =
            MockRunner::new().on("terraform", &["init"], MockResponse::success("Initialized"));

        let spec = CommandSpec::new("terraform").args(["init", "-backend=false"]);
        let result = runner.execute(&spec).await.unwrap();

        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "Initialized");
    }

    #[tokio::test]
    async fn test_first_matching_rule_wins() {
        let runner = MockRunner::new()
            .on("az", &["storage", "account"], MockResponse::failure(3, "denied"))
            .on("az", &["storage"], MockResponse::success("containers"));

        let account = runner
            .run(&CommandSpec::new("az").args(["storage", "account", "show"]))
            .await;
        let container = runner
            .run(&CommandSpec::new("az").args(["storage", "container", "list"]))
            .await;

        assert_eq!(account.exit_code, 3);
        assert_eq!(account.stderr, "denied");
        assert_eq!(container.stdout, "containers");
    }

    #[tokio::test]
    async fn test_mock_runner_captures_calls() {
        let runner = MockRunner::new();

        let spec = CommandSpec::new("terraform")
            .args(["plan", "-var", "environment=dev"])
            .workdir("environments/dev")
            .timeout(std::time::Duration::from_secs(60));
        let _ = runner.run(&spec).await;

        let calls = runner.calls_to("terraform", &["plan"]);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].workdir, Some(PathBuf::from("environments/dev")));
        assert_eq!(calls[0].timeout_secs, Some(60));
        assert!(runner.was_called("terraform", &["plan", "-var"]));
        assert!(!runner.was_called("terraform", &["apply"]));

        runner.clear_calls();
        assert_eq!(runner.call_count(), 0);
    }

    #[tokio::test]
    async fn test_launch_failure_is_folded_by_run() {
        let runner = MockRunner::new()
            .with_default(MockResponse::launch_failure("No such file or directory"));

        let result = runner.run(&CommandSpec::new("terraform").arg("init")).await;

        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("No such file or directory"));
        assert!(result.stdout.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_is_folded_by_run() {
        let runner = MockRunner::new().on("terraform", &["plan"], MockResponse::timeout());

        let spec = CommandSpec::new("terraform")
            .arg("plan")
            .timeout(std::time::Duration::from_secs(60));
        assert!(matches!(runner.execute(&spec).await, Err(RunnerError::Timeout(60))));

        let result = runner.run(&spec).await;
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.stderr, "Command timed out");
    }

    #[tokio::test]
    async fn test_program_availability() {
        let runner = MockRunner::new().without_program("az");

        assert!(!runner.is_program_available("az").await);
        assert!(runner.is_program_available("terraform").await);
    }
}
