//! # infratest_runner
//!
//! External command execution for infratest.
//!
//! Every check the harness performs is an invocation of `az` or `terraform`.
//! This crate turns a structured [`CommandSpec`] into an [`ExecutionResult`]
//! and never lets a launch failure or timeout escape as an error when called
//! through [`CommandRunner::run`].
//!
//! # Features
//!
//! - **Structured commands**: program + argument vector + working directory, no shell strings
//! - **Timeouts**: optional per-command upper bound, the child is killed when it elapses
//! - **Dry-Run Mode**: log commands without executing them
//! - **Mock Runner**: scripted responses for tests without the real tools
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use infratest_runner::{CommandRunner, CommandSpec, ProcessRunner};
//!
//! #[tokio::main]
//! async fn main() {
//!     let runner = ProcessRunner::default();
//!
//!     let spec = CommandSpec::new("terraform")
//!         .args(["validate", "-no-color"])
//!         .workdir("environments/dev")
//!         .timeout(Duration::from_secs(30));
//!
//!     let result = runner.run(&spec).await;
//!     println!("Exit code: {}", result.exit_code);
//! }
//! ```

pub mod config;
pub mod error;
pub mod mock;
pub mod process;
pub mod runner;

pub use config::CommandSpec;
pub use error::{RunnerError, RunnerResult};
pub use mock::{CapturedCall, MockResponse, MockRunner};
pub use process::{ProcessRunner, ProcessRunnerOptions};
pub use runner::{CommandRunner, ExecutionResult, SYNTHETIC_FAILURE_CODE, TIMED_OUT_MESSAGE};
