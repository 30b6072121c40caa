//! # infratest_core
//!
//! Validation of cloud infrastructure declarations.
//!
//! # Features
//!
//! - **Module checks**: required files, `terraform init`, `fmt -check` and
//!   `validate` for every module directory
//! - **Backend checks**: resource group, storage account, encryption,
//!   network rules and state container of the remote-state backend
//! - **Environment checks**: live (cloud query plus init → validate → plan)
//!   or policy (`.tfvars` against the expected profile) per environment
//! - **Reports**: console rendering and timestamped JSON export
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use infratest_core::{HarnessConfig, InfrastructureTestRunner, ValidationMode};
//! use infratest_runner::ProcessRunner;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = HarnessConfig::discover(Path::new("."), None)?;
//!     let mut runner = InfrastructureTestRunner::new(
//!         ".",
//!         config,
//!         ValidationMode::Live,
//!         Arc::new(ProcessRunner::default()),
//!     );
//!
//!     let summary = runner.test_modules().await;
//!     println!("{}/{} passed", summary.passed, summary.total);
//!     Ok(())
//! }
//! ```

pub mod azure;
pub mod backend;
pub mod config;
pub mod environment;
pub mod error;
pub mod modules;
pub mod orchestrator;
pub mod policy;
pub mod report;
pub mod result;
pub mod terraform;
pub mod validator;

pub use azure::{AzureCli, QueryFailure};
pub use backend::BackendValidator;
pub use config::{
    BackendSettings, HarnessConfig, PathsConfig, TimeoutsConfig, ToolsConfig, DEFAULT_CONFIG_FILE,
};
pub use environment::{Environment, EnvironmentConfig, EnvironmentPolicies, ProfileOverride};
pub use error::{InfraError, InfraResult};
pub use modules::{ModuleTester, REQUIRED_MODULE_FILES};
pub use orchestrator::InfrastructureTestRunner;
pub use policy::{DeclaredConfig, DeclaredValue, PolicyValidator};
pub use result::{RunSummary, TestResult};
pub use terraform::{TerraformChain, TerraformRunner, PLAN_SUCCESS_MESSAGE};
pub use validator::{
    validator_for, DevelopmentValidator, EnvironmentValidator, ProductionValidator,
    StagingValidator, ValidationMode,
};
