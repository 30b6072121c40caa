//! Runs the checks and owns the collected results.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};
use walkdir::WalkDir;

use infratest_runner::CommandRunner;

use crate::backend::BackendValidator;
use crate::config::HarnessConfig;
use crate::environment::Environment;
use crate::error::{InfraError, InfraResult};
use crate::modules::ModuleTester;
use crate::report;
use crate::result::{RunSummary, TestResult};
use crate::validator::{validator_for, EnvironmentValidator, ValidationMode};

/// Dispatches module, backend and environment checks and accumulates every
/// result they produce, in execution order.
pub struct InfrastructureTestRunner {
    root: PathBuf,
    config: HarnessConfig,
    mode: ValidationMode,
    results: Vec<TestResult>,
    modules: ModuleTester,
    backend: BackendValidator,
    validators: Vec<Box<dyn EnvironmentValidator>>,
}

impl InfrastructureTestRunner {
    /// Create a runner with one validator per environment in `mode`.
    pub fn new(
        root: impl Into<PathBuf>,
        config: HarnessConfig,
        mode: ValidationMode,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let root = root.into();
        let validators = Environment::ALL
            .iter()
            .map(|&env| validator_for(env, mode, &root, &config, runner.clone()))
            .collect();

        Self {
            modules: ModuleTester::new(&root, &config, runner.clone()),
            backend: BackendValidator::new(&root, &config, runner),
            validators,
            results: Vec::new(),
            root,
            config,
            mode,
        }
    }

    /// Replace the validator registered for the same environment, or add it.
    pub fn register_validator(&mut self, validator: Box<dyn EnvironmentValidator>) {
        let env = validator.environment();
        self.validators.retain(|v| v.environment() != env);
        self.validators.push(validator);
    }

    /// Remove the validator for `env`.
    pub fn unregister_validator(&mut self, env: Environment) {
        self.validators.retain(|v| v.environment() != env);
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// Every result recorded so far.
    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    /// Counts over every result recorded so far.
    pub fn summary(&self) -> RunSummary {
        RunSummary::of(&self.results)
    }

    pub async fn test_modules(&mut self) -> RunSummary {
        info!("Running module tests");
        let results = self.modules.test_all_modules().await;
        self.record(results)
    }

    pub async fn test_backend(&mut self) -> RunSummary {
        info!("Running backend validation");
        let results = self.backend.validate_backend().await;
        self.record(results)
    }

    /// Validate every registered environment, development first.
    pub async fn test_all_environments(&mut self) -> RunSummary {
        let environments_root = self.root.join(&self.config.paths.environments);
        if !environments_root.is_dir() {
            warn!("Environments directory not found: {:?}", environments_root);
            return self.record(vec![TestResult::skipped(
                "Environments Directory Check",
                format!("Environments directory not found at {}", environments_root.display()),
            )]);
        }

        self.warn_unregistered(&environments_root);

        let mut added = Vec::new();
        for env in Environment::ALL {
            if let Some(validator) = self.validators.iter().find(|v| v.environment() == env) {
                info!("Validating {} environment", env.display_name());
                added.extend(validator.validate_environment().await);
            }
        }
        self.record(added)
    }

    /// Validate a single environment.
    pub async fn test_environment(&mut self, env: Environment) -> InfraResult<RunSummary> {
        let validator = self
            .validators
            .iter()
            .find(|v| v.environment() == env)
            .ok_or_else(|| InfraError::UnknownEnvironment(env.to_string()))?;

        info!("Validating {} environment", env.display_name());
        let results = validator.validate_environment().await;
        Ok(self.record(results))
    }

    /// Write every recorded result to a timestamped report in `dir`.
    pub fn export_report(&self, dir: &Path) -> InfraResult<PathBuf> {
        report::export(&self.results, dir)
    }

    fn record(&mut self, results: Vec<TestResult>) -> RunSummary {
        let summary = RunSummary::of(&results);
        info!(
            "{} checks: {} passed, {} failed",
            summary.total, summary.passed, summary.failed
        );
        self.results.extend(results);
        summary
    }

    fn warn_unregistered(&self, environments_root: &Path) {
        let known: Vec<&str> = self.validators.iter().map(|v| v.environment().dir_name()).collect();
        let entries = WalkDir::new(environments_root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_dir());

        for entry in entries {
            let name = entry.file_name().to_string_lossy();
            if !known.iter().any(|k| *k == name) {
                warn!("No validator registered for environment directory '{}'", name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use infratest_runner::MockRunner;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    struct Fixed(Environment, bool);

    #[async_trait]
    impl EnvironmentValidator for Fixed {
        fn environment(&self) -> Environment {
            self.0
        }

        async fn validate_environment(&self) -> Vec<TestResult> {
            let name = format!("{} Fixed", self.0.display_name());
            vec![TestResult::new(name, self.1, "", Duration::ZERO).for_environment(self.0)]
        }
    }

    fn runner_at(root: &Path) -> InfrastructureTestRunner {
        InfrastructureTestRunner::new(
            root,
            HarnessConfig::default(),
            ValidationMode::Live,
            Arc::new(MockRunner::new()),
        )
    }

    #[tokio::test]
    async fn test_missing_environments_root() {
        let temp = tempdir().unwrap();
        let mut runner = runner_at(temp.path());

        let summary = runner.test_all_environments().await;

        assert_eq!(summary, RunSummary { total: 1, passed: 0, failed: 1 });
        assert_eq!(runner.results()[0].name(), "Environments Directory Check");
    }

    #[tokio::test]
    async fn test_environments_run_in_order() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("environments").join("qa")).unwrap();
        let mut runner = runner_at(temp.path());
        runner.register_validator(Box::new(Fixed(Environment::Production, true)));
        runner.register_validator(Box::new(Fixed(Environment::Development, false)));
        runner.register_validator(Box::new(Fixed(Environment::Staging, true)));

        let summary = runner.test_all_environments().await;

        let names: Vec<&str> = runner.results().iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["Development Fixed", "Staging Fixed", "Production Fixed"]);
        assert_eq!(summary, RunSummary { total: 3, passed: 2, failed: 1 });
    }

    #[tokio::test]
    async fn test_dispatch_summaries_cover_only_added_results() {
        let temp = tempdir().unwrap();
        let mut runner = runner_at(temp.path());
        runner.register_validator(Box::new(Fixed(Environment::Staging, true)));

        let modules = runner.test_modules().await;
        let staging = runner.test_environment(Environment::Staging).await.unwrap();

        assert_eq!(modules, RunSummary { total: 1, passed: 0, failed: 1 });
        assert_eq!(staging, RunSummary { total: 1, passed: 1, failed: 0 });
        assert_eq!(runner.summary(), RunSummary { total: 2, passed: 1, failed: 1 });
    }

    #[tokio::test]
    async fn test_unregistered_environment() {
        let temp = tempdir().unwrap();
        let mut runner = runner_at(temp.path());
        runner.unregister_validator(Environment::Production);

        let err = runner.test_environment(Environment::Production).await.unwrap_err();
        assert!(matches!(err, InfraError::UnknownEnvironment(name) if name == "prod"));
        assert!(runner.results().is_empty());
    }

    #[tokio::test]
    async fn test_export_report_contains_all_results() {
        let temp = tempdir().unwrap();
        let mut runner = runner_at(temp.path());
        runner.test_modules().await;
        runner.test_backend().await;

        let path = runner.export_report(temp.path()).unwrap();

        let exported = report::load(&path).unwrap();
        assert_eq!(exported.len(), runner.results().len());
        assert_eq!(exported, runner.results());
    }
}
