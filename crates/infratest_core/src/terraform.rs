//! Terraform invocations and the gated init → validate → plan chain.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use infratest_runner::{CommandRunner, CommandSpec, ExecutionResult};

use crate::environment::Environment;
use crate::result::TestResult;

/// Fixed output of a successful plan; the plan text itself is too noisy.
pub const PLAN_SUCCESS_MESSAGE: &str = "Plan generated successfully";

/// Builds and runs terraform commands against a declaration directory.
#[derive(Clone)]
pub struct TerraformRunner {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl TerraformRunner {
    /// Create a new Terraform runner.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            program: "terraform".to_string(),
        }
    }

    /// Use a different terraform-compatible binary.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run terraform init without backend wiring.
    pub async fn init(&self, working_dir: &Path) -> ExecutionResult {
        info!("Running terraform init in {:?}", working_dir);
        let spec = self
            .command(working_dir)
            .args(["init", "-backend=false", "-input=false", "-no-color"]);
        self.runner.run(&spec).await
    }

    /// Run terraform validate.
    pub async fn validate(&self, working_dir: &Path, timeout: Option<Duration>) -> ExecutionResult {
        info!("Running terraform validate in {:?}", working_dir);
        let spec = self
            .command(working_dir)
            .args(["validate", "-no-color"])
            .maybe_timeout(timeout);
        self.runner.run(&spec).await
    }

    /// Run terraform plan, binding each `(name, value)` with `-var`.
    pub async fn plan(
        &self,
        working_dir: &Path,
        vars: &[(String, String)],
        timeout: Option<Duration>,
    ) -> ExecutionResult {
        info!("Running terraform plan in {:?}", working_dir);
        let mut spec = self
            .command(working_dir)
            .args(["plan", "-no-color", "-input=false", "-lock=false"])
            .maybe_timeout(timeout);
        for (name, value) in vars {
            spec = spec.arg("-var").arg(format!("{}={}", name, value));
        }
        self.runner.run(&spec).await
    }

    /// Run terraform fmt check.
    pub async fn fmt_check(&self, working_dir: &Path) -> ExecutionResult {
        info!("Running terraform fmt check in {:?}", working_dir);
        let spec = self.command(working_dir).args(["fmt", "-check"]);
        self.runner.run(&spec).await
    }

    fn command(&self, working_dir: &Path) -> CommandSpec {
        CommandSpec::new(&self.program)
            .workdir(working_dir)
            .env("TF_IN_AUTOMATION", "1")
    }
}

/// The init → validate → plan sequence for one declaration directory.
///
/// Each step runs only if the previous one passed. When a prerequisite is
/// missing the chain ends with exactly one failing
/// `<label> Terraform Configuration` result.
#[derive(Debug, Clone)]
pub struct TerraformChain {
    label: String,
    dir: PathBuf,
    vars: Vec<(String, String)>,
    validate_timeout: Option<Duration>,
    plan_timeout: Option<Duration>,
    environment: Option<Environment>,
}

impl TerraformChain {
    pub fn new(label: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            dir: dir.into(),
            vars: Vec::new(),
            validate_timeout: None,
            plan_timeout: None,
            environment: None,
        }
    }

    /// Chain for an environment: tagged results, `environment=<dir>` bound
    /// for plan, and the configured timeouts.
    pub fn for_environment(env: Environment, dir: impl Into<PathBuf>) -> Self {
        Self::new(env.display_name(), dir)
            .var("environment", env.dir_name())
            .tagged(env)
    }

    pub fn var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.push((name.into(), value.into()));
        self
    }

    pub fn tagged(mut self, env: Environment) -> Self {
        self.environment = Some(env);
        self
    }

    pub fn timeouts(mut self, validate: Duration, plan: Duration) -> Self {
        self.validate_timeout = Some(validate);
        self.plan_timeout = Some(plan);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Name of the terminal result emitted when the chain stops early.
    pub fn configuration_check_name(&self) -> String {
        format!("{} Terraform Configuration", self.label)
    }

    /// Terminal failing result for a chain that cannot proceed.
    pub fn halted(&self, reason: impl Into<String>) -> TestResult {
        self.tag(TestResult::skipped(self.configuration_check_name(), reason))
    }

    /// Run the chain.
    pub async fn run(&self, terraform: &TerraformRunner) -> Vec<TestResult> {
        let mut results = Vec::new();

        if !self.dir.is_dir() {
            warn!("{} directory not found at {:?}", self.label, self.dir);
            results.push(self.halted(format!(
                "{} directory not found at {}",
                self.label,
                self.dir.display()
            )));
            return results;
        }

        let start = Instant::now();
        let init = terraform.init(&self.dir).await;
        let init_ok = init.success();
        results.push(self.step_result("Init", &init, init.stdout.clone(), "Init failed", start));
        if !init_ok {
            results.push(self.halted("Skipped validate and plan: terraform init did not succeed"));
            return results;
        }

        let start = Instant::now();
        let validate = terraform.validate(&self.dir, self.validate_timeout).await;
        let validate_ok = validate.success();
        results.push(self.step_result(
            "Validate",
            &validate,
            validate.stdout.clone(),
            "Validation failed",
            start,
        ));
        if !validate_ok {
            results.push(self.halted("Skipped plan: terraform validate did not succeed"));
            return results;
        }

        let start = Instant::now();
        let plan = terraform.plan(&self.dir, &self.vars, self.plan_timeout).await;
        results.push(self.step_result(
            "Plan",
            &plan,
            PLAN_SUCCESS_MESSAGE.to_string(),
            "Plan failed",
            start,
        ));

        debug!("{} chain produced {} results", self.label, results.len());
        results
    }

    fn step_result(
        &self,
        step: &str,
        execution: &ExecutionResult,
        success_output: String,
        failure_label: &str,
        start: Instant,
    ) -> TestResult {
        let name = format!("{} Terraform {}", self.label, step);
        let result = if execution.success() {
            TestResult::pass(name, success_output, start.elapsed())
        } else {
            TestResult::fail(
                name,
                format!("{}: {}", failure_label, execution.combined_output()),
                start.elapsed(),
            )
        };
        self.tag(result)
    }

    fn tag(&self, result: TestResult) -> TestResult {
        match self.environment {
            Some(env) => result.for_environment(env),
            None => result,
        }
    }
}
