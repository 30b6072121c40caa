//! Per-environment validation.
//!
//! Two interchangeable semantics implement [`EnvironmentValidator`]:
//!
//! - **live** ([`DevelopmentValidator`], [`StagingValidator`],
//!   [`ProductionValidator`]): query the cloud for the environment's
//!   resource groups, then run terraform init → validate → plan against
//!   `environments/<dir>`.
//! - **policy** ([`crate::policy::PolicyValidator`]): compare the values
//!   declared in the environment's `.tfvars` against its expected
//!   [`crate::environment::EnvironmentConfig`], with no external calls.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use infratest_runner::CommandRunner;

use crate::azure::{AzureCli, QueryFailure};
use crate::config::HarnessConfig;
use crate::environment::Environment;
use crate::error::InfraError;
use crate::policy::PolicyValidator;
use crate::result::TestResult;
use crate::terraform::{TerraformChain, TerraformRunner};

/// Validates one environment.
#[async_trait]
pub trait EnvironmentValidator: Send + Sync {
    /// The environment this validator checks.
    fn environment(&self) -> Environment;

    /// Run every check in order and return their results.
    ///
    /// Never fails: problems become failing results. Each call starts from
    /// scratch, so repeated calls are independent.
    async fn validate_environment(&self) -> Vec<TestResult>;
}

/// Which validator semantics to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Run the cloud CLI and terraform against each environment.
    #[default]
    Live,
    /// Check declared values against the policy table only.
    Policy,
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Policy => write!(f, "policy"),
        }
    }
}

impl FromStr for ValidationMode {
    type Err = InfraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "live" => Ok(Self::Live),
            "policy" => Ok(Self::Policy),
            other => Err(InfraError::InvalidConfiguration(format!(
                "unknown validation mode '{}', expected live or policy",
                other
            ))),
        }
    }
}

/// Whether a failed resource presence check stops the terraform chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PresenceGate {
    /// Record the result and continue.
    Informational,
    /// Stop with one terminal result.
    Required,
}

/// Shared implementation of the three live validators.
struct LiveValidator {
    environment: Environment,
    presence: PresenceGate,
    azure: AzureCli,
    terraform: TerraformRunner,
    chain: TerraformChain,
}

impl LiveValidator {
    fn new(
        environment: Environment,
        presence: PresenceGate,
        root: PathBuf,
        config: &HarnessConfig,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let dir = root.join(config.environment_dir(environment));
        Self {
            environment,
            presence,
            azure: AzureCli::new(runner.clone()).with_program(&config.tools.az),
            terraform: TerraformRunner::new(runner).with_program(&config.tools.terraform),
            chain: TerraformChain::for_environment(environment, dir)
                .timeouts(config.timeouts.validate(), config.timeouts.plan()),
        }
    }

    async fn validate(&self) -> Vec<TestResult> {
        info!("Validating {} environment", self.environment.display_name().to_lowercase());
        let mut results = Vec::new();

        let presence = self.check_resource_groups().await;
        let present = presence.passed();
        results.push(presence);

        if !present && self.presence == PresenceGate::Required {
            results.push(self.chain.halted(format!(
                "Skipped init, validate and plan: no resource groups tagged environment={}",
                self.environment.dir_name()
            )));
            return results;
        }

        results.extend(self.chain.run(&self.terraform).await);
        results
    }

    async fn check_resource_groups(&self) -> TestResult {
        let start = Instant::now();
        let name = format!("{} Resource Groups", self.environment.display_name());
        let env_label = self.environment.display_name();

        let tag = match self.presence {
            PresenceGate::Informational => None,
            PresenceGate::Required => Some(("environment", self.environment.dir_name())),
        };

        let result = match self.azure.group_list(tag).await {
            Ok(groups) => {
                let count = groups.as_array().map(Vec::len).unwrap_or(0);
                if count > 0 {
                    let output = format!(
                        "{} resource groups found and configured correctly ({})",
                        env_label, count
                    );
                    TestResult::pass(name, output, start.elapsed())
                } else {
                    let output = format!("No {} resource groups found", env_label);
                    TestResult::fail(name, output, start.elapsed())
                }
            }
            Err(QueryFailure::Command(stderr)) => {
                TestResult::fail(name, format!("Failed: {}", stderr), start.elapsed())
            }
            Err(QueryFailure::Parse(e)) => TestResult::fail(
                name,
                format!("Failed to parse resource group list: {}", e),
                start.elapsed(),
            ),
        };
        result.for_environment(self.environment)
    }
}

macro_rules! live_validator {
    ($(#[$doc:meta])* $name:ident, $env:expr, $gate:expr) => {
        $(#[$doc])*
        pub struct $name {
            inner: LiveValidator,
        }

        impl $name {
            /// `root` is the harness root the configured paths are relative to.
            pub fn new(
                root: impl Into<PathBuf>,
                config: &HarnessConfig,
                runner: Arc<dyn CommandRunner>,
            ) -> Self {
                Self {
                    inner: LiveValidator::new($env, $gate, root.into(), config, runner),
                }
            }
        }

        #[async_trait]
        impl EnvironmentValidator for $name {
            fn environment(&self) -> Environment {
                $env
            }

            async fn validate_environment(&self) -> Vec<TestResult> {
                self.inner.validate().await
            }
        }
    };
}

live_validator!(
    /// Development: any resource group counts as presence, and a missing
    /// group does not stop the terraform chain.
    DevelopmentValidator,
    Environment::Development,
    PresenceGate::Informational
);

live_validator!(
    /// Staging: requires resource groups tagged `environment=staging`
    /// before running terraform.
    StagingValidator,
    Environment::Staging,
    PresenceGate::Required
);

live_validator!(
    /// Production: requires resource groups tagged `environment=prod`
    /// before running terraform.
    ProductionValidator,
    Environment::Production,
    PresenceGate::Required
);

/// Build the validator for `env` in the given mode.
pub fn validator_for(
    env: Environment,
    mode: ValidationMode,
    root: impl Into<PathBuf>,
    config: &HarnessConfig,
    runner: Arc<dyn CommandRunner>,
) -> Box<dyn EnvironmentValidator> {
    let root = root.into();
    match (mode, env) {
        (ValidationMode::Live, Environment::Development) => {
            Box::new(DevelopmentValidator::new(root, config, runner))
        }
        (ValidationMode::Live, Environment::Staging) => {
            Box::new(StagingValidator::new(root, config, runner))
        }
        (ValidationMode::Live, Environment::Production) => {
            Box::new(ProductionValidator::new(root, config, runner))
        }
        (ValidationMode::Policy, env) => Box::new(PolicyValidator::new(
            env,
            root.join(config.environment_dir(env)),
            config.environments.get(env),
        )),
    }
}
