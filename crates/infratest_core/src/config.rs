//! Harness configuration.
//!
//! Everything has a default, so the harness runs without a config file; a
//! YAML file may override any subset of the fields.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use infratest_runner::CommandRunner;

use crate::environment::{Environment, EnvironmentPolicies};
use crate::error::{InfraError, InfraResult};

/// Config file looked up in the harness root when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "infratest.yaml";

/// Top-level harness configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub paths: PathsConfig,
    pub tools: ToolsConfig,
    pub timeouts: TimeoutsConfig,
    pub backend: BackendSettings,
    pub environments: EnvironmentPolicies,
}

/// Directory layout, relative to the harness root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub modules: PathBuf,
    pub environments: PathBuf,
    pub backend: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            modules: PathBuf::from("modules"),
            environments: PathBuf::from("environments"),
            backend: PathBuf::from("backend-config"),
        }
    }
}

/// Names of the external programs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub terraform: String,
    pub az: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            terraform: "terraform".to_string(),
            az: "az".to_string(),
        }
    }
}

impl ToolsConfig {
    /// Configured programs that cannot be launched, in `az`, `terraform`
    /// order. Each missing tool is logged as a warning.
    pub async fn missing(&self, runner: &dyn CommandRunner) -> Vec<String> {
        let mut missing = Vec::new();
        for program in [&self.az, &self.terraform] {
            if !runner.is_program_available(program).await {
                warn!("{} is not available; checks that need it will fail", program);
                missing.push(program.clone());
            }
        }
        missing
    }
}

/// Upper bounds applied to environment validate and plan commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    pub validate_secs: u64,
    pub plan_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            validate_secs: 30,
            plan_secs: 60,
        }
    }
}

impl TimeoutsConfig {
    pub fn validate(&self) -> Duration {
        Duration::from_secs(self.validate_secs)
    }

    pub fn plan(&self) -> Duration {
        Duration::from_secs(self.plan_secs)
    }
}

/// Expected state of the shared remote-state backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub resource_group: String,
    pub storage_account: String,
    pub container: String,
    pub location: String,
    pub expected_kind: String,
    pub expected_tier: String,
    pub expected_key_source: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            resource_group: "terraform-state-rg".to_string(),
            storage_account: "tfstatel9wa1akm".to_string(),
            container: "tfstate".to_string(),
            location: "eastus".to_string(),
            expected_kind: "StorageV2".to_string(),
            expected_tier: "Standard".to_string(),
            expected_key_source: "Microsoft.Storage".to_string(),
        }
    }
}

impl HarnessConfig {
    /// Parse a YAML document.
    pub fn from_yaml(content: &str) -> InfraResult<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.check()?;
        Ok(config)
    }

    /// Load a config file.
    pub fn load(path: &Path) -> InfraResult<Self> {
        info!("Loading configuration from {:?}", path);
        let content = std::fs::read_to_string(path).map_err(|source| InfraError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Load `explicit` if given, else `<root>/infratest.yaml` if it exists,
    /// else the defaults.
    pub fn discover(root: &Path, explicit: Option<&Path>) -> InfraResult<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let candidate = root.join(DEFAULT_CONFIG_FILE);
        if candidate.is_file() {
            return Self::load(&candidate);
        }

        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn with_paths(mut self, paths: PathsConfig) -> Self {
        self.paths = paths;
        self
    }

    pub fn with_backend(mut self, backend: BackendSettings) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutsConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_policies(mut self, policies: EnvironmentPolicies) -> Self {
        self.environments = policies;
        self
    }

    /// Directory holding the declaration for `env`, relative to the root.
    pub fn environment_dir(&self, env: Environment) -> PathBuf {
        self.paths.environments.join(env.dir_name())
    }

    fn check(&self) -> InfraResult<()> {
        if self.timeouts.validate_secs == 0 || self.timeouts.plan_secs == 0 {
            return Err(InfraError::InvalidConfiguration(
                "timeouts must be at least one second".to_string(),
            ));
        }
        if self.tools.terraform.trim().is_empty() || self.tools.az.trim().is_empty() {
            return Err(InfraError::InvalidConfiguration(
                "tool names must not be empty".to_string(),
            ));
        }
        if self.backend.storage_account.trim().is_empty()
            || self.backend.resource_group.trim().is_empty()
        {
            return Err(InfraError::InvalidConfiguration(
                "backend resource group and storage account are required".to_string(),
            ));
        }
        Ok(())
    }
}
