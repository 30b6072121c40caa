//! Deployment environments and their expected configuration profiles.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::InfraError;

/// A named deployment target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[serde(rename = "dev", alias = "development")]
    Development,
    #[serde(alias = "stage")]
    Staging,
    #[serde(rename = "prod", alias = "production")]
    Production,
}

impl Environment {
    /// All environments, in validation order.
    pub const ALL: [Environment; 3] = [Self::Development, Self::Staging, Self::Production];

    /// Directory name under the environments root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Development => "dev",
            Self::Staging => "staging",
            Self::Production => "prod",
        }
    }

    /// Human-readable name used as the prefix of check names.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Development => "Development",
            Self::Staging => "Staging",
            Self::Production => "Production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

impl FromStr for Environment {
    type Err = InfraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(Self::Development),
            "staging" | "stage" => Ok(Self::Staging),
            "prod" | "production" => Ok(Self::Production),
            other => Err(InfraError::UnknownEnvironment(other.to_string())),
        }
    }
}

/// Expected configuration profile of one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// VM sizes the environment may deploy
    pub allowed_vm_sizes: BTreeSet<String>,
    /// Required storage redundancy level (LRS, GRS, ...)
    pub storage_redundancy: String,
    /// Minimum backup retention in days
    pub backup_retention_days: u32,
    /// Security controls that must be declared
    pub required_security_controls: BTreeSet<String>,
    /// Required monitoring level
    pub monitoring_level: String,
}

impl EnvironmentConfig {
    fn build(
        vm_sizes: &[&str],
        redundancy: &str,
        retention: u32,
        controls: &[&str],
        monitoring: &str,
    ) -> Self {
        Self {
            allowed_vm_sizes: vm_sizes.iter().map(|s| s.to_string()).collect(),
            storage_redundancy: redundancy.to_string(),
            backup_retention_days: retention,
            required_security_controls: controls.iter().map(|s| s.to_string()).collect(),
            monitoring_level: monitoring.to_string(),
        }
    }

    /// Built-in profile for `env`.
    pub fn default_for(env: Environment) -> Self {
        match env {
            Environment::Development => Self::build(
                &["Standard_B1s", "Standard_B2s"],
                "LRS",
                7,
                &["network_security_group"],
                "basic",
            ),
            Environment::Staging => Self::build(
                &["Standard_B2s", "Standard_D2s_v3"],
                "GRS",
                14,
                &["network_security_group", "encryption_at_rest"],
                "standard",
            ),
            Environment::Production => Self::build(
                &["Standard_D2s_v3", "Standard_D4s_v3"],
                "GZRS",
                30,
                &[
                    "network_security_group",
                    "encryption_at_rest",
                    "private_endpoints",
                    "ddos_protection",
                ],
                "advanced",
            ),
        }
    }
}

/// Partial profile as written in a config file; absent fields keep the
/// built-in value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileOverride {
    pub allowed_vm_sizes: Option<BTreeSet<String>>,
    pub storage_redundancy: Option<String>,
    pub backup_retention_days: Option<u32>,
    pub required_security_controls: Option<BTreeSet<String>>,
    pub monitoring_level: Option<String>,
}

impl ProfileOverride {
    /// Overlay the fields that are set onto `base`.
    pub fn apply(self, base: EnvironmentConfig) -> EnvironmentConfig {
        EnvironmentConfig {
            allowed_vm_sizes: self.allowed_vm_sizes.unwrap_or(base.allowed_vm_sizes),
            storage_redundancy: self.storage_redundancy.unwrap_or(base.storage_redundancy),
            backup_retention_days: self
                .backup_retention_days
                .unwrap_or(base.backup_retention_days),
            required_security_controls: self
                .required_security_controls
                .unwrap_or(base.required_security_controls),
            monitoring_level: self.monitoring_level.unwrap_or(base.monitoring_level),
        }
    }
}

/// Lookup table of expected profiles, one per environment.
///
/// Deserializes from a map of partial overrides merged onto the built-in
/// profiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EnvironmentPolicies {
    profiles: BTreeMap<Environment, EnvironmentConfig>,
}

impl Default for EnvironmentPolicies {
    fn default() -> Self {
        Self {
            profiles: Environment::ALL
                .iter()
                .map(|env| (*env, EnvironmentConfig::default_for(*env)))
                .collect(),
        }
    }
}

impl<'de> Deserialize<'de> for EnvironmentPolicies {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let overrides = BTreeMap::<Environment, ProfileOverride>::deserialize(deserializer)?;
        Ok(overrides
            .into_iter()
            .fold(Self::default(), |policies, (env, profile)| {
                let merged = profile.apply(policies.get(env));
                policies.with_profile(env, merged)
            }))
    }
}

impl EnvironmentPolicies {
    /// Profile for `env`; environments missing from the table fall back to
    /// the built-in profile.
    pub fn get(&self, env: Environment) -> EnvironmentConfig {
        self.profiles
            .get(&env)
            .cloned()
            .unwrap_or_else(|| EnvironmentConfig::default_for(env))
    }

    /// Replace the profile for `env`.
    pub fn with_profile(mut self, env: Environment, config: EnvironmentConfig) -> Self {
        self.profiles.insert(env, config);
        self
    }
}
