//! Validation of the shared remote-state backend.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::info;

use infratest_runner::CommandRunner;

use crate::azure::{AzureCli, QueryFailure};
use crate::config::{BackendSettings, HarnessConfig};
use crate::result::TestResult;
use crate::terraform::{TerraformChain, TerraformRunner};

/// Checks the state storage backend and its declaration.
pub struct BackendValidator {
    settings: BackendSettings,
    azure: AzureCli,
    terraform: TerraformRunner,
    chain: TerraformChain,
}

impl BackendValidator {
    pub fn new(
        root: impl Into<PathBuf>,
        config: &HarnessConfig,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let dir = root.into().join(&config.paths.backend);
        Self {
            settings: config.backend.clone(),
            azure: AzureCli::new(runner.clone()).with_program(&config.tools.az),
            terraform: TerraformRunner::new(runner).with_program(&config.tools.terraform),
            chain: TerraformChain::new("Backend", dir),
        }
    }

    /// Run the storage checks, then the backend's own terraform chain.
    ///
    /// A missing resource group skips the four storage checks that depend on
    /// it. The terraform chain always runs.
    pub async fn validate_backend(&self) -> Vec<TestResult> {
        info!("Starting backend validation");
        let mut results = Vec::new();

        let group = self.validate_resource_group().await;
        let group_exists = group.passed();
        results.push(group);

        if group_exists {
            results.push(self.validate_storage_account().await);
            results.push(self.validate_encryption().await);
            results.push(self.validate_network_rules().await);
            results.push(self.validate_container().await);
        }

        info!("Testing backend terraform configuration in {:?}", self.chain.dir());
        results.extend(self.chain.run(&self.terraform).await);

        info!("Backend validation completed");
        results
    }

    async fn validate_resource_group(&self) -> TestResult {
        let start = Instant::now();
        let execution = self.azure.group_show(&self.settings.resource_group).await;

        if execution.success() {
            TestResult::pass(
                "Backend Resource Group",
                "Resource group exists and is configured",
                start.elapsed(),
            )
        } else {
            TestResult::fail(
                "Backend Resource Group",
                format!("Resource group validation failed: {}", execution.stderr),
                start.elapsed(),
            )
        }
    }

    async fn validate_storage_account(&self) -> TestResult {
        let start = Instant::now();
        let account = self
            .azure
            .storage_account_show(
                &self.settings.storage_account,
                &self.settings.resource_group,
                None,
            )
            .await;

        let verdict = account.map(|config| {
            let kind = config.get("kind").and_then(Value::as_str).unwrap_or_default();
            let tier = config
                .pointer("/sku/tier")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if kind == self.settings.expected_kind && tier == self.settings.expected_tier {
                Ok("Storage account properly configured".to_string())
            } else {
                Err(format!(
                    "Storage account is kind={} tier={}, expected kind={} tier={}",
                    kind, tier, self.settings.expected_kind, self.settings.expected_tier
                ))
            }
        });

        Self::outcome("Backend Storage Account", "Storage", "storage account", verdict, start)
    }

    async fn validate_encryption(&self) -> TestResult {
        let start = Instant::now();
        let encryption = self
            .azure
            .storage_account_show(
                &self.settings.storage_account,
                &self.settings.resource_group,
                Some("encryption"),
            )
            .await;

        let verdict = encryption.map(|encryption| {
            let key_source = encryption
                .get("keySource")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if key_source == self.settings.expected_key_source {
                Ok("Encryption properly configured".to_string())
            } else {
                Err(format!(
                    "Encryption key source is '{}', expected '{}'",
                    key_source, self.settings.expected_key_source
                ))
            }
        });

        Self::outcome("Backend Encryption", "Encryption", "encryption settings", verdict, start)
    }

    /// Lenient for now: any parseable rule set passes, whatever it contains.
    async fn validate_network_rules(&self) -> TestResult {
        let start = Instant::now();
        let rules = self
            .azure
            .storage_account_show(
                &self.settings.storage_account,
                &self.settings.resource_group,
                Some("networkRuleSet"),
            )
            .await;

        let verdict = rules.map(|_| Ok("Network rules properly configured".to_string()));

        Self::outcome("Backend Network Security", "Network rules", "network rules", verdict, start)
    }

    async fn validate_container(&self) -> TestResult {
        let start = Instant::now();
        let containers = self.azure.container_list(&self.settings.storage_account).await;

        let verdict = containers.map(|containers| {
            let found = containers
                .as_array()
                .into_iter()
                .flatten()
                .find(|c| {
                    c.get("name").and_then(Value::as_str) == Some(self.settings.container.as_str())
                });

            match found {
                None => Err(format!("Container '{}' not found", self.settings.container)),
                Some(container) => {
                    let public = container
                        .pointer("/properties/publicAccess")
                        .filter(|v| !v.is_null());
                    match public {
                        None => Ok("State container properly configured".to_string()),
                        Some(level) => Err(format!(
                            "Container '{}' allows public access ({})",
                            self.settings.container, level
                        )),
                    }
                }
            }
        });

        Self::outcome("Backend State Container", "Container", "container info", verdict, start)
    }

    /// Fold a query outcome into a result. `label` prefixes command
    /// failures, `subject` names what failed to parse.
    fn outcome(
        name: &str,
        label: &str,
        subject: &str,
        verdict: Result<Result<String, String>, QueryFailure>,
        start: Instant,
    ) -> TestResult {
        match verdict {
            Ok(Ok(message)) => TestResult::pass(name, message, start.elapsed()),
            Ok(Err(message)) => TestResult::fail(name, message, start.elapsed()),
            Err(QueryFailure::Command(stderr)) => TestResult::fail(
                name,
                format!("{} validation failed: {}", label, stderr),
                start.elapsed(),
            ),
            Err(QueryFailure::Parse(e)) => TestResult::fail(
                name,
                format!("Failed to parse {}: {}", subject, e),
                start.elapsed(),
            ),
        }
    }
}
