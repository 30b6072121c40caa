//! Declarative environment validation against the policy table.
//!
//! Declared values are read from the environment's `*.tfvars` files. Only
//! single-line assignments are understood: quoted strings, integers and
//! lists of quoted strings. That is enough for the handful of keys the
//! policy looks at.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Instant;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::environment::{Environment, EnvironmentConfig};
use crate::error::{InfraError, InfraResult};
use crate::result::TestResult;
use crate::validator::EnvironmentValidator;

const VM_SIZE_KEYS: [&str; 2] = ["vm_size", "vm_sizes"];
const REDUNDANCY_KEYS: [&str; 2] = ["storage_replication_type", "account_replication_type"];
const RETENTION_KEY: &str = "backup_retention_days";
const CONTROLS_KEY: &str = "security_controls";
const MONITORING_KEY: &str = "monitoring_level";

/// A value assigned in a `.tfvars` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclaredValue {
    Text(String),
    Number(i64),
    List(Vec<String>),
    /// Anything else (maps, expressions), kept verbatim.
    Raw(String),
}

impl DeclaredValue {
    /// The value as a list of strings; scalars become one-element lists.
    pub fn as_list(&self) -> Vec<String> {
        match self {
            Self::Text(s) | Self::Raw(s) => vec![s.clone()],
            Self::Number(n) => vec![n.to_string()],
            Self::List(items) => items.clone(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.parse().ok(),
            _ => None,
        }
    }
}

/// Values declared for one environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclaredConfig {
    values: BTreeMap<String, DeclaredValue>,
}

fn assignment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^\s*([A-Za-z_][A-Za-z0-9_-]*)\s*=\s*(.+?)\s*$"#)
            .expect("assignment pattern is valid")
    })
}

fn quoted_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""([^"]*)""#).expect("quoted pattern is valid"))
}

impl DeclaredConfig {
    /// Parse the contents of one `.tfvars` file.
    pub fn parse(content: &str) -> Self {
        let mut config = Self::default();
        config.merge_str(content);
        config
    }

    /// Read every `*.tfvars` file in `dir` in name order; later files
    /// override earlier ones.
    pub fn load_dir(dir: &Path) -> InfraResult<Self> {
        let pattern = dir.join("*.tfvars");
        let pattern = pattern
            .to_str()
            .ok_or_else(|| InfraError::Pattern(format!("non UTF-8 path {:?}", dir)))?;

        let mut files: Vec<PathBuf> = glob::glob(pattern)
            .map_err(|e| InfraError::Pattern(e.to_string()))?
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .collect();
        files.sort();

        let mut config = Self::default();
        for file in &files {
            debug!("Reading declared values from {:?}", file);
            config.merge_str(&std::fs::read_to_string(file)?);
        }
        Ok(config)
    }

    fn merge_str(&mut self, content: &str) {
        for line in content.lines() {
            let trimmed = line.trim_start();
            if trimmed.starts_with('#') || trimmed.starts_with("//") {
                continue;
            }
            if let Some(caps) = assignment_regex().captures(line) {
                self.values
                    .insert(caps[1].to_string(), Self::parse_value(&caps[2]));
            }
        }
    }

    fn parse_value(raw: &str) -> DeclaredValue {
        let raw = raw.trim();
        if let Some(inner) = raw.strip_prefix('[') {
            if let Some(end) = inner.rfind(']') {
                let items = quoted_regex()
                    .captures_iter(&inner[..end])
                    .map(|c| c[1].to_string())
                    .collect();
                return DeclaredValue::List(items);
            }
        }
        if raw.starts_with('"') {
            if let Some(caps) = quoted_regex().captures(raw) {
                return DeclaredValue::Text(caps[1].to_string());
            }
        }
        let bare = raw.split_whitespace().next().unwrap_or(raw);
        match bare.parse::<i64>() {
            Ok(n) => DeclaredValue::Number(n),
            Err(_) => DeclaredValue::Raw(raw.to_string()),
        }
    }

    pub fn get(&self, key: &str) -> Option<&DeclaredValue> {
        self.values.get(key)
    }

    /// First of `keys` that is declared.
    pub fn first_of(&self, keys: &[&str]) -> Option<&DeclaredValue> {
        keys.iter().find_map(|k| self.values.get(*k))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Checks an environment's declared values against its expected profile.
pub struct PolicyValidator {
    environment: Environment,
    dir: PathBuf,
    expected: EnvironmentConfig,
}

impl PolicyValidator {
    pub fn new(
        environment: Environment,
        dir: impl Into<PathBuf>,
        expected: EnvironmentConfig,
    ) -> Self {
        Self {
            environment,
            dir: dir.into(),
            expected,
        }
    }

    fn check_name(&self, check: &str) -> String {
        format!("{} {}", self.environment.display_name(), check)
    }

    fn halted(&self, reason: String) -> TestResult {
        TestResult::skipped(self.check_name("Policy Configuration"), reason)
            .for_environment(self.environment)
    }

    /// Run every policy check against an already-loaded declaration.
    pub fn evaluate(&self, declared: &DeclaredConfig) -> Vec<TestResult> {
        vec![
            self.check_vm_sizes(declared),
            self.check_redundancy(declared),
            self.check_retention(declared),
            self.check_security_controls(declared),
            self.check_monitoring(declared),
        ]
    }

    fn outcome(&self, check: &str, start: Instant, verdict: Result<String, String>) -> TestResult {
        let name = self.check_name(check);
        let result = match verdict {
            Ok(message) => TestResult::pass(name, message, start.elapsed()),
            Err(message) => TestResult::fail(name, message, start.elapsed()),
        };
        result.for_environment(self.environment)
    }

    fn check_vm_sizes(&self, declared: &DeclaredConfig) -> TestResult {
        let start = Instant::now();
        let verdict = match declared.first_of(&VM_SIZE_KEYS) {
            None => Err("No vm_size declared".to_string()),
            Some(value) => {
                let sizes = value.as_list();
                let disallowed: Vec<&str> = sizes
                    .iter()
                    .filter(|s| !self.expected.allowed_vm_sizes.contains(s.as_str()))
                    .map(String::as_str)
                    .collect();
                if sizes.is_empty() {
                    Err("No vm_size declared".to_string())
                } else if disallowed.is_empty() {
                    Ok(format!("VM sizes allowed: {}", sizes.join(", ")))
                } else {
                    Err(format!(
                        "VM sizes not allowed: {} (allowed: {})",
                        disallowed.join(", "),
                        join_set(&self.expected.allowed_vm_sizes)
                    ))
                }
            }
        };
        self.outcome("VM Size Policy", start, verdict)
    }

    fn check_redundancy(&self, declared: &DeclaredConfig) -> TestResult {
        let start = Instant::now();
        let expected = &self.expected.storage_redundancy;
        let verdict = match declared.first_of(&REDUNDANCY_KEYS).and_then(DeclaredValue::as_text) {
            None => Err("No storage replication type declared".to_string()),
            Some(actual) if actual.eq_ignore_ascii_case(expected) => {
                Ok(format!("Storage redundancy is {}", actual))
            }
            Some(actual) => Err(format!(
                "Storage redundancy is {}, expected {}",
                actual, expected
            )),
        };
        self.outcome("Storage Redundancy Policy", start, verdict)
    }

    fn check_retention(&self, declared: &DeclaredConfig) -> TestResult {
        let start = Instant::now();
        let required = i64::from(self.expected.backup_retention_days);
        let verdict = match declared.get(RETENTION_KEY).and_then(DeclaredValue::as_number) {
            None => Err("No backup_retention_days declared".to_string()),
            Some(days) if days >= required => {
                Ok(format!("Backup retention {} days (minimum {})", days, required))
            }
            Some(days) => Err(format!(
                "Backup retention {} days is below the minimum of {}",
                days, required
            )),
        };
        self.outcome("Backup Retention Policy", start, verdict)
    }

    fn check_security_controls(&self, declared: &DeclaredConfig) -> TestResult {
        let start = Instant::now();
        let present: BTreeSet<String> = declared
            .get(CONTROLS_KEY)
            .map(DeclaredValue::as_list)
            .unwrap_or_default()
            .into_iter()
            .collect();
        let missing: Vec<&str> = self
            .expected
            .required_security_controls
            .iter()
            .filter(|c| !present.contains(*c))
            .map(String::as_str)
            .collect();
        let verdict = if missing.is_empty() {
            Ok(format!(
                "Required security controls present: {}",
                join_set(&self.expected.required_security_controls)
            ))
        } else {
            Err(format!("Missing security controls: {}", missing.join(", ")))
        };
        self.outcome("Security Controls Policy", start, verdict)
    }

    fn check_monitoring(&self, declared: &DeclaredConfig) -> TestResult {
        let start = Instant::now();
        let expected = &self.expected.monitoring_level;
        let verdict = match declared.get(MONITORING_KEY).and_then(DeclaredValue::as_text) {
            None => Err("No monitoring_level declared".to_string()),
            Some(actual) if actual.eq_ignore_ascii_case(expected) => {
                Ok(format!("Monitoring level is {}", actual))
            }
            Some(actual) => Err(format!("Monitoring level is {}, expected {}", actual, expected)),
        };
        self.outcome("Monitoring Policy", start, verdict)
    }
}

fn join_set(set: &BTreeSet<String>) -> String {
    set.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

#[async_trait]
impl EnvironmentValidator for PolicyValidator {
    fn environment(&self) -> Environment {
        self.environment
    }

    async fn validate_environment(&self) -> Vec<TestResult> {
        info!(
            "Checking {} environment against policy",
            self.environment.display_name().to_lowercase()
        );

        if !self.dir.is_dir() {
            warn!("Environment directory not found: {:?}", self.dir);
            return vec![self.halted(format!(
                "{} environment directory not found at {}",
                self.environment.display_name(),
                self.dir.display()
            ))];
        }

        match DeclaredConfig::load_dir(&self.dir) {
            Ok(declared) if declared.is_empty() => vec![self.halted(format!(
                "No variable assignments found in {}/*.tfvars",
                self.dir.display()
            ))],
            Ok(declared) => self.evaluate(&declared),
            Err(e) => vec![self.halted(format!("Failed to read declared values: {}", e))],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const COMPLIANT_PROD: &str = r#"
# production sizing
vm_size                  = "Standard_D4s_v3"
storage_replication_type = "GZRS"
backup_retention_days    = 35
security_controls        = ["network_security_group", "encryption_at_rest", "private_endpoints", "ddos_protection"]
monitoring_level         = "advanced"
tags = { owner = "platform" }
"#;

    fn validator(env: Environment, dir: &Path) -> PolicyValidator {
        PolicyValidator::new(env, dir, EnvironmentConfig::default_for(env))
    }

    #[test]
    fn test_parse_values() {
        let declared = DeclaredConfig::parse(COMPLIANT_PROD);

        assert_eq!(
            declared.get("vm_size"),
            Some(&DeclaredValue::Text("Standard_D4s_v3".to_string()))
        );
        assert_eq!(declared.get("backup_retention_days"), Some(&DeclaredValue::Number(35)));
        assert_eq!(declared.get("security_controls").map(|v| v.as_list().len()), Some(4));
        assert!(matches!(declared.get("tags"), Some(DeclaredValue::Raw(_))));
    }

    #[test]
    fn test_comments_and_trailing_comments() {
        let declared = DeclaredConfig::parse(
            "# vm_size = \"Standard_B1s\"\n\
             // monitoring_level = \"none\"\n\
             backup_retention_days = 14 # two weeks\n",
        );

        assert!(declared.get("vm_size").is_none());
        assert!(declared.get("monitoring_level").is_none());
        assert_eq!(declared.get("backup_retention_days"), Some(&DeclaredValue::Number(14)));
    }

    #[test]
    fn test_compliant_declaration_passes_every_check() {
        let dir = tempdir().unwrap();
        let results = validator(Environment::Production, dir.path())
            .evaluate(&DeclaredConfig::parse(COMPLIANT_PROD));

        let names: Vec<&str> = results.iter().map(|r| r.name()).collect();
        assert_eq!(
            names,
            vec![
                "Production VM Size Policy",
                "Production Storage Redundancy Policy",
                "Production Backup Retention Policy",
                "Production Security Controls Policy",
                "Production Monitoring Policy",
            ]
        );
        assert!(results.iter().all(|r| r.passed()), "{:?}", results);
    }

    #[test]
    fn test_violations_are_reported() {
        let dir = tempdir().unwrap();
        let declared = DeclaredConfig::parse(
            r#"
vm_sizes = ["Standard_B2s", "Standard_M128s"]
account_replication_type = "LRS"
backup_retention_days = 7
security_controls = ["network_security_group"]
monitoring_level = "basic"
"#,
        );

        let results = validator(Environment::Staging, dir.path()).evaluate(&declared);

        assert_eq!(
            results[0].output(),
            "VM sizes not allowed: Standard_M128s (allowed: Standard_B2s, Standard_D2s_v3)"
        );
        assert_eq!(results[1].output(), "Storage redundancy is LRS, expected GRS");
        assert_eq!(results[2].output(), "Backup retention 7 days is below the minimum of 14");
        assert_eq!(results[3].output(), "Missing security controls: encryption_at_rest");
        assert_eq!(results[4].output(), "Monitoring level is basic, expected standard");
        assert!(results.iter().all(|r| r.environment() == Some(Environment::Staging)));
    }

    #[test]
    fn test_redundancy_is_case_insensitive() {
        let dir = tempdir().unwrap();
        let declared = DeclaredConfig::parse("storage_replication_type = \"lrs\"\n");

        let results = validator(Environment::Development, dir.path()).evaluate(&declared);

        assert!(results[1].passed());
        assert!(!results[0].passed());
    }

    #[tokio::test]
    async fn test_missing_directory_yields_single_result() {
        let dir = tempdir().unwrap();
        let results = validator(Environment::Production, &dir.path().join("prod"))
            .validate_environment()
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name(), "Production Policy Configuration");
        assert!(!results[0].passed());
        assert_eq!(results[0].duration(), 0.0);
    }

    #[tokio::test]
    async fn test_directory_without_tfvars_yields_single_result() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("main.tf"),
            "resource \"null_resource\" \"x\" {}\n",
        )
        .unwrap();

        let results = validator(Environment::Development, dir.path()).validate_environment().await;

        assert_eq!(results.len(), 1);
        assert!(results[0].output().contains("No variable assignments"));
    }

    #[tokio::test]
    async fn test_later_tfvars_override_earlier() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.tfvars"), COMPLIANT_PROD).unwrap();
        std::fs::write(dir.path().join("z.auto.tfvars"), "monitoring_level = \"basic\"\n").unwrap();

        let results = validator(Environment::Production, dir.path()).validate_environment().await;

        assert_eq!(results.len(), 5);
        assert!(results[..4].iter().all(|r| r.passed()));
        assert!(!results[4].passed());
    }
}
