//! Outcome of a single infrastructure check.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::environment::Environment;

/// One check's outcome.
///
/// Fields are private: a result is created once by the check that produced
/// it and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    environment: Option<Environment>,
    #[serde(with = "pass_fail")]
    status: bool,
    output: String,
    timestamp: DateTime<Utc>,
    duration: f64,
}

impl TestResult {
    /// Record an outcome, stamping the current time.
    pub fn new(
        name: impl Into<String>,
        status: bool,
        output: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            environment: None,
            status,
            output: output.into(),
            timestamp: Utc::now(),
            duration: duration.as_secs_f64(),
        }
    }

    pub fn pass(name: impl Into<String>, output: impl Into<String>, duration: Duration) -> Self {
        Self::new(name, true, output, duration)
    }

    pub fn fail(name: impl Into<String>, output: impl Into<String>, duration: Duration) -> Self {
        Self::new(name, false, output, duration)
    }

    /// A failing result for a check that could not be attempted.
    pub fn skipped(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self::fail(name, output, Duration::ZERO)
    }

    /// Tag the result with the environment it belongs to.
    pub fn for_environment(mut self, env: Environment) -> Self {
        self.environment = Some(env);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn environment(&self) -> Option<Environment> {
        self.environment
    }

    /// Whether the check passed.
    pub fn passed(&self) -> bool {
        self.status
    }

    pub fn status_label(&self) -> &'static str {
        pass_fail::label(self.status)
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Elapsed seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }
}

/// Serializes the status flag as `"PASS"` / `"FAIL"`.
mod pass_fail {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const PASS: &str = "PASS";
    pub const FAIL: &str = "FAIL";

    pub fn label(status: bool) -> &'static str {
        if status {
            PASS
        } else {
            FAIL
        }
    }

    pub fn serialize<S: Serializer>(status: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(label(*status))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.as_str() {
            PASS => Ok(true),
            FAIL => Ok(false),
            other => Err(D::Error::custom(format!(
                "invalid status '{}', expected PASS or FAIL",
                other
            ))),
        }
    }
}

/// Pass/fail counts over a slice of results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn of(results: &[TestResult]) -> Self {
        let passed = results.iter().filter(|r| r.passed()).count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let ok = TestResult::pass("web Validation", "Success!", Duration::from_millis(1500));
        assert!(ok.passed());
        assert_eq!(ok.name(), "web Validation");
        assert_eq!(ok.output(), "Success!");
        assert_eq!(ok.duration(), 1.5);
        assert_eq!(ok.environment(), None);
        assert_eq!(ok.status_label(), "PASS");

        let skipped = TestResult::skipped("Staging Terraform Configuration", "init failed");
        assert!(!skipped.passed());
        assert_eq!(skipped.duration(), 0.0);
        assert_eq!(skipped.status_label(), "FAIL");
    }

    #[test]
    fn test_serialized_shape() {
        let result = TestResult::fail(
            "Backend Encryption",
            "Encryption validation failed: denied",
            Duration::from_secs(2),
        );
        let value = serde_json::to_value(&result).unwrap();
        let object = value.as_object().unwrap();

        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["duration", "name", "output", "status", "timestamp"]);
        assert_eq!(object["status"], "FAIL");
        assert_eq!(object["duration"], 2.0);
        assert!(DateTime::parse_from_rfc3339(object["timestamp"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_environment_tag_serialized_when_present() {
        let result = TestResult::pass(
            "Production Terraform Plan",
            "Plan generated successfully",
            Duration::ZERO,
        )
        .for_environment(Environment::Production);
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["environment"], "prod");
        assert_eq!(value["status"], "PASS");
    }

    #[test]
    fn test_round_trip_preserves_fields() {
        let original = TestResult::fail(
            "net Format Check",
            "Format check failed: main.tf",
            Duration::from_millis(250),
        )
        .for_environment(Environment::Staging);

        let json = serde_json::to_string(&original).unwrap();
        let restored: TestResult = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, original);
    }

    #[test]
    fn test_rejects_unknown_status() {
        let json = r#"{
            "name": "x",
            "status": "SKIP",
            "output": "",
            "timestamp": "2024-01-01T00:00:00Z",
            "duration": 0.0
        }"#;
        assert!(serde_json::from_str::<TestResult>(json).is_err());
    }

    #[test]
    fn test_summary() {
        let results = vec![
            TestResult::pass("a", "", Duration::ZERO),
            TestResult::fail("b", "", Duration::ZERO),
            TestResult::pass("c", "", Duration::ZERO),
        ];
        let summary = RunSummary::of(&results);

        assert_eq!(summary, RunSummary { total: 3, passed: 2, failed: 1 });
        assert!(!summary.all_passed());
        assert!(RunSummary::of(&[]).all_passed());
    }
}
