//! Error types for the validation crate.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for validation operations.
pub type InfraResult<T> = Result<T, InfraError>;

/// Errors raised by the harness itself, as opposed to failing checks.
///
/// A failing `terraform` or `az` invocation is never an `InfraError`; it is
/// a failing `TestResult`.
#[derive(Error, Debug)]
pub enum InfraError {
    #[error("Unknown environment: {0}")]
    UnknownEnvironment(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write report {path}: {source}")]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid pattern: {0}")]
    Pattern(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}
