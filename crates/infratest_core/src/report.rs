//! Console rendering and JSON export of collected results.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{debug, info};

use crate::error::{InfraError, InfraResult};
use crate::result::{RunSummary, TestResult};

/// `test_report_<YYYYMMDD_HHMMSS>.json`
pub fn report_file_name(at: DateTime<Local>) -> String {
    format!("test_report_{}.json", at.format("%Y%m%d_%H%M%S"))
}

/// Write `results` as a pretty JSON array into `dir`, named after the
/// current local time. Returns the written path.
pub fn export(results: &[TestResult], dir: &Path) -> InfraResult<PathBuf> {
    export_at(results, dir, Local::now())
}

pub fn export_at(results: &[TestResult], dir: &Path, at: DateTime<Local>) -> InfraResult<PathBuf> {
    let path = dir.join(report_file_name(at));
    let json = serde_json::to_string_pretty(results)?;

    fs::create_dir_all(dir)
        .and_then(|_| fs::write(&path, json))
        .map_err(|source| InfraError::ReportWrite {
            path: path.clone(),
            source,
        })?;

    info!("Exported {} results to {:?}", results.len(), path);
    Ok(path)
}

/// Load a previously exported report.
pub fn load(path: &Path) -> InfraResult<Vec<TestResult>> {
    debug!("Loading report {:?}", path);
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Human-readable listing of `results`.
pub fn render(results: &[TestResult]) -> String {
    if results.is_empty() {
        return "No test results available.\n".to_string();
    }

    let mut report = String::from("\n=== Test Results ===\n");
    for result in results {
        let icon = if result.passed() { "✅" } else { "❌" };
        report.push_str(&format!(
            "\n{} {}: {} ({:.2}s)\n",
            icon,
            result.name(),
            result.status_label(),
            result.duration()
        ));
        if !result.output().is_empty() {
            report.push_str(&format!("   Output: {}\n", result.output().trim_end()));
        }
    }

    let summary = RunSummary::of(results);
    report.push_str(&format!(
        "\nSummary: {}/{} checks passed, {} failed\n",
        summary.passed, summary.total, summary.failed
    ));
    report
}
