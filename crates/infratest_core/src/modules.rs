//! Module structure and declaration checks.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};
use walkdir::WalkDir;

use infratest_runner::CommandRunner;

use crate::config::HarnessConfig;
use crate::error::InfraResult;
use crate::result::TestResult;
use crate::terraform::TerraformRunner;

/// Files every module directory must contain, in reporting order.
pub const REQUIRED_MODULE_FILES: [&str; 3] = ["main.tf", "variables.tf", "outputs.tf"];

/// Tests every module under the modules root.
pub struct ModuleTester {
    modules_root: PathBuf,
    terraform: TerraformRunner,
}

impl ModuleTester {
    pub fn new(
        root: impl Into<PathBuf>,
        config: &HarnessConfig,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            modules_root: root.into().join(&config.paths.modules),
            terraform: TerraformRunner::new(runner).with_program(&config.tools.terraform),
        }
    }

    /// Module directories, sorted by name.
    pub fn discover(&self) -> InfraResult<Vec<PathBuf>> {
        let mut modules = Vec::new();
        for entry in WalkDir::new(&self.modules_root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry?;
            if entry.file_type().is_dir() {
                modules.push(entry.into_path());
            }
        }
        Ok(modules)
    }

    /// Test all modules. One module failing never stops the next.
    pub async fn test_all_modules(&self) -> Vec<TestResult> {
        info!("Starting module tests in {:?}", self.modules_root);

        if !self.modules_root.is_dir() {
            warn!("Modules directory not found: {:?}", self.modules_root);
            return vec![TestResult::skipped(
                "Modules Directory Check",
                format!("Modules directory not found at {}", self.modules_root.display()),
            )];
        }

        let modules = match self.discover() {
            Ok(modules) => modules,
            Err(e) => {
                error!("Failed to enumerate modules: {}", e);
                return vec![TestResult::skipped(
                    "Modules Search",
                    format!("Failed to enumerate modules: {}", e),
                )];
            }
        };

        if modules.is_empty() {
            warn!("No modules found in {:?}", self.modules_root);
            return vec![TestResult::skipped("Modules Search", "No modules found to test")];
        }

        let mut results = Vec::new();
        for module in &modules {
            let name = module_name(module);
            match self.test_module(module, &name).await {
                Ok(module_results) => results.extend(module_results),
                Err(e) => {
                    error!("Error testing module {}: {}", name, e);
                    results.push(TestResult::skipped(
                        format!("{} Testing", name),
                        format!("Module testing failed with error: {}", e),
                    ));
                }
            }
        }

        info!("Module tests completed: {} modules, {} results", modules.len(), results.len());
        results
    }

    async fn test_module(&self, dir: &Path, name: &str) -> InfraResult<Vec<TestResult>> {
        info!("Testing module: {}", name);

        let start = Instant::now();
        let missing = missing_files(dir)?;
        if !missing.is_empty() {
            return Ok(vec![TestResult::fail(
                format!("{} Structure Validation", name),
                format!("Missing required files: {}", missing.join(", ")),
                start.elapsed(),
            )]);
        }

        let mut results = Vec::with_capacity(3);

        let start = Instant::now();
        let init = self.terraform.init(dir).await;
        results.push(if init.success() {
            TestResult::pass(format!("{} Initialization", name), init.stdout, start.elapsed())
        } else {
            TestResult::fail(
                format!("{} Initialization", name),
                format!("Initialization failed: {}", init.combined_output()),
                start.elapsed(),
            )
        });

        let start = Instant::now();
        let fmt = self.terraform.fmt_check(dir).await;
        results.push(if fmt.success() {
            TestResult::pass(
                format!("{} Format Check", name),
                "Format check passed",
                start.elapsed(),
            )
        } else {
            TestResult::fail(
                format!("{} Format Check", name),
                format!("Format check failed: {}", fmt.combined_output()),
                start.elapsed(),
            )
        });

        let start = Instant::now();
        let validate = self.terraform.validate(dir, None).await;
        results.push(if validate.success() {
            TestResult::pass(format!("{} Validation", name), validate.stdout, start.elapsed())
        } else {
            TestResult::fail(
                format!("{} Validation", name),
                format!("Validation failed: {}", validate.combined_output()),
                start.elapsed(),
            )
        });

        Ok(results)
    }
}

fn module_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.display().to_string())
}

fn missing_files(dir: &Path) -> InfraResult<Vec<&'static str>> {
    let mut missing = Vec::new();
    for file in REQUIRED_MODULE_FILES {
        if !dir.join(file).try_exists()? {
            missing.push(file);
        }
    }
    Ok(missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use infratest_runner::{MockResponse, MockRunner};
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn module(root: &Path, name: &str, files: &[&str]) {
        let dir = root.join("modules").join(name);
        fs::create_dir_all(&dir).unwrap();
        for file in files {
            fs::write(dir.join(file), "").unwrap();
        }
    }

    fn tester(temp: &TempDir, mock: &MockRunner) -> ModuleTester {
        ModuleTester::new(temp.path(), &HarnessConfig::default(), Arc::new(mock.clone()))
    }

    #[tokio::test]
    async fn test_missing_modules_root() {
        let temp = tempdir().unwrap();
        let mock = MockRunner::new();

        let results = tester(&temp, &mock).test_all_modules().await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name(), "Modules Directory Check");
        assert!(!results[0].passed());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_modules_root() {
        let temp = tempdir().unwrap();
        fs::create_dir(temp.path().join("modules")).unwrap();
        fs::write(temp.path().join("modules").join("README.md"), "").unwrap();
        let mock = MockRunner::new();

        let results = tester(&temp, &mock).test_all_modules().await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name(), "Modules Search");
        assert_eq!(results[0].output(), "No modules found to test");
    }

    #[tokio::test]
    async fn test_missing_files_named_exactly_without_tool_calls() {
        let temp = tempdir().unwrap();
        module(temp.path(), "network", &["main.tf"]);
        let mock = MockRunner::new();

        let results = tester(&temp, &mock).test_all_modules().await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name(), "network Structure Validation");
        assert_eq!(results[0].output(), "Missing required files: variables.tf, outputs.tf");
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_clean_module_yields_three_passing_results() {
        let temp = tempdir().unwrap();
        module(temp.path(), "storage", &REQUIRED_MODULE_FILES);
        let mock = MockRunner::new();

        let results = tester(&temp, &mock).test_all_modules().await;

        let names: Vec<&str> = results.iter().map(|r| r.name()).collect();
        assert_eq!(
            names,
            vec!["storage Initialization", "storage Format Check", "storage Validation"]
        );
        assert!(results.iter().all(|r| r.passed()));
        assert_eq!(results[1].output(), "Format check passed");

        let init = &mock.calls_to("terraform", &["init"])[0];
        assert_eq!(init.args, vec!["init", "-backend=false", "-input=false", "-no-color"]);
        assert!(init.workdir.as_deref().unwrap().ends_with("modules/storage"));
    }

    #[tokio::test]
    async fn test_steps_do_not_gate_each_other() {
        let temp = tempdir().unwrap();
        module(temp.path(), "compute", &REQUIRED_MODULE_FILES);
        let mock = MockRunner::new()
            .on("terraform", &["init"], MockResponse::failure(1, "provider registry unreachable"))
            .on("terraform", &["fmt"], MockResponse::Exit {
                exit_code: 3,
                stdout: "main.tf\n".to_string(),
                stderr: String::new(),
                duration_ms: 5,
            });

        let results = tester(&temp, &mock).test_all_modules().await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].output(), "Initialization failed: provider registry unreachable");
        assert!(!results[1].passed());
        assert!(results[1].output().starts_with("Format check failed:"));
        assert!(results[2].passed());
        assert!(mock.was_called("terraform", &["validate"]));
    }

    #[tokio::test]
    async fn test_modules_run_in_name_order() {
        let temp = tempdir().unwrap();
        module(temp.path(), "zeta", &REQUIRED_MODULE_FILES);
        module(temp.path(), "alpha", &["main.tf", "outputs.tf"]);

        let results = tester(&temp, &MockRunner::new()).test_all_modules().await;

        assert_eq!(results[0].name(), "alpha Structure Validation");
        assert_eq!(results[0].output(), "Missing required files: variables.tf");
        assert_eq!(results[1].name(), "zeta Initialization");
        assert_eq!(results.len(), 4);
    }

    #[tokio::test]
    async fn test_timeout_surfaces_in_output() {
        let temp = tempdir().unwrap();
        module(temp.path(), "dns", &REQUIRED_MODULE_FILES);
        let mock = MockRunner::new().on("terraform", &["validate"], MockResponse::timeout());

        let results = tester(&temp, &mock).test_all_modules().await;

        assert_eq!(results[2].output(), "Validation failed: Command timed out");
    }
}
