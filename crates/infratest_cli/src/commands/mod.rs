//! CLI command definitions.
//!
//! With no subcommand the harness opens the interactive menu; every other
//! subcommand runs one group of checks and exits.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use infratest_core::{HarnessConfig, InfrastructureTestRunner, ValidationMode};
use infratest_runner::{CommandRunner, ProcessRunner, ProcessRunnerOptions};

pub mod menu;
pub mod run;

/// infratest - validation harness for cloud infrastructure declarations
#[derive(Parser)]
#[command(name = "infratest")]
#[command(version, about = "infratest - validation harness for cloud infrastructure declarations")]
#[command(long_about = r#"
infratest checks infrastructure modules, the shared remote-state backend and
each deployment environment by driving the az and terraform command lines.

COMMANDS:
  menu          → Interactive menu (default when no command is given)
  modules       → Structure, init, fmt and validate for every module
  backend       → Remote-state backend checks
  environments  → Validate development, staging and production
  env <name>    → Validate one environment

EXIT CODES:
  0 - Success
  1 - General error
  3 - Validation failure
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Options shared by every command.
#[derive(Args, Clone, Debug)]
pub struct GlobalArgs {
    /// Harness root containing modules/, environments/ and backend-config/
    #[arg(long, global = true, env = "INFRATEST_ROOT", default_value = ".")]
    pub root: PathBuf,

    /// Config file (default: <root>/infratest.yaml when present)
    #[arg(long, global = true, env = "INFRATEST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Environment validation semantics: live or policy
    #[arg(long, global = true, default_value_t = ValidationMode::Live)]
    pub mode: ValidationMode,

    /// Print commands instead of running them
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Directory for exported reports (default: the root)
    #[arg(long, global = true)]
    pub report_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl GlobalArgs {
    /// Load the configuration and build a runner backed by real processes.
    pub async fn build_runner(&self) -> Result<InfrastructureTestRunner> {
        let mut options = ProcessRunnerOptions::new();
        if self.dry_run {
            options = options.dry_run();
        }
        self.build_runner_with(Arc::new(ProcessRunner::new(options))).await
    }

    /// Load the configuration and build a runner over `process`, warning
    /// about missing tools first.
    pub async fn build_runner_with(
        &self,
        process: Arc<dyn CommandRunner>,
    ) -> Result<InfrastructureTestRunner> {
        let config = HarnessConfig::discover(&self.root, self.config.as_deref())
            .context("Failed to load harness configuration")?;

        let harness =
            InfrastructureTestRunner::new(&self.root, config, self.mode, process.clone());
        info!(
            "Harness root {:?}, {} mode{}",
            harness.root(),
            harness.mode(),
            if self.dry_run { " (dry run)" } else { "" }
        );

        self.preflight(&harness, process.as_ref()).await;
        Ok(harness)
    }

    /// Names of configured tools that cannot be launched. Nothing is
    /// launched in a dry run, so the check is skipped there.
    pub async fn preflight(
        &self,
        harness: &InfrastructureTestRunner,
        process: &dyn CommandRunner,
    ) -> Vec<String> {
        if self.dry_run {
            return Vec::new();
        }

        let missing = harness.config().tools.missing(process).await;
        if !self.quiet {
            for program in &missing {
                eprintln!(
                    "⚠️  Warning: '{}' not found. Checks that need it will fail.",
                    program
                );
            }
        }
        missing
    }

    pub fn report_dir(&self) -> PathBuf {
        self.report_dir.clone().unwrap_or_else(|| self.root.clone())
    }
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Open the interactive menu
    Menu,

    /// Test every infrastructure module
    Modules(run::RunArgs),

    /// Validate the remote-state backend
    Backend(run::RunArgs),

    /// Validate every environment
    Environments(run::RunArgs),

    /// Validate a single environment (dev, staging or prod)
    Env(run::EnvArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use infratest_core::Environment;
    use infratest_runner::MockRunner;
    use tempfile::tempdir;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_subcommand_means_menu() {
        let cli = Cli::try_parse_from(["infratest"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.global.mode, ValidationMode::Live);
    }

    #[test]
    fn test_env_subcommand_with_globals() {
        let cli = Cli::try_parse_from([
            "infratest",
            "env",
            "production",
            "--mode",
            "policy",
            "--root",
            "/srv/infra",
            "--export",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Env(args)) => {
                assert_eq!(args.environment, Environment::Production);
                assert!(args.run.export);
            }
            _ => panic!("expected env subcommand"),
        }
        assert_eq!(cli.global.mode, ValidationMode::Policy);
        assert_eq!(cli.global.report_dir(), PathBuf::from("/srv/infra"));
    }

    #[test]
    fn test_rejects_unknown_environment_and_mode() {
        assert!(Cli::try_parse_from(["infratest", "env", "qa"]).is_err());
        assert!(Cli::try_parse_from(["infratest", "--mode", "hybrid", "modules"]).is_err());
    }

    #[tokio::test]
    async fn test_preflight_reports_missing_tools() {
        let temp = tempdir().unwrap();
        let root = temp.path().to_str().unwrap();
        let mock = MockRunner::new().without_program("terraform");

        let cli = Cli::try_parse_from(["infratest", "--root", root, "-q", "modules"]).unwrap();
        let harness = cli.global.build_runner_with(Arc::new(mock.clone())).await.unwrap();
        assert_eq!(cli.global.preflight(&harness, &mock).await, vec!["terraform".to_string()]);

        let cli =
            Cli::try_parse_from(["infratest", "--root", root, "--dry-run", "modules"]).unwrap();
        assert!(cli.global.preflight(&harness, &mock).await.is_empty());
    }
}
