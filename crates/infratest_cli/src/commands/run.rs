//! Non-interactive commands: run one group of checks, print, optionally export.

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use infratest_core::{report, Environment, InfrastructureTestRunner, RunSummary};

use super::GlobalArgs;

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Export a JSON report after the run
    #[arg(long)]
    pub export: bool,

    /// Print results as JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone, Debug)]
pub struct EnvArgs {
    /// Environment to validate: dev, staging or prod
    pub environment: Environment,

    #[command(flatten)]
    pub run: RunArgs,
}

pub async fn modules(global: &GlobalArgs, args: RunArgs) -> Result<bool> {
    let mut runner = global.build_runner().await?;
    announce(&args, "🧪 Testing infrastructure modules...");
    let summary = runner.test_modules().await;
    finish(global, &args, &runner, summary)
}

pub async fn backend(global: &GlobalArgs, args: RunArgs) -> Result<bool> {
    let mut runner = global.build_runner().await?;
    announce(&args, "🔒 Testing backend configuration...");
    let summary = runner.test_backend().await;
    finish(global, &args, &runner, summary)
}

pub async fn environments(global: &GlobalArgs, args: RunArgs) -> Result<bool> {
    let mut runner = global.build_runner().await?;
    announce(&args, "🌍 Testing all environments...");
    let summary = runner.test_all_environments().await;
    finish(global, &args, &runner, summary)
}

pub async fn environment(global: &GlobalArgs, args: EnvArgs) -> Result<bool> {
    let mut runner = global.build_runner().await?;
    announce(
        &args.run,
        &format!("🌍 Testing {} environment...", args.environment.display_name().to_lowercase()),
    );
    let summary = runner.test_environment(args.environment).await?;
    finish(global, &args.run, &runner, summary)
}

/// Text banner; JSON output stays a single document.
fn announce(args: &RunArgs, banner: &str) {
    if !args.json {
        println!("{}", banner);
    }
}

/// Print the run, export if asked, and report whether every check passed.
fn finish(
    global: &GlobalArgs,
    args: &RunArgs,
    runner: &InfrastructureTestRunner,
    summary: RunSummary,
) -> Result<bool> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(runner.results())?);
    } else {
        print!("{}", report::render(runner.results()));
    }

    if args.export {
        let dir = global.report_dir();
        let path = runner
            .export_report(&dir)
            .with_context(|| format!("Failed to export report to {}", dir.display()))?;
        if args.json {
            info!("Test report exported to {}", path.display());
        } else {
            println!("📄 Test report exported to {}", path.display());
        }
    }

    info!("Run finished: {}/{} passed", summary.passed, summary.total);
    Ok(summary.all_passed())
}
