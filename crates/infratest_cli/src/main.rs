//! infratest CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success (every check passed, or the menu was left)
//! - 1: General error
//! - 3: At least one check failed

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod menu;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const VALIDATION_FAILURE: u8 = 3;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let result = match cli.command.clone().unwrap_or(Commands::Menu) {
        Commands::Menu => commands::menu::execute(&cli.global).await.map(|()| true),
        Commands::Modules(args) => commands::run::modules(&cli.global, args).await,
        Commands::Backend(args) => commands::run::backend(&cli.global, args).await,
        Commands::Environments(args) => commands::run::environments(&cli.global, args).await,
        Commands::Env(args) => commands::run::environment(&cli.global, args).await,
    };

    match result {
        Ok(true) => ExitCode::from(ExitCodes::SUCCESS),
        Ok(false) => ExitCode::from(ExitCodes::VALIDATION_FAILURE),
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(ExitCodes::GENERAL_ERROR)
        }
    }
}

fn init_logging(cli: &Cli) {
    let level = if cli.global.verbose {
        "debug"
    } else if cli.global.quiet {
        "warn"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "infratest={level},infratest_core={level},infratest_runner={level},warn"
        ))
    });

    // Logging already initialized is not an error.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
