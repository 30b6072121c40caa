//! Interactive menu.
//!
//! The loop takes its input as a channel of lines and is generic over its
//! output and interrupt, so that it can be driven from stdin and Ctrl-C in
//! the binary and from buffers in tests.

use std::future::Future;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::str::FromStr;
use std::thread;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use infratest_core::{report, Environment, InfrastructureTestRunner};

const MENU: &str = "\
=== Azure Infrastructure Testing Framework ===
1. Test Infrastructure Modules
2. Test Backend Configuration
3. Test All Environments
4. Test Development Environment
5. Test Staging Environment
6. Test Production Environment
7. View Test Results
8. Export Test Report
9. Exit";

/// One menu entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    TestModules,
    TestBackend,
    TestAllEnvironments,
    TestEnvironment(Environment),
    ViewResults,
    ExportReport,
    Exit,
}

impl FromStr for MenuChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(Self::TestModules),
            "2" => Ok(Self::TestBackend),
            "3" => Ok(Self::TestAllEnvironments),
            "4" => Ok(Self::TestEnvironment(Environment::Development)),
            "5" => Ok(Self::TestEnvironment(Environment::Staging)),
            "6" => Ok(Self::TestEnvironment(Environment::Production)),
            "7" => Ok(Self::ViewResults),
            "8" => Ok(Self::ExportReport),
            "9" => Ok(Self::Exit),
            other => Err(other.to_string()),
        }
    }
}

/// How the menu loop ended. Every outcome maps to exit status 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuOutcome {
    /// The user picked Exit.
    Exited,
    /// Input ended; module tests were run once.
    NonInteractive,
    /// The interrupt fired.
    Interrupted,
}

/// Lines typed by the user. A closed channel is end of input.
pub type MenuInput = mpsc::Receiver<io::Result<String>>;

/// Read stdin on a detached thread.
///
/// A blocking read cannot be cancelled, so it must not live on the runtime:
/// the process can then exit on interrupt while the thread is still parked
/// in `read`.
pub fn stdin_lines() -> MenuInput {
    let (tx, rx) = mpsc::channel(1);
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let failed = line.is_err();
            if tx.blocking_send(line).is_err() || failed {
                break;
            }
        }
        debug!("stdin reader finished");
    });
    rx
}

/// Feed fixed text to the menu, one line per message.
pub fn scripted_lines(text: &str) -> MenuInput {
    let lines: Vec<&str> = text.lines().collect();
    let (tx, rx) = mpsc::channel(lines.len().max(1));
    for line in lines {
        // Capacity covers every line, so this never fails.
        let _ = tx.try_send(Ok(line.to_string()));
    }
    rx
}

/// Run the menu until exit, end of input or interrupt.
///
/// An in-flight check is dropped when `interrupt` completes, which kills any
/// child process it had started. Only I/O errors on `output` or `input`
/// escape; failing operations are reported and the loop continues.
pub async fn run_menu<W, I>(
    runner: &mut InfrastructureTestRunner,
    report_dir: &Path,
    mut input: MenuInput,
    output: &mut W,
    interrupt: I,
) -> Result<MenuOutcome>
where
    W: Write,
    I: Future<Output = ()>,
{
    tokio::pin!(interrupt);

    loop {
        writeln!(output, "\n{}", MENU)?;
        write!(output, "\nEnter your choice (1-9): ")?;
        output.flush()?;

        let line = tokio::select! {
            biased;
            _ = &mut interrupt => None,
            line = input.recv() => Some(line.transpose()?),
        };
        let Some(line) = line else {
            return interrupted(output);
        };

        let Some(line) = line else {
            writeln!(output, "\nNon-interactive mode detected. Running module tests...")?;
            let done = tokio::select! {
                biased;
                _ = &mut interrupt => false,
                _ = runner.test_modules() => true,
            };
            if !done {
                return interrupted(output);
            }
            print_summary(runner, 0, output)?;
            return Ok(MenuOutcome::NonInteractive);
        };

        let choice = match line.parse::<MenuChoice>() {
            Ok(choice) => choice,
            Err(_) => {
                writeln!(output, "\nInvalid choice. Please try again.")?;
                continue;
            }
        };

        if choice == MenuChoice::Exit {
            writeln!(output, "\nExiting...")?;
            return Ok(MenuOutcome::Exited);
        }

        let handled = tokio::select! {
            biased;
            _ = &mut interrupt => None,
            handled = dispatch(choice, runner, report_dir, output) => Some(handled),
        };
        match handled {
            None => return interrupted(output),
            Some(Ok(())) => {}
            Some(Err(e)) => {
                error!("Error executing choice {:?}: {:#}", choice, e);
                writeln!(output, "\nError executing operation: {:#}", e)?;
            }
        }
    }
}

async fn dispatch<W: Write>(
    choice: MenuChoice,
    runner: &mut InfrastructureTestRunner,
    report_dir: &Path,
    output: &mut W,
) -> Result<()> {
    let before = runner.results().len();
    match choice {
        MenuChoice::TestModules => {
            writeln!(output, "\nTesting infrastructure modules...")?;
            runner.test_modules().await;
            print_summary(runner, before, output)?;
        }
        MenuChoice::TestBackend => {
            writeln!(output, "\nTesting backend configuration...")?;
            runner.test_backend().await;
            print_summary(runner, before, output)?;
        }
        MenuChoice::TestAllEnvironments => {
            writeln!(output, "\nTesting all environments...")?;
            runner.test_all_environments().await;
            print_summary(runner, before, output)?;
        }
        MenuChoice::TestEnvironment(env) => {
            writeln!(output, "\nTesting {} environment...", env.display_name().to_lowercase())?;
            runner.test_environment(env).await?;
            print_summary(runner, before, output)?;
        }
        MenuChoice::ViewResults => {
            write!(output, "{}", report::render(runner.results()))?;
        }
        MenuChoice::ExportReport => {
            if runner.results().is_empty() {
                writeln!(output, "\nNo test results to export.")?;
            } else {
                let path = runner.export_report(report_dir)?;
                writeln!(output, "\nTest report exported to {}", path.display())?;
            }
        }
        MenuChoice::Exit => {}
    }
    Ok(())
}

fn print_summary<W: Write>(
    runner: &InfrastructureTestRunner,
    from: usize,
    output: &mut W,
) -> Result<()> {
    let added = &runner.results()[from..];
    let passed = added.iter().filter(|r| r.passed()).count();
    writeln!(output, "\nTotal Tests: {}", added.len())?;
    writeln!(output, "Passed: {}", passed)?;
    writeln!(output, "Failed: {}", added.len() - passed)?;
    Ok(())
}

fn interrupted<W: Write>(output: &mut W) -> Result<MenuOutcome> {
    info!("Menu interrupted");
    writeln!(output, "\nOperation cancelled by user.")?;
    Ok(MenuOutcome::Interrupted)
}
