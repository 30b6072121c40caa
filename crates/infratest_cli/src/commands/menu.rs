//! Menu command - interactive session on stdin/stdout.

use anyhow::Result;

use super::GlobalArgs;
use crate::menu::{run_menu, stdin_lines};

pub async fn execute(global: &GlobalArgs) -> Result<()> {
    let mut runner = global.build_runner().await?;
    let report_dir = global.report_dir();
    let mut output = std::io::stdout();

    let interrupt = async {
        // Without a signal handler the menu can still be left with option 9.
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    let outcome = run_menu(&mut runner, &report_dir, stdin_lines(), &mut output, interrupt).await?;
    tracing::debug!("Menu finished: {:?}", outcome);
    Ok(())
}
