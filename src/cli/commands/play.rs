//! Update-and-play with a live progress timeline

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Notify;

use limbus_launcher::models::Progress;
use limbus_launcher::state::Outcome;
use limbus_launcher::AppContext;

use crate::cli::output::OutputFormat;

/// How long to wait for trailing progress events after the command resolves
const SETTLE_TIMEOUT: Duration = Duration::from_millis(500);

fn describe(progress: &Progress) -> String {
    match progress {
        Progress::Started => "Checking installed localizations".to_string(),
        Progress::GameRunning => "The game is already running".to_string(),
        Progress::UnknownLocalization { id } => format!("{}: not in the catalog, skipped", id),
        Progress::UpToDate { id } => format!("{}: up to date", id),
        Progress::Updating { id } => format!("{}: updating...", id),
        Progress::UpdateFinished { id } => format!("{}: updated", id),
        Progress::StartingGame => "Starting the game".to_string(),
        Progress::Finished => "Done".to_string(),
    }
}

/// Print entries past `printed`, returning the new count
fn print_new(ctx: &AppContext, printed: usize, format: OutputFormat, quiet: bool) -> usize {
    let entries = ctx.progress.entries_since(printed);
    for entry in &entries {
        match format {
            OutputFormat::Json => {
                if let Ok(line) = serde_json::to_string(entry) {
                    println!("{}", line);
                }
            }
            OutputFormat::Text if !quiet => println!("{}", describe(entry)),
            OutputFormat::Text => {}
        }
    }
    printed + entries.len()
}

pub async fn run(ctx: &AppContext, format: OutputFormat, quiet: bool) -> Result<()> {
    let changed = Arc::new(Notify::new());
    let _subscription = ctx.progress.subscribe({
        let changed = changed.clone();
        move || changed.notify_one()
    });

    let run = ctx.actions.update_and_play();
    tokio::pin!(run);

    let mut printed = 0;
    let outcome = loop {
        tokio::select! {
            outcome = &mut run => break outcome?,
            _ = changed.notified() => printed = print_new(ctx, printed, format, quiet),
        }
    };

    // Events can still be in the listener queue when the response lands
    let _ = tokio::time::timeout(SETTLE_TIMEOUT, async {
        loop {
            printed = print_new(ctx, printed, format, quiet);
            if ctx.progress.is_finished() {
                break;
            }
            changed.notified().await;
        }
    })
    .await;

    if outcome == Outcome::Failed {
        anyhow::bail!("Update and play did not complete");
    }
    Ok(())
}
