//! Settings stored by the backend

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;

use limbus_launcher::i18n;
use limbus_launcher::state::PersistOutcome;
use limbus_launcher::AppContext;

use crate::cli::output::{print_formatted, print_success, OutputFormat};

#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// Set the interface language
    Language {
        /// Language code (e.g., "en", "ru")
        code: String,
    },

    /// Select the localization source
    Source {
        /// Source key as listed by `state`
        key: String,
    },

    /// Set the game directory
    GameDir {
        /// Directory path; omit to use the default location
        path: Option<String>,
    },
}

#[derive(Serialize)]
struct SettingResult {
    setting: &'static str,
    value: Option<String>,
    saved: bool,
}

pub async fn run(
    ctx: &AppContext,
    command: SettingsCommands,
    format: OutputFormat,
    quiet: bool,
) -> Result<()> {
    let result = match command {
        SettingsCommands::Language { code } => {
            if !i18n::is_supported(&code) {
                anyhow::bail!("Unsupported language: {}", code);
            }
            let outcome = ctx.state.set_language(&code).await?;
            SettingResult {
                setting: "language",
                value: Some(code),
                saved: outcome == PersistOutcome::Saved,
            }
        }
        SettingsCommands::Source { key } => {
            if !ctx.state.sources().contains_key(&key) {
                anyhow::bail!("Unknown source: {}", key);
            }
            let outcome = ctx.state.select_source(&key).await?;
            SettingResult {
                setting: "selected_source",
                value: Some(key),
                saved: outcome == PersistOutcome::Saved,
            }
        }
        SettingsCommands::GameDir { path } => {
            ctx.state.set_game_directory(path).await?;
            SettingResult {
                setting: "game_directory",
                value: ctx.state.game_directory(),
                saved: true,
            }
        }
    };

    match format {
        OutputFormat::Json => print_formatted(&result, format, |_| String::new()),
        OutputFormat::Text => print_success(
            &format!(
                "{} = {}",
                result.setting,
                result.value.as_deref().unwrap_or("<default>")
            ),
            quiet,
        ),
    }
    Ok(())
}
