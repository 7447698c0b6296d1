//! Command-line front end over the launcher state core.

mod commands;
mod output;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use limbus_launcher::backend::ProcessBackend;
use limbus_launcher::config::Config;
use limbus_launcher::state::Operation;
use limbus_launcher::AppContext;

use output::OutputFormat;

/// Limbus Company localization launcher
#[derive(Parser, Debug)]
#[command(name = "limbus-launcher")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[command(flatten)]
    pub output: OutputOptions,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output formatting options
#[derive(Parser, Debug, Clone)]
pub struct OutputOptions {
    /// Output in JSON format (for machine parsing)
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

impl OutputOptions {
    pub fn format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show settings and installed localizations
    State,

    /// List localizations offered by the selected source
    Catalog,

    /// Install a localization from the catalog
    Install {
        /// Localization id
        id: String,
    },

    /// Remove an installed localization
    Uninstall {
        /// Localization id
        id: String,
    },

    /// Reinstall a localization over a damaged copy
    Repair {
        /// Localization id
        id: String,
    },

    /// Update installed localizations and start the game
    Play,

    /// Change settings stored by the backend
    Settings {
        #[command(subcommand)]
        command: commands::settings::SettingsCommands,
    },

    /// Show how the interface language is resolved
    Locale,

    /// Show launcher version and whether a newer release exists
    Version,

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: commands::config::ConfigCommands,
    },
}

/// Spawn the configured backend and bring every store up to date
async fn connect(config: &Config, quiet: bool) -> Result<AppContext> {
    let backend = ProcessBackend::spawn(&config.backend.command, &config.backend.args)
        .with_context(|| format!("Failed to start backend '{}'", config.backend.command))?;

    let notifier = Arc::new(output::ConsoleNotifier::new(quiet));
    let ctx = AppContext::new(Arc::new(backend), config, notifier);
    ctx.bootstrap().await.context("Failed to load application state")?;
    Ok(ctx)
}

/// Run the CLI with parsed arguments
pub async fn run(cli: Cli) -> Result<()> {
    let format = cli.output.format();
    let quiet = cli.output.quiet;
    let config = Config::load()?;

    // These never touch the backend
    let command = match cli.command {
        Commands::Locale => return commands::locale::run(&config, format).await,
        Commands::Config { command } => return commands::config::run(command, format, quiet).await,
        command => command,
    };

    let ctx = connect(&config, quiet).await?;
    let result = match command {
        Commands::State => commands::state::show(&ctx, format).await,
        Commands::Version => commands::state::version(&ctx, format).await,
        Commands::Catalog => commands::localizations::list(&ctx, format).await,
        Commands::Install { id } => {
            commands::localizations::run(&ctx, Operation::Install, &id, format).await
        }
        Commands::Uninstall { id } => {
            commands::localizations::run(&ctx, Operation::Uninstall, &id, format).await
        }
        Commands::Repair { id } => {
            commands::localizations::run(&ctx, Operation::Repair, &id, format).await
        }
        Commands::Play => commands::play::run(&ctx, format, quiet).await,
        Commands::Settings { command } => commands::settings::run(&ctx, command, format, quiet).await,
        Commands::Locale | Commands::Config { .. } => Ok(()),
    };
    ctx.stop();
    result
}
