//! Application state and version commands

use anyhow::Result;
use serde::Serialize;

use limbus_launcher::models::InstalledLocalization;
use limbus_launcher::AppContext;

use crate::cli::output::{print_formatted, OutputFormat};

#[derive(Serialize)]
struct StateResult {
    language: String,
    selected_source: Option<String>,
    sources: Vec<SourceResult>,
    game_directory: Option<String>,
    installed: Vec<InstalledLocalization>,
}

#[derive(Serialize)]
struct SourceResult {
    key: String,
    name: String,
    url: String,
}

#[derive(Serialize)]
struct VersionResult {
    current: String,
    latest: Option<String>,
    update_available: bool,
}

pub async fn show(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    let state = &ctx.state;
    let result = StateResult {
        language: state.resolved_language(),
        selected_source: state.selected_source(),
        sources: state
            .sources()
            .into_iter()
            .map(|(key, source)| SourceResult {
                key,
                name: source.name,
                url: source.url,
            })
            .collect(),
        game_directory: state.game_directory(),
        installed: state.installed().into_values().collect(),
    };

    print_formatted(&result, format, format_state_text);
    Ok(())
}

fn format_state_text(r: &StateResult) -> String {
    let mut lines = vec![
        format!("Language:       {}", r.language),
        format!(
            "Game directory: {}",
            r.game_directory.as_deref().unwrap_or("<default>")
        ),
        "Sources:".to_string(),
    ];
    for source in &r.sources {
        let marker = if r.selected_source.as_deref() == Some(source.key.as_str()) {
            "*"
        } else {
            " "
        };
        lines.push(format!("  {} {} ({}) {}", marker, source.key, source.name, source.url));
    }
    if r.installed.is_empty() {
        lines.push("No localizations installed".to_string());
    } else {
        lines.push("Installed:".to_string());
        for entry in &r.installed {
            lines.push(format!("  {} {} [{}]", entry.id, entry.version, entry.source));
        }
    }
    lines.join("\n")
}

pub async fn version(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    let result = VersionResult {
        current: ctx.state.current_version().to_string(),
        latest: ctx.state.latest_version(),
        update_available: ctx.state.is_update_available(),
    };

    print_formatted(&result, format, |r| {
        let latest = r.latest.as_deref().unwrap_or("unknown");
        if r.update_available {
            format!("{} (update available: {})", r.current, latest)
        } else {
            format!("{} (latest: {})", r.current, latest)
        }
    });
    Ok(())
}
