//! Catalog listing and per-localization operations

use anyhow::{Context, Result};
use serde::Serialize;

use limbus_launcher::models::{Format, Localization, Status};
use limbus_launcher::state::{Operation, Outcome};
use limbus_launcher::AppContext;

use crate::cli::output::{print_formatted, OutputFormat};

#[derive(Serialize)]
struct CatalogEntry {
    id: String,
    name: String,
    version: String,
    installed_version: Option<String>,
    outdated: bool,
    status: Status,
    flag: Option<String>,
    authors: Vec<String>,
    format: Format,
}

#[derive(Serialize)]
struct CatalogResult {
    source: Option<String>,
    localizations: Vec<CatalogEntry>,
}

#[derive(Serialize)]
struct OperationResult {
    id: String,
    command: &'static str,
    succeeded: bool,
    installed_version: Option<String>,
}

pub async fn list(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    if let Some(error) = ctx.catalog.error() {
        anyhow::bail!("Failed to fetch localizations: {}", error);
    }

    let result = CatalogResult {
        source: ctx.catalog.source().or_else(|| ctx.state.selected_source()),
        localizations: ctx
            .catalog
            .all()
            .into_iter()
            .map(|l| CatalogEntry {
                installed_version: ctx.state.installed_version(&l.id),
                outdated: ctx.state.is_localization_outdated(&l),
                status: ctx.actions.status(&l.id),
                flag: ctx.catalog.flag(&l.id),
                id: l.id,
                name: l.name,
                version: l.version,
                authors: l.authors,
                format: l.format,
            })
            .collect(),
    };

    print_formatted(&result, format, format_catalog_text);
    Ok(())
}

fn format_catalog_text(r: &CatalogResult) -> String {
    if r.localizations.is_empty() {
        return "No localizations available".to_string();
    }

    r.localizations
        .iter()
        .map(|l| {
            let installed = match (&l.installed_version, l.outdated) {
                (Some(v), true) => format!("installed {} -> {}", v, l.version),
                (Some(v), false) => format!("installed {}", v),
                (None, _) => l.version.clone(),
            };
            let mut line = format!("{:<16} {:<24} {}", l.id, l.name, installed);
            if l.status.is_busy() {
                line.push_str(&format!(" [{}]", l.status.description()));
            }
            if !l.authors.is_empty() {
                line.push_str(&format!(" by {}", l.authors.join(", ")));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn find(ctx: &AppContext, id: &str) -> Result<Localization> {
    ctx.catalog
        .get(id)
        .with_context(|| format!("Unknown localization: {}", id))
}

pub async fn run(
    ctx: &AppContext,
    operation: Operation,
    id: &str,
    format: OutputFormat,
) -> Result<()> {
    let localization = find(ctx, id)?;
    let outcome = ctx.actions.run(operation, &localization).await?;

    let result = OperationResult {
        id: localization.id.clone(),
        command: operation.command(),
        succeeded: outcome == Outcome::Succeeded,
        installed_version: ctx.state.installed_version(&localization.id),
    };

    // Text mode already got the notification
    if format == OutputFormat::Json {
        print_formatted(&result, format, |_| String::new());
    }

    if outcome == Outcome::Failed {
        anyhow::bail!("{} did not complete", operation.command());
    }
    Ok(())
}
