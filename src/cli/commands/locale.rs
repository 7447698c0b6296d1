//! Interface language resolution

use anyhow::Result;
use serde::Serialize;

use limbus_launcher::config::Config;
use limbus_launcher::i18n;

use crate::cli::output::{print_formatted, OutputFormat};

#[derive(Serialize)]
struct LocaleResult {
    system_locale: Option<String>,
    configured: Option<String>,
    resolved: &'static str,
    supported: Vec<String>,
}

pub async fn run(config: &Config, format: OutputFormat) -> Result<()> {
    let result = LocaleResult {
        system_locale: i18n::detect_system_locale(),
        configured: config.launcher.language.clone(),
        resolved: i18n::initial_language(config.launcher.language.as_deref()),
        supported: i18n::locale_data().languages.keys().cloned().collect(),
    };

    print_formatted(&result, format, |r| {
        let name = i18n::language_name(r.resolved).unwrap_or(r.resolved);
        format!(
            "System locale: {}\nConfigured:    {}\nResolved:      {} ({})\nSupported:     {}",
            r.system_locale.as_deref().unwrap_or("<unknown>"),
            r.configured.as_deref().unwrap_or("<none>"),
            r.resolved,
            name,
            r.supported.join(", ")
        )
    });
    Ok(())
}
