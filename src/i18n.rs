//! Language resolution and localized notification text.
//!
//! Supported languages, the locale fallback table and the message catalog are
//! embedded from `embedded/locales.toml` at compile time and parsed lazily on
//! first access.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;

const LOCALES_TOML: &str = include_str!("../embedded/locales.toml");

/// Embedded language data
#[derive(Debug, Deserialize)]
pub struct LocaleData {
    /// Language used when nothing else matches
    pub default: String,
    /// Supported code -> display name
    pub languages: BTreeMap<String, String>,
    /// Normalized locale tag or bare language -> supported code
    #[serde(default)]
    pub fallbacks: BTreeMap<String, String>,
    /// Supported code -> message key -> template
    #[serde(default)]
    pub messages: BTreeMap<String, BTreeMap<String, String>>,
}

/// Get embedded language data (lazy-loaded)
pub fn locale_data() -> &'static LocaleData {
    static DATA: OnceLock<LocaleData> = OnceLock::new();
    DATA.get_or_init(|| {
        toml::from_str(LOCALES_TOML).unwrap_or_else(|e| {
            panic!("Failed to parse locales.toml: {}", e);
        })
    })
}

/// The system default language code
pub fn default_language() -> &'static str {
    &locale_data().default
}

/// Whether `code` is one of the shipped languages
pub fn is_supported(code: &str) -> bool {
    locale_data().languages.contains_key(code)
}

/// Display name for a supported language
pub fn language_name(code: &str) -> Option<&'static str> {
    locale_data().languages.get(code).map(String::as_str)
}

/// Turn an OS locale string (`ru_RU.UTF-8`, `en-US`, `uk_UA@euro`) into a
/// lowercase dash-separated tag (`ru-ru`, `en-us`, `uk-ua`).
fn normalize_tag(locale: &str) -> String {
    let tag = locale
        .split(['.', '@'])
        .next()
        .unwrap_or_default()
        .trim();
    tag.replace('_', "-").to_lowercase()
}

/// Resolve a detected locale to a supported language code.
///
/// Order: exact supported tag, fallback entry for the full tag, the bare
/// language subtag (supported or via fallback), then the default. Total for
/// every input, `None` included.
pub fn resolve_language(locale: Option<&str>) -> &'static str {
    let data = locale_data();

    let Some(tag) = locale.map(normalize_tag).filter(|t| !t.is_empty()) else {
        return default_language();
    };

    let lookup = |key: &str| -> Option<&'static str> {
        if let Some((code, _)) = data.languages.get_key_value(key) {
            return Some(code.as_str());
        }
        data.fallbacks
            .get(key)
            .filter(|target| data.languages.contains_key(target.as_str()))
            .map(String::as_str)
    };

    if let Some(code) = lookup(&tag) {
        return code;
    }

    let primary = tag.split('-').next().unwrap_or_default();
    lookup(primary).unwrap_or_else(default_language)
}

/// Read the OS locale. Detection failure is reported as `None`.
pub fn detect_system_locale() -> Option<String> {
    let locale = sys_locale::get_locale();
    if locale.is_none() {
        tracing::warn!("Failed to detect system locale, falling back to {}", default_language());
    }
    locale
}

/// Language to use when settings carry none: configured override first,
/// then the detected OS locale.
pub fn initial_language(override_code: Option<&str>) -> &'static str {
    match override_code {
        Some(code) => resolve_language(Some(code)),
        None => resolve_language(detect_system_locale().as_deref()),
    }
}

/// Look up a message in `language`, falling back to the default language and
/// finally to the key itself. `{name}` placeholders are replaced from `args`.
pub fn translate(language: &str, key: &str, args: &[(&str, &str)]) -> String {
    let data = locale_data();
    let template = data
        .messages
        .get(language)
        .and_then(|m| m.get(key))
        .or_else(|| data.messages.get(&data.default).and_then(|m| m.get(key)));

    let Some(template) = template else {
        tracing::debug!("Missing translation for '{}' in '{}'", key, language);
        return key.to_string();
    };

    args.iter().fold(template.clone(), |text, (name, value)| {
        text.replace(&format!("{{{}}}", name), value)
    })
}
