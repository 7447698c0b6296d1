//! Data model shared with the backend process.
//!
//! Field names and nesting mirror the backend's JSON exactly; anything that
//! crosses the command/event boundary round-trips through these types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named remote catalog of localizations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizationSource {
    pub name: String,
    pub url: String,
}

/// User settings persisted by the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub sources: BTreeMap<String, LocalizationSource>,
    #[serde(default)]
    pub selected_source: Option<String>,
    /// `None` means "use the default Steam location"
    #[serde(default)]
    pub game_directory: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

/// A localization currently present in the game directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledLocalization {
    #[serde(default)]
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub source: String,
}

/// Installed localizations keyed by id, observed from the backend only
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledMetadata {
    #[serde(default)]
    pub installed: BTreeMap<String, InstalledLocalization>,
}

/// The aggregate delivered by `get_app_state` and `app_state_updated`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppState {
    pub settings: AppSettings,
    #[serde(default)]
    pub installed_metadata: Option<InstalledMetadata>,
}

/// Archive layout of a localization package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Format {
    #[serde(rename = "compatible")]
    Compatible,
    #[serde(rename = "new")]
    New,
    #[serde(untagged)]
    Unknown(String),
}

/// Font shipped alongside a localization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Font {
    pub url: String,
    pub hash: String,
}

/// Catalog descriptor of an installable localization. Never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Localization {
    pub id: String,
    pub version: String,
    pub name: String,
    /// ISO country code used for the flag image
    #[serde(alias = "country")]
    pub flag: String,
    #[serde(default)]
    pub icon: String,
    /// Markdown
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub authors: Vec<String>,
    pub url: String,
    #[serde(default)]
    pub font: Option<Font>,
    pub format: Format,
}

/// Payload of `remote_localizations_updated`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLocalizations {
    #[serde(default)]
    pub source: String,
    pub localizations: Vec<Localization>,
}

/// Per-package operation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Idle,
    Installing,
    Uninstalling,
    /// Reserved; no per-package transition reaches it yet
    Updating,
    Repairing,
}

impl Status {
    /// Whether a busy indicator should be shown
    pub fn is_busy(&self) -> bool {
        !matches!(self, Status::Idle)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Status::Idle => "Ready",
            Status::Installing => "Installing...",
            Status::Uninstalling => "Uninstalling...",
            Status::Updating => "Updating...",
            Status::Repairing => "Repairing...",
        }
    }
}

/// One entry of the "update and play" timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Progress {
    Started,
    GameRunning,
    UnknownLocalization {
        #[serde(rename = "localization")]
        id: String,
    },
    UpToDate {
        #[serde(rename = "localization")]
        id: String,
    },
    Updating {
        #[serde(rename = "localization")]
        id: String,
    },
    UpdateFinished {
        #[serde(rename = "localization")]
        id: String,
    },
    StartingGame,
    Finished,
}

impl Progress {
    /// Build a progress entry from a `play:*` event channel and its payload.
    /// Returns `None` for unknown channels or a missing id payload.
    pub fn from_channel(channel: &str, payload: Option<&str>) -> Option<Self> {
        let id = || payload.map(str::to_string);
        let progress = match channel.strip_prefix("play:")? {
            "started" => Progress::Started,
            "game_running" => Progress::GameRunning,
            "unknown_localization" => Progress::UnknownLocalization { id: id()? },
            "up_to_date" => Progress::UpToDate { id: id()? },
            "updating" => Progress::Updating { id: id()? },
            "update_finished" => Progress::UpdateFinished { id: id()? },
            "starting_game" => Progress::StartingGame,
            "finished" => Progress::Finished,
            _ => return None,
        };
        Some(progress)
    }

    /// Localization id this entry refers to, if any
    pub fn localization(&self) -> Option<&str> {
        match self {
            Progress::UnknownLocalization { id }
            | Progress::UpToDate { id }
            | Progress::Updating { id }
            | Progress::UpdateFinished { id } => Some(id),
            _ => None,
        }
    }
}
