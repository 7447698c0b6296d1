//! Backend command surface and push-event feed.
//!
//! The backend process owns the filesystem, the network and the game; the
//! stores only issue commands through [`Backend`] and observe the
//! [`BackendEvent`] feed it publishes.

mod process;

#[cfg(test)]
pub mod fake;

pub use process::ProcessBackend;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::models::{AppSettings, AppState, Localization, Progress, RemoteLocalizations};

/// Buffered push events per subscriber before the slowest one starts lagging
pub const EVENT_CAPACITY: usize = 256;

/// Command names as understood by the backend
pub mod command {
    pub const GET_APP_STATE: &str = "get_app_state";
    pub const UPDATE_SETTINGS: &str = "update_settings";
    pub const SET_GAME_DIRECTORY: &str = "set_game_directory";
    pub const GET_AVAILABLE_LOCALIZATIONS: &str = "get_available_localizations";
    pub const GET_LATEST_VERSION: &str = "get_latest_version";
    pub const INSTALL_LOCALIZATION: &str = "install_localization";
    pub const UNINSTALL_LOCALIZATION: &str = "uninstall_localization";
    pub const REPAIR_LOCALIZATION: &str = "repair_localization";
    pub const UPDATE_AND_PLAY: &str = "update_and_play";
}

/// Request/response commands. Every call may fail with `BackendCallFailed`.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn get_app_state(&self) -> Result<AppState>;

    async fn update_settings(&self, settings: &AppSettings) -> Result<()>;

    async fn set_game_directory(&self, directory: Option<&str>) -> Result<()>;

    async fn get_available_localizations(&self) -> Result<Vec<Localization>>;

    /// May carry a leading `v` marker
    async fn get_latest_version(&self) -> Result<String>;

    async fn install_localization(&self, localization: &Localization) -> Result<()>;

    async fn uninstall_localization(&self, localization: &Localization) -> Result<()>;

    async fn repair_localization(&self, localization: &Localization) -> Result<()>;

    /// Emits the `play:*` progress stream, then resolves
    async fn update_and_play(&self) -> Result<()>;

    /// A new receiver for push events, delivered in backend order
    fn subscribe(&self) -> broadcast::Receiver<BackendEvent>;
}

/// Unsolicited notification from the backend
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// `app_state_updated`: full replacement of the aggregate
    AppStateUpdated(AppState),
    /// `remote_localizations_updated`: full replacement of the catalog
    RemoteLocalizationsUpdated(RemoteLocalizations),
    /// `play:*`: one step of an update-and-play run
    Play(Progress),
}

impl BackendEvent {
    /// Decode an event from its channel name and JSON payload.
    /// Unknown channels yield `Ok(None)`.
    pub fn from_wire(channel: &str, payload: Value) -> serde_json::Result<Option<Self>> {
        let event = match channel {
            "app_state_updated" => Some(BackendEvent::AppStateUpdated(serde_json::from_value(payload)?)),
            "remote_localizations_updated" => Some(BackendEvent::RemoteLocalizationsUpdated(
                serde_json::from_value(payload)?,
            )),
            _ => Progress::from_channel(channel, payload.as_str()).map(BackendEvent::Play),
        };
        Ok(event)
    }

    pub fn channel(&self) -> &'static str {
        match self {
            BackendEvent::AppStateUpdated(_) => "app_state_updated",
            BackendEvent::RemoteLocalizationsUpdated(_) => "remote_localizations_updated",
            BackendEvent::Play(progress) => match progress {
                Progress::Started => "play:started",
                Progress::GameRunning => "play:game_running",
                Progress::UnknownLocalization { .. } => "play:unknown_localization",
                Progress::UpToDate { .. } => "play:up_to_date",
                Progress::Updating { .. } => "play:updating",
                Progress::UpdateFinished { .. } => "play:update_finished",
                Progress::StartingGame => "play:starting_game",
                Progress::Finished => "play:finished",
            },
        }
    }
}
