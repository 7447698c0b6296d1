//! Scripted in-memory backend for store tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::{broadcast, Semaphore};

use super::{command, Backend, BackendEvent, EVENT_CAPACITY};
use crate::error::{CoreError, Result};
use crate::models::{
    AppSettings, AppState, Format, InstalledLocalization, InstalledMetadata, Localization, Progress,
    RemoteLocalizations,
};

/// Mutable script and call log
#[derive(Default)]
pub struct FakeScript {
    pub app_state: AppState,
    pub localizations: Vec<Localization>,
    pub latest_version: String,
    /// Commands that fail with `BackendCallFailed`
    pub failing: HashSet<&'static str>,
    /// Every command received, in order
    pub calls: Vec<&'static str>,
    pub saved_settings: Vec<AppSettings>,
    /// Progress emitted by `update_and_play` before it resolves
    pub play_events: Vec<Progress>,
    /// Emit `app_state_updated` after successful install/uninstall
    pub echo_state: bool,
}

pub struct FakeBackend {
    script: Mutex<FakeScript>,
    events: broadcast::Sender<BackendEvent>,
    holding: AtomicBool,
    gate: Semaphore,
}

impl Default for FakeBackend {
    fn default() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            script: Mutex::new(FakeScript {
                latest_version: "v0.1.0".to_string(),
                ..Default::default()
            }),
            events,
            holding: AtomicBool::new(false),
            gate: Semaphore::new(0),
        }
    }
}

impl FakeBackend {
    pub fn with_state(app_state: AppState) -> Self {
        let backend = Self::default();
        backend.script().app_state = app_state;
        backend
    }

    pub fn script(&self) -> MutexGuard<'_, FakeScript> {
        self.script.lock().unwrap()
    }

    pub fn fail(&self, command: &'static str) {
        self.script().failing.insert(command);
    }

    pub fn succeed(&self, command: &'static str) {
        self.script().failing.remove(command);
    }

    pub fn calls(&self, command: &str) -> usize {
        self.script().calls.iter().filter(|c| **c == command).count()
    }

    /// Park every subsequent command until [`FakeBackend::release`]
    pub fn hold(&self) {
        self.holding.store(true, Ordering::SeqCst);
    }

    /// Let `n` parked (or future) commands through
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn emit(&self, event: BackendEvent) {
        let _ = self.events.send(event);
    }

    async fn enter(&self, command: &'static str) -> Result<()> {
        self.script().calls.push(command);

        if self.holding.load(Ordering::SeqCst) {
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
        }

        if self.script().failing.contains(command) {
            return Err(CoreError::backend(command, "forced failure"));
        }
        Ok(())
    }

    fn set_installed(&self, localization: &Localization, installed: bool) {
        let state = {
            let mut script = self.script();
            if !script.echo_state {
                return;
            }
            let metadata = script
                .app_state
                .installed_metadata
                .get_or_insert_with(InstalledMetadata::default);
            if installed {
                metadata.installed.insert(
                    localization.id.clone(),
                    InstalledLocalization {
                        id: localization.id.clone(),
                        version: localization.version.clone(),
                        source: "main".to_string(),
                    },
                );
            } else {
                metadata.installed.remove(&localization.id);
            }
            script.app_state.clone()
        };
        self.emit(BackendEvent::AppStateUpdated(state));
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn get_app_state(&self) -> Result<AppState> {
        self.enter(command::GET_APP_STATE).await?;
        Ok(self.script().app_state.clone())
    }

    async fn update_settings(&self, settings: &AppSettings) -> Result<()> {
        self.enter(command::UPDATE_SETTINGS).await?;
        self.script().saved_settings.push(settings.clone());
        Ok(())
    }

    async fn set_game_directory(&self, directory: Option<&str>) -> Result<()> {
        self.enter(command::SET_GAME_DIRECTORY).await?;
        self.script().app_state.settings.game_directory = directory.map(str::to_string);
        Ok(())
    }

    async fn get_available_localizations(&self) -> Result<Vec<Localization>> {
        self.enter(command::GET_AVAILABLE_LOCALIZATIONS).await?;
        Ok(self.script().localizations.clone())
    }

    async fn get_latest_version(&self) -> Result<String> {
        self.enter(command::GET_LATEST_VERSION).await?;
        Ok(self.script().latest_version.clone())
    }

    async fn install_localization(&self, localization: &Localization) -> Result<()> {
        self.enter(command::INSTALL_LOCALIZATION).await?;
        self.set_installed(localization, true);
        Ok(())
    }

    async fn uninstall_localization(&self, localization: &Localization) -> Result<()> {
        self.enter(command::UNINSTALL_LOCALIZATION).await?;
        self.set_installed(localization, false);
        Ok(())
    }

    async fn repair_localization(&self, localization: &Localization) -> Result<()> {
        self.enter(command::REPAIR_LOCALIZATION).await?;
        self.set_installed(localization, true);
        Ok(())
    }

    async fn update_and_play(&self) -> Result<()> {
        let events = self.script().play_events.clone();
        for progress in events {
            self.emit(BackendEvent::Play(progress));
        }
        self.enter(command::UPDATE_AND_PLAY).await
    }

    fn subscribe(&self) -> broadcast::Receiver<BackendEvent> {
        self.events.subscribe()
    }
}

/// A catalog entry with the given id, name and version
pub fn localization(id: &str, name: &str, version: &str) -> Localization {
    Localization {
        id: id.to_string(),
        version: version.to_string(),
        name: name.to_string(),
        flag: "US".to_string(),
        icon: String::new(),
        description: String::new(),
        authors: vec!["Translator".to_string()],
        url: format!("https://example.com/{}.zip", id),
        font: None,
        format: Format::Compatible,
    }
}

/// App state with one source and the given installed `(id, version)` pairs
pub fn app_state(installed: &[(&str, &str)]) -> AppState {
    let mut state = AppState::default();
    state.settings.selected_source = Some("main".to_string());
    state.settings.sources.insert(
        "main".to_string(),
        crate::models::LocalizationSource {
            name: "Main".to_string(),
            url: "https://example.com/localizations.json".to_string(),
        },
    );
    let mut metadata = InstalledMetadata::default();
    for (id, version) in installed {
        metadata.installed.insert(
            id.to_string(),
            InstalledLocalization {
                id: id.to_string(),
                version: version.to_string(),
                source: "main".to_string(),
            },
        );
    }
    state.installed_metadata = Some(metadata);
    state
}

pub fn remote(localizations: Vec<Localization>) -> RemoteLocalizations {
    RemoteLocalizations {
        source: "main".to_string(),
        localizations,
    }
}
