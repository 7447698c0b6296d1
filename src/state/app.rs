//! Application state store: settings and installed-localization metadata
//! as last reported by the backend, with optimistic local edits.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use super::{lock, ResetOnDrop};
use crate::backend::{Backend, BackendEvent};
use crate::error::{CoreError, Result};
use crate::models::{AppSettings, AppState, InstalledLocalization, Localization, LocalizationSource};
use crate::notify::{Observers, Subscription};
use crate::task::{spawn_listener, Listener};
use crate::version;

/// Result of a [`StateStore::persist`] request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// Settings were sent to the backend
    Saved,
    /// Another save was in flight; this request was dropped
    Skipped,
}

struct StateInner {
    state: Option<AppState>,
    is_loading: bool,
    is_saving: bool,
    latest_version: Option<String>,
    /// Bumped by every applied push; lets an in-flight load detect that it
    /// has been superseded
    generation: u64,
}

/// Canonical application state
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<Mutex<StateInner>>,
    backend: Arc<dyn Backend>,
    observers: Observers,
    listener: Arc<Listener>,
    /// Used when settings carry no language
    fallback_language: &'static str,
    current_version: Arc<str>,
}

impl StateStore {
    pub fn new(backend: Arc<dyn Backend>, fallback_language: &'static str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StateInner {
                state: None,
                is_loading: false,
                is_saving: false,
                latest_version: None,
                generation: 0,
            })),
            backend,
            observers: Observers::default(),
            listener: Arc::default(),
            fallback_language,
            current_version: Arc::from(version::APP_VERSION),
        }
    }

    /// Override the version `is_update_available` compares against
    pub fn with_current_version(mut self, current: &str) -> Self {
        self.current_version = Arc::from(current);
        self
    }

    /// Register a change callback
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.observers.subscribe(callback)
    }

    /// Begin applying `app_state_updated` pushes from `events`
    pub fn start(&self, events: broadcast::Receiver<BackendEvent>) {
        let store = self.clone();
        self.listener.replace(spawn_listener("state", events, move |event| {
            if let BackendEvent::AppStateUpdated(state) = event {
                store.apply_push(state);
            }
            async {}
        }));
    }

    pub fn stop(&self) {
        self.listener.stop();
    }

    /// Fetch the aggregate from the backend. A call made while another load
    /// is outstanding returns immediately. On failure the previous state is
    /// kept and the error is returned as `LoadFailed`.
    pub async fn load(&self) -> Result<()> {
        let generation = {
            let mut inner = lock(&self.inner);
            if inner.is_loading {
                tracing::debug!("State load already in progress");
                return Ok(());
            }
            inner.is_loading = true;
            inner.generation
        };
        self.observers.notify();

        let _loading = ResetOnDrop::new(|| {
            lock(&self.inner).is_loading = false;
            self.observers.notify();
        });

        let state = self.backend.get_app_state().await.map_err(|e| {
            tracing::error!("Failed to load application state: {}", e);
            CoreError::LoadFailed(e.to_string())
        })?;

        let mut inner = lock(&self.inner);
        if inner.generation == generation {
            inner.state = Some(state);
            tracing::info!("Application state loaded");
        } else {
            tracing::debug!("Discarding loaded state superseded by a push");
        }
        Ok(())
    }

    /// Replace the whole aggregate with a backend-pushed value
    pub fn apply_push(&self, state: AppState) {
        {
            let mut inner = lock(&self.inner);
            inner.state = Some(state);
            inner.generation += 1;
        }
        tracing::debug!("Applied pushed application state");
        self.observers.notify();
    }

    /// Mutate the local settings in one step, failing if nothing is loaded
    fn edit_settings(&self, edit: impl FnOnce(&mut AppSettings)) -> Result<()> {
        {
            let mut inner = lock(&self.inner);
            let state = inner.state.as_mut().ok_or(CoreError::NotLoaded)?;
            edit(&mut state.settings);
        }
        self.observers.notify();
        Ok(())
    }

    pub async fn set_language(&self, language: &str) -> Result<PersistOutcome> {
        self.edit_settings(|settings| settings.language = Some(language.to_string()))?;
        self.persist().await
    }

    pub async fn select_source(&self, source: &str) -> Result<PersistOutcome> {
        self.edit_settings(|settings| settings.selected_source = Some(source.to_string()))?;
        self.persist().await
    }

    /// Point at a game directory (`None` = default location). Applied locally
    /// at once; the backend validates it and echoes the new state. If the
    /// backend rejects it and no push arrived meanwhile, the previous value
    /// is restored.
    pub async fn set_game_directory(&self, directory: Option<String>) -> Result<()> {
        let (previous, generation) = {
            let mut inner = lock(&self.inner);
            let generation = inner.generation;
            let state = inner.state.as_mut().ok_or(CoreError::NotLoaded)?;
            let previous = std::mem::replace(&mut state.settings.game_directory, directory.clone());
            (previous, generation)
        };
        self.observers.notify();

        let result = self.backend.set_game_directory(directory.as_deref()).await;

        if let Err(e) = &result {
            tracing::error!("Failed to set game directory: {}", e);
            let restored = {
                let mut inner = lock(&self.inner);
                let unchanged = inner.generation == generation;
                match inner.state.as_mut() {
                    Some(state) if unchanged && state.settings.game_directory == directory => {
                        state.settings.game_directory = previous;
                        true
                    }
                    _ => false,
                }
            };
            if restored {
                self.observers.notify();
            }
        }
        result
    }

    /// Send the current settings to the backend. Dropped (not queued) when a
    /// save is already in flight.
    pub async fn persist(&self) -> Result<PersistOutcome> {
        let settings = {
            let mut inner = lock(&self.inner);
            let Some(state) = inner.state.as_ref() else {
                return Err(CoreError::NotLoaded);
            };
            let settings = state.settings.clone();
            if inner.is_saving {
                tracing::debug!("Settings save already in flight, dropping request");
                return Ok(PersistOutcome::Skipped);
            }
            inner.is_saving = true;
            settings
        };
        self.observers.notify();

        let _saving = ResetOnDrop::new(|| {
            lock(&self.inner).is_saving = false;
            self.observers.notify();
        });

        self.backend.update_settings(&settings).await.map_err(|e| {
            tracing::error!("Failed to save settings: {}", e);
            e
        })?;
        tracing::debug!("Settings saved");
        Ok(PersistOutcome::Saved)
    }

    /// Ask the backend for the newest launcher release
    pub async fn load_latest_version(&self) -> Result<()> {
        let latest = self.backend.get_latest_version().await.map_err(|e| {
            tracing::warn!("Failed to check latest version: {}", e);
            e
        })?;
        lock(&self.inner).latest_version = Some(latest);
        self.observers.notify();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Derived views
    // ------------------------------------------------------------------

    /// Copy of the whole aggregate, if loaded
    pub fn snapshot(&self) -> Option<AppState> {
        lock(&self.inner).state.clone()
    }

    pub fn settings(&self) -> Option<AppSettings> {
        lock(&self.inner).state.as_ref().map(|s| s.settings.clone())
    }

    pub fn is_ready(&self) -> bool {
        lock(&self.inner).state.is_some()
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.inner).is_loading
    }

    pub fn is_saving(&self) -> bool {
        lock(&self.inner).is_saving
    }

    /// Installed localizations; empty when unknown
    pub fn installed(&self) -> BTreeMap<String, InstalledLocalization> {
        lock(&self.inner)
            .state
            .as_ref()
            .and_then(|s| s.installed_metadata.as_ref())
            .map(|m| m.installed.clone())
            .unwrap_or_default()
    }

    pub fn installed_version(&self, id: &str) -> Option<String> {
        lock(&self.inner)
            .state
            .as_ref()
            .and_then(|s| s.installed_metadata.as_ref())
            .and_then(|m| m.installed.get(id))
            .map(|l| l.version.clone())
    }

    pub fn has_installed_localizations(&self) -> bool {
        lock(&self.inner)
            .state
            .as_ref()
            .and_then(|s| s.installed_metadata.as_ref())
            .is_some_and(|m| !m.installed.is_empty())
    }

    pub fn game_directory(&self) -> Option<String> {
        lock(&self.inner)
            .state
            .as_ref()
            .and_then(|s| s.settings.game_directory.clone())
    }

    pub fn sources(&self) -> BTreeMap<String, LocalizationSource> {
        lock(&self.inner)
            .state
            .as_ref()
            .map(|s| s.settings.sources.clone())
            .unwrap_or_default()
    }

    pub fn selected_source(&self) -> Option<String> {
        lock(&self.inner)
            .state
            .as_ref()
            .and_then(|s| s.settings.selected_source.clone())
    }

    /// Language from settings, else the resolver's default
    pub fn resolved_language(&self) -> String {
        lock(&self.inner)
            .state
            .as_ref()
            .and_then(|s| s.settings.language.clone())
            .unwrap_or_else(|| self.fallback_language.to_string())
    }

    pub fn latest_version(&self) -> Option<String> {
        lock(&self.inner).latest_version.clone()
    }

    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    /// A newer launcher release exists
    pub fn is_update_available(&self) -> bool {
        let latest = self.latest_version();
        version::differs(Some(&self.current_version), latest.as_deref())
    }

    /// The catalog offers a different version of an installed localization
    pub fn is_localization_outdated(&self, localization: &Localization) -> bool {
        let installed = self.installed_version(&localization.id);
        version::differs(installed.as_deref(), Some(&localization.version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::command;
    use crate::backend::fake::{app_state, localization, FakeBackend};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn store(backend: &Arc<FakeBackend>) -> StateStore {
        StateStore::new(backend.clone(), "en")
    }

    async fn loaded(installed: &[(&str, &str)]) -> (Arc<FakeBackend>, StateStore) {
        let backend = Arc::new(FakeBackend::with_state(app_state(installed)));
        let store = store(&backend);
        store.load().await.unwrap();
        (backend, store)
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_load_populates_state() {
        let (_backend, store) = loaded(&[("p1", "1.0.0")]).await;
        assert!(store.is_ready());
        assert!(!store.is_loading());
        assert_eq!(store.installed_version("p1").as_deref(), Some("1.0.0"));
        assert!(store.has_installed_localizations());
        assert_eq!(store.selected_source().as_deref(), Some("main"));
        assert_eq!(store.sources()["main"].name, "Main");
    }

    #[tokio::test]
    async fn test_load_failure_keeps_prior_state() {
        let backend = Arc::new(FakeBackend::with_state(app_state(&[])));
        backend.fail(command::GET_APP_STATE);
        let store = store(&backend);

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, CoreError::LoadFailed(_)));
        assert!(!store.is_ready());
        assert!(!store.is_loading());

        backend.succeed(command::GET_APP_STATE);
        store.load().await.unwrap();
        backend.fail(command::GET_APP_STATE);
        assert!(store.load().await.is_err());
        assert!(store.is_ready(), "a failed reload keeps the loaded state");
    }

    #[tokio::test]
    async fn test_concurrent_load_is_single_flight() {
        let backend = Arc::new(FakeBackend::with_state(app_state(&[])));
        backend.hold();
        let store = store(&backend);

        let first = tokio::spawn({
            let store = store.clone();
            async move { store.load().await }
        });
        wait_until(|| store.is_loading()).await;

        // Re-entrant call is a no-op, not queued
        store.load().await.unwrap();
        assert!(!store.is_ready());

        backend.release(1);
        first.await.unwrap().unwrap();
        assert!(store.is_ready());
        assert_eq!(backend.calls(command::GET_APP_STATE), 1);
    }

    #[tokio::test]
    async fn test_push_during_load_wins() {
        let backend = Arc::new(FakeBackend::with_state(app_state(&[])));
        backend.hold();
        let store = store(&backend);

        let load = tokio::spawn({
            let store = store.clone();
            async move { store.load().await }
        });
        wait_until(|| store.is_loading()).await;

        store.apply_push(app_state(&[("p9", "3.0")]));
        backend.release(1);
        load.await.unwrap().unwrap();

        assert_eq!(store.installed_version("p9").as_deref(), Some("3.0"));
    }

    #[tokio::test]
    async fn test_setters_require_loaded_state() {
        let backend = Arc::new(FakeBackend::default());
        let store = store(&backend);

        assert_eq!(store.set_language("ru").await, Err(CoreError::NotLoaded));
        assert_eq!(store.select_source("main").await, Err(CoreError::NotLoaded));
        assert_eq!(store.set_game_directory(None).await, Err(CoreError::NotLoaded));
        assert_eq!(store.persist().await, Err(CoreError::NotLoaded));
        assert_eq!(backend.calls(command::UPDATE_SETTINGS), 0);
    }

    #[tokio::test]
    async fn test_set_language_is_optimistic_and_persisted() {
        let (backend, store) = loaded(&[]).await;
        assert_eq!(store.resolved_language(), "en");

        let outcome = store.set_language("ru").await.unwrap();
        assert_eq!(outcome, PersistOutcome::Saved);
        assert_eq!(store.resolved_language(), "ru");

        let saved = backend.script().saved_settings.clone();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].language.as_deref(), Some("ru"));
    }

    #[tokio::test]
    async fn test_local_edit_visible_before_persist_settles() {
        let (backend, store) = loaded(&[]).await;
        backend.hold();

        let save = tokio::spawn({
            let store = store.clone();
            async move { store.select_source("mirror").await }
        });
        wait_until(|| store.is_saving()).await;
        assert_eq!(store.selected_source().as_deref(), Some("mirror"));

        backend.release(1);
        assert_eq!(save.await.unwrap().unwrap(), PersistOutcome::Saved);
        assert!(!store.is_saving());
    }

    #[tokio::test]
    async fn test_persist_while_saving_is_dropped() {
        let (backend, store) = loaded(&[]).await;
        backend.hold();

        let first = tokio::spawn({
            let store = store.clone();
            async move { store.set_language("ru").await }
        });
        wait_until(|| store.is_saving()).await;

        let second = store.set_language("en").await.unwrap();
        assert_eq!(second, PersistOutcome::Skipped);
        // The optimistic edit still applied locally
        assert_eq!(store.resolved_language(), "en");

        backend.release(1);
        assert_eq!(first.await.unwrap().unwrap(), PersistOutcome::Saved);
        assert_eq!(backend.calls(command::UPDATE_SETTINGS), 1);
        assert_eq!(backend.script().saved_settings[0].language.as_deref(), Some("ru"));
    }

    #[tokio::test]
    async fn test_persist_notifies_on_saving_edges() {
        let (backend, store) = loaded(&[]).await;
        backend.hold();
        let changes = Arc::new(AtomicUsize::new(0));
        let counter = changes.clone();
        let _sub = store.subscribe(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let save = tokio::spawn({
            let store = store.clone();
            async move { store.persist().await }
        });
        wait_until(|| store.is_saving()).await;
        assert_eq!(changes.load(Ordering::SeqCst), 1);

        backend.release(1);
        assert_eq!(save.await.unwrap().unwrap(), PersistOutcome::Saved);
        assert!(!store.is_saving());
        assert_eq!(changes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_persist_failure_is_reported_and_clears_flag() {
        let (backend, store) = loaded(&[]).await;
        backend.fail(command::UPDATE_SETTINGS);

        let err = store.set_language("ru").await.unwrap_err();
        assert!(matches!(err, CoreError::BackendCallFailed { .. }));
        assert!(!store.is_saving());

        backend.succeed(command::UPDATE_SETTINGS);
        assert_eq!(store.persist().await.unwrap(), PersistOutcome::Saved);
    }

    #[tokio::test]
    async fn test_push_replaces_optimistic_edit() {
        let (backend, store) = loaded(&[]).await;
        store.set_language("ru").await.unwrap();

        let mut pushed = app_state(&[("p1", "2.0")]);
        pushed.settings.language = Some("en".to_string());
        store.apply_push(pushed.clone());

        assert_eq!(store.snapshot(), Some(pushed));
        assert_eq!(store.resolved_language(), "en");
        drop(backend);
    }

    #[tokio::test]
    async fn test_set_game_directory_rollback_on_rejection() {
        let (backend, store) = loaded(&[]).await;
        store.set_game_directory(Some("/games/ok".into())).await.unwrap();
        assert_eq!(store.game_directory().as_deref(), Some("/games/ok"));

        backend.fail(command::SET_GAME_DIRECTORY);
        let err = store.set_game_directory(Some("/nope".into())).await.unwrap_err();
        assert!(matches!(err, CoreError::BackendCallFailed { .. }));
        assert_eq!(store.game_directory().as_deref(), Some("/games/ok"));
    }

    #[tokio::test]
    async fn test_set_game_directory_rollback_skipped_after_push() {
        let (backend, store) = loaded(&[]).await;
        backend.fail(command::SET_GAME_DIRECTORY);
        backend.hold();

        let call = tokio::spawn({
            let store = store.clone();
            async move { store.set_game_directory(Some("/nope".into())).await }
        });
        wait_until(|| store.game_directory().is_some()).await;

        let mut pushed = app_state(&[]);
        pushed.settings.game_directory = Some("/from/backend".into());
        store.apply_push(pushed);

        backend.release(1);
        assert!(call.await.unwrap().is_err());
        assert_eq!(store.game_directory().as_deref(), Some("/from/backend"));
    }

    #[tokio::test]
    async fn test_update_available() {
        let (backend, store) = loaded(&[]).await;
        let store = store.with_current_version("1.0.0");
        assert!(!store.is_update_available(), "unknown latest version");

        backend.script().latest_version = "v1.0.0".to_string();
        store.load_latest_version().await.unwrap();
        assert!(!store.is_update_available());

        backend.script().latest_version = "v1.1.0".to_string();
        store.load_latest_version().await.unwrap();
        assert!(store.is_update_available());
    }

    #[tokio::test]
    async fn test_localization_outdated() {
        let (_backend, store) = loaded(&[("p1", "1.0.0")]).await;
        assert!(store.is_localization_outdated(&localization("p1", "One", "1.1.0")));
        assert!(!store.is_localization_outdated(&localization("p1", "One", "1.0.0")));
        assert!(!store.is_localization_outdated(&localization("p2", "Two", "1.0.0")));
    }

    #[tokio::test]
    async fn test_push_events_flow_through_listener() {
        let (backend, store) = loaded(&[]).await;
        let changes = Arc::new(AtomicUsize::new(0));
        let counter = changes.clone();
        let _sub = store.subscribe(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.start(backend.subscribe());
        backend.emit(BackendEvent::AppStateUpdated(app_state(&[("p2", "0.5")])));
        wait_until(|| store.installed_version("p2").is_some()).await;
        assert!(changes.load(Ordering::SeqCst) >= 1);

        store.stop();
        tokio::task::yield_now().await;
        backend.emit(BackendEvent::AppStateUpdated(app_state(&[])));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.installed_version("p2").as_deref(), Some("0.5"));
    }
}
