//! Application context: every store, built once at startup and passed to
//! whatever front end sits on top.

use std::path::PathBuf;
use std::sync::Arc;

use crate::backend::Backend;
use crate::config::Config;
use crate::error::Result;
use crate::i18n;
use crate::notify::Notifier;
use crate::state::{ActionsStore, CatalogStore, FlagResolver, ProgressRecorder, StateStore};

#[derive(Clone)]
pub struct AppContext {
    backend: Arc<dyn Backend>,
    pub state: StateStore,
    pub catalog: CatalogStore,
    pub progress: ProgressRecorder,
    pub actions: ActionsStore,
}

impl AppContext {
    pub fn new(backend: Arc<dyn Backend>, config: &Config, notifier: Arc<dyn Notifier>) -> Self {
        let language = i18n::initial_language(config.launcher.language.as_deref());
        tracing::debug!("Fallback language: {}", language);

        let flags = FlagResolver::new(
            config.catalog.flags_dir.as_ref().map(PathBuf::from),
            &config.catalog.flag_url_template,
        );

        let state = StateStore::new(backend.clone(), language);
        let catalog = CatalogStore::new(backend.clone(), flags);
        let progress = ProgressRecorder::new();
        let actions = ActionsStore::new(backend.clone(), state.clone(), progress.clone(), notifier);

        Self {
            backend,
            state,
            catalog,
            progress,
            actions,
        }
    }

    /// Attach every store to the backend push feed
    pub fn start(&self) {
        self.state.start(self.backend.subscribe());
        self.catalog.start(self.backend.subscribe());
        self.progress.start(self.backend.subscribe());
    }

    pub fn stop(&self) {
        self.state.stop();
        self.catalog.stop();
        self.progress.stop();
    }

    /// Start listening, load the application state, then fetch the catalog
    /// and the latest release together. Only a failed state load is fatal.
    pub async fn bootstrap(&self) -> Result<()> {
        self.start();
        self.state.load().await?;

        let (_, latest) = tokio::join!(self.catalog.refresh(), self.state.load_latest_version());
        if let Err(e) = latest {
            tracing::warn!("Continuing without latest version: {}", e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::command;
    use crate::backend::fake::{app_state, localization, remote, FakeBackend};
    use crate::backend::BackendEvent;
    use crate::error::CoreError;
    use crate::models::Progress;
    use crate::notify::LogNotifier;
    use std::time::Duration;

    fn context(backend: &Arc<FakeBackend>) -> AppContext {
        let mut config = Config::default();
        config.launcher.language = Some("en".to_string());
        AppContext::new(backend.clone(), &config, Arc::new(LogNotifier))
    }

    #[tokio::test]
    async fn test_bootstrap_loads_everything() {
        let backend = Arc::new(FakeBackend::with_state(app_state(&[("p1", "1.0.0")])));
        backend.script().localizations = vec![localization("p1", "One", "1.1.0")];
        let ctx = context(&backend);

        ctx.bootstrap().await.unwrap();
        assert!(ctx.state.is_ready());
        assert_eq!(ctx.catalog.len(), 1);
        assert_eq!(ctx.state.latest_version().as_deref(), Some("v0.1.0"));

        let p1 = ctx.catalog.get("p1").unwrap();
        assert!(ctx.state.is_localization_outdated(&p1));
        ctx.stop();
    }

    #[tokio::test]
    async fn test_catalog_without_installed_package_keeps_installed() {
        let backend = Arc::new(FakeBackend::with_state(app_state(&[("p1", "1.0.0")])));
        backend.script().localizations = vec![localization("p1", "One", "1.1.0")];
        let ctx = context(&backend);
        ctx.bootstrap().await.unwrap();
        assert!(ctx.state.is_localization_outdated(&ctx.catalog.get("p1").unwrap()));

        backend.script().localizations = vec![localization("p2", "Two", "1.0.0")];
        ctx.catalog.refresh().await;

        assert!(ctx.catalog.get("p1").is_none());
        assert_eq!(ctx.state.installed_version("p1").as_deref(), Some("1.0.0"));
        assert!(ctx.state.has_installed_localizations());
        ctx.stop();
    }

    #[tokio::test]
    async fn test_bootstrap_failures() {
        let backend = Arc::new(FakeBackend::with_state(app_state(&[])));
        backend.fail(command::GET_LATEST_VERSION);
        backend.fail(command::GET_AVAILABLE_LOCALIZATIONS);
        let ctx = context(&backend);

        // Catalog and version failures are not fatal
        ctx.bootstrap().await.unwrap();
        assert!(ctx.catalog.error().is_some());
        assert!(ctx.state.latest_version().is_none());
        ctx.stop();

        backend.fail(command::GET_APP_STATE);
        let ctx = context(&backend);
        assert!(matches!(ctx.bootstrap().await, Err(CoreError::LoadFailed(_))));
        ctx.stop();
    }

    #[tokio::test]
    async fn test_pushes_reach_each_store() {
        let backend = Arc::new(FakeBackend::with_state(app_state(&[])));
        let ctx = context(&backend);
        ctx.start();

        backend.emit(BackendEvent::AppStateUpdated(app_state(&[("p1", "2.0")])));
        backend.emit(BackendEvent::RemoteLocalizationsUpdated(remote(vec![localization(
            "p1", "One", "2.0",
        )])));
        backend.emit(BackendEvent::Play(Progress::GameRunning));

        for _ in 0..200 {
            if ctx.state.is_ready() && ctx.catalog.len() == 1 && ctx.progress.len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(ctx.state.installed_version("p1").as_deref(), Some("2.0"));
        assert_eq!(ctx.catalog.source().as_deref(), Some("main"));
        assert_eq!(ctx.progress.entries(), vec![Progress::GameRunning]);
        ctx.stop();
    }
}
