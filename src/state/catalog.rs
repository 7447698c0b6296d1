//! Catalog of installable localizations from the selected remote source.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use icu_collator::{Collator, CollatorOptions, Strength};
use tokio::sync::broadcast;

use super::{lock, ResetOnDrop};
use crate::backend::{Backend, BackendEvent};
use crate::models::{Localization, RemoteLocalizations};
use crate::notify::{Observers, Subscription};
use crate::task::{spawn_listener, Listener};

/// Remote flag images keyed by ISO country code
pub const DEFAULT_FLAG_URL_TEMPLATE: &str =
    "https://purecatamphetamine.github.io/country-flag-icons/3x2/{flag}.svg";

/// Finds a flag image for a country code: a bundled SVG when one exists,
/// otherwise the remote URL template.
#[derive(Debug, Clone)]
pub struct FlagResolver {
    assets_dir: Option<PathBuf>,
    url_template: String,
}

impl Default for FlagResolver {
    fn default() -> Self {
        Self::new(None, DEFAULT_FLAG_URL_TEMPLATE)
    }
}

impl FlagResolver {
    pub fn new(assets_dir: Option<PathBuf>, url_template: &str) -> Self {
        Self {
            assets_dir,
            url_template: url_template.to_string(),
        }
    }

    pub fn remote_url(&self, flag: &str) -> String {
        self.url_template.replace("{flag}", flag)
    }

    /// Never fails: any problem with the local asset falls back to the URL
    pub async fn resolve(&self, flag: &str) -> String {
        // Codes end up in a path; anything but [A-Za-z0-9_-] goes remote
        let safe = !flag.is_empty()
            && flag
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        if let (Some(dir), true) = (&self.assets_dir, safe) {
            let path = dir.join(format!("{}.svg", flag));
            match tokio::fs::try_exists(&path).await {
                Ok(true) => return path.to_string_lossy().into_owned(),
                Ok(false) => {}
                Err(e) => tracing::debug!("Flag asset check failed for {:?}: {}", path, e),
            }
        }
        self.remote_url(flag)
    }

    /// Resolve flags for every localization concurrently, keyed by id
    pub async fn resolve_all(&self, localizations: &[Localization]) -> BTreeMap<String, String> {
        let lookups = localizations.iter().map(|l| async move {
            let flag = self.resolve(&l.flag).await;
            (l.id.clone(), flag)
        });
        futures::future::join_all(lookups).await.into_iter().collect()
    }
}

/// Root-locale collator for display names
fn name_collator() -> Option<Collator> {
    let mut options = CollatorOptions::new();
    options.strength = Some(Strength::Tertiary);
    match Collator::try_new(&Default::default(), options) {
        Ok(collator) => Some(collator),
        Err(e) => {
            tracing::warn!("Name collation unavailable, sorting by lowercase: {}", e);
            None
        }
    }
}

#[derive(Default)]
struct CatalogInner {
    by_id: BTreeMap<String, Localization>,
    flags: BTreeMap<String, String>,
    source: Option<String>,
    is_loading: bool,
    error: Option<String>,
    /// Bumped by every applied push; a refresh that started before the
    /// latest push discards its result
    generation: u64,
}

impl CatalogInner {
    /// Swap packages and flags together so readers never see one without
    /// the other
    fn replace(&mut self, localizations: Vec<Localization>, flags: BTreeMap<String, String>) {
        self.by_id = localizations.into_iter().map(|l| (l.id.clone(), l)).collect();
        self.flags = flags;
    }
}

/// Available localizations, refreshed independently of application state
#[derive(Clone)]
pub struct CatalogStore {
    inner: Arc<Mutex<CatalogInner>>,
    backend: Arc<dyn Backend>,
    flags: FlagResolver,
    observers: Observers,
    listener: Arc<Listener>,
}

impl CatalogStore {
    pub fn new(backend: Arc<dyn Backend>, flags: FlagResolver) -> Self {
        Self {
            inner: Arc::default(),
            backend,
            flags,
            observers: Observers::default(),
            listener: Arc::default(),
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.observers.subscribe(callback)
    }

    /// Begin applying `remote_localizations_updated` pushes from `events`
    pub fn start(&self, events: broadcast::Receiver<BackendEvent>) {
        let store = self.clone();
        self.listener.replace(spawn_listener("catalog", events, move |event| {
            let store = store.clone();
            async move {
                if let BackendEvent::RemoteLocalizationsUpdated(remote) = event {
                    store.apply_push(remote).await;
                }
            }
        }));
    }

    pub fn stop(&self) {
        self.listener.stop();
    }

    /// Fetch the catalog. Failure is stored in [`CatalogStore::error`] and the
    /// previous list stays available. A call made while a refresh is running
    /// returns immediately.
    pub async fn refresh(&self) {
        let generation = {
            let mut inner = lock(&self.inner);
            if inner.is_loading {
                tracing::debug!("Catalog refresh already in progress");
                return;
            }
            inner.is_loading = true;
            inner.error = None;
            inner.generation
        };
        self.observers.notify();

        let _loading = ResetOnDrop::new(|| {
            lock(&self.inner).is_loading = false;
            self.observers.notify();
        });

        match self.backend.get_available_localizations().await {
            Ok(localizations) => {
                let flags = self.flags.resolve_all(&localizations).await;
                let mut inner = lock(&self.inner);
                if inner.generation == generation {
                    tracing::info!("Fetched {} localizations", localizations.len());
                    inner.replace(localizations, flags);
                } else {
                    tracing::debug!("Discarding catalog superseded by a push");
                }
            }
            Err(e) => {
                tracing::warn!("Failed to fetch localizations: {}", e);
                lock(&self.inner).error = Some(e.to_string());
            }
        }
    }

    /// Replace the catalog with a backend-pushed list. Does not touch the
    /// loading flag or error of a concurrent refresh.
    pub async fn apply_push(&self, remote: RemoteLocalizations) {
        let flags = self.flags.resolve_all(&remote.localizations).await;
        {
            let mut inner = lock(&self.inner);
            inner.replace(remote.localizations, flags);
            inner.source = Some(remote.source);
            inner.generation += 1;
        }
        self.observers.notify();
    }

    /// Localizations ordered by name using Unicode collation, names that
    /// collate equal in id order
    pub fn all(&self) -> Vec<Localization> {
        let mut all: Vec<Localization> = lock(&self.inner).by_id.values().cloned().collect();
        match name_collator() {
            Some(collator) => all.sort_by(|a, b| collator.compare(&a.name, &b.name)),
            None => all.sort_by_cached_key(|l| l.name.to_lowercase()),
        }
        all
    }

    pub fn get(&self, id: &str) -> Option<Localization> {
        lock(&self.inner).by_id.get(id).cloned()
    }

    pub fn flag(&self, id: &str) -> Option<String> {
        lock(&self.inner).flags.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.inner).is_loading
    }

    pub fn error(&self) -> Option<String> {
        lock(&self.inner).error.clone()
    }

    /// Source key of the last pushed catalog
    pub fn source(&self) -> Option<String> {
        lock(&self.inner).source.clone()
    }
}
