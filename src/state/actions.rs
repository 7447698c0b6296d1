//! Per-localization operations (install, uninstall, repair) and the
//! composite "update and play" run.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{lock, ProgressRecorder, ResetOnDrop, StateStore};
use crate::backend::{command, Backend};
use crate::error::{CoreError, Result};
use crate::i18n;
use crate::models::{Localization, Status};
use crate::notify::{Notification, Notifier, Observers, Subscription};

/// A mutating per-localization operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Install,
    Uninstall,
    Repair,
}

impl Operation {
    /// Status held while the operation runs
    pub fn status(self) -> Status {
        match self {
            Operation::Install => Status::Installing,
            Operation::Uninstall => Status::Uninstalling,
            Operation::Repair => Status::Repairing,
        }
    }

    pub fn command(self) -> &'static str {
        match self {
            Operation::Install => command::INSTALL_LOCALIZATION,
            Operation::Uninstall => command::UNINSTALL_LOCALIZATION,
            Operation::Repair => command::REPAIR_LOCALIZATION,
        }
    }

    fn success_key(self) -> &'static str {
        match self {
            Operation::Install => "localization.installed",
            Operation::Uninstall => "localization.uninstalled",
            Operation::Repair => "localization.repaired",
        }
    }

    fn error_key(self) -> &'static str {
        match self {
            Operation::Install => "error.install",
            Operation::Uninstall => "error.uninstall",
            Operation::Repair => "error.repair",
        }
    }
}

/// How a started operation ended. Backend failures are reported to the user
/// through the notifier, not returned as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed,
}

#[derive(Default)]
struct ActionsInner {
    /// Only non-idle entries are stored
    status: HashMap<String, Status>,
    starting_game: bool,
}

/// Operation coordinator: at most one mutating operation per localization id,
/// and at most one update-and-play run.
#[derive(Clone)]
pub struct ActionsStore {
    inner: Arc<Mutex<ActionsInner>>,
    backend: Arc<dyn Backend>,
    state: StateStore,
    progress: ProgressRecorder,
    notifier: Arc<dyn Notifier>,
    observers: Observers,
}

impl ActionsStore {
    pub fn new(
        backend: Arc<dyn Backend>,
        state: StateStore,
        progress: ProgressRecorder,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            inner: Arc::default(),
            backend,
            state,
            progress,
            notifier,
            observers: Observers::default(),
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.observers.subscribe(callback)
    }

    pub fn status(&self, id: &str) -> Status {
        lock(&self.inner).status.get(id).copied().unwrap_or_default()
    }

    pub fn is_starting_game(&self) -> bool {
        lock(&self.inner).starting_game
    }

    pub async fn install(&self, localization: &Localization) -> Result<Outcome> {
        self.run(Operation::Install, localization).await
    }

    pub async fn uninstall(&self, localization: &Localization) -> Result<Outcome> {
        self.run(Operation::Uninstall, localization).await
    }

    pub async fn repair(&self, localization: &Localization) -> Result<Outcome> {
        self.run(Operation::Repair, localization).await
    }

    /// Run `operation` for `localization`. Fails with `OperationInProgress`
    /// without calling the backend if the id is not idle.
    pub async fn run(&self, operation: Operation, localization: &Localization) -> Result<Outcome> {
        let id = localization.id.as_str();
        {
            let mut inner = lock(&self.inner);
            if inner.status.contains_key(id) {
                return Err(CoreError::OperationInProgress { id: id.to_string() });
            }
            inner.status.insert(id.to_string(), operation.status());
        }
        self.observers.notify();

        let _idle = ResetOnDrop::new(|| {
            lock(&self.inner).status.remove(id);
            self.observers.notify();
        });

        tracing::info!("{:?} {} {}", operation, id, localization.version);
        let result = match operation {
            Operation::Install => self.backend.install_localization(localization).await,
            Operation::Uninstall => self.backend.uninstall_localization(localization).await,
            Operation::Repair => self.backend.repair_localization(localization).await,
        };

        let language = self.state.resolved_language();
        let args = [
            ("localization", localization.name.as_str()),
            ("version", localization.version.as_str()),
        ];
        match result {
            Ok(()) => {
                let message = i18n::translate(&language, operation.success_key(), &args);
                self.notifier.notify(Notification::success(message));
                Ok(Outcome::Succeeded)
            }
            Err(e) => {
                tracing::error!("{} failed for {}: {}", operation.command(), id, e);
                let message = i18n::translate(&language, operation.error_key(), &args);
                self.notifier.notify(Notification::error(message));
                Ok(Outcome::Failed)
            }
        }
    }

    /// Update every installed localization, then launch the game. The
    /// progress log is cleared before the backend is asked to start.
    pub async fn update_and_play(&self) -> Result<Outcome> {
        {
            let mut inner = lock(&self.inner);
            if inner.starting_game {
                return Err(CoreError::AlreadyStarting);
            }
            inner.starting_game = true;
        }
        self.progress.clear();
        self.observers.notify();

        let _starting = ResetOnDrop::new(|| {
            lock(&self.inner).starting_game = false;
            self.observers.notify();
        });

        match self.backend.update_and_play().await {
            Ok(()) => Ok(Outcome::Succeeded),
            Err(e) => {
                tracing::error!("Update and play failed: {}", e);
                let language = self.state.resolved_language();
                let message = i18n::translate(&language, "error.updateAndPlay", &[]);
                self.notifier.notify(Notification::error(message));
                Ok(Outcome::Failed)
            }
        }
    }
}
