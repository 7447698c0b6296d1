//! Push-event listener tasks
//!
//! Stores consume the backend feed on their own tokio task. A [`Listener`]
//! owns that task so `start()` / `stop()` are explicit and teardown is
//! deterministic.

use std::future::Future;
use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::backend::BackendEvent;

/// Spawn a task that feeds every received event to `handler`, one at a time
/// and in delivery order. Ends when the feed closes.
pub fn spawn_listener<F, Fut>(
    name: &'static str,
    mut events: broadcast::Receiver<BackendEvent>,
    mut handler: F,
) -> JoinHandle<()>
where
    F: FnMut(BackendEvent) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    tracing::trace!("{} <- {}", name, event.channel());
                    handler(event).await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("{} listener lagged, {} events dropped", name, skipped);
                }
                Err(RecvError::Closed) => {
                    tracing::debug!("{} listener: feed closed", name);
                    break;
                }
            }
        }
    })
}

/// Slot holding at most one running listener task
#[derive(Default)]
pub struct Listener {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Listener {
    /// Install `handle` as the running task, stopping any previous one
    pub fn replace(&self, handle: JoinHandle<()>) {
        let previous = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Abort the running task, if any
    pub fn stop(&self) {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.stop();
    }
}
