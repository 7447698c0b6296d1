//! Ordered log of `play:*` events for the current update-and-play run.

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use super::lock;
use crate::backend::BackendEvent;
use crate::models::Progress;
use crate::notify::{Observers, Subscription};
use crate::task::{spawn_listener, Listener};

/// Append-only progress timeline. Only the operation coordinator clears it,
/// at the start of a new run.
#[derive(Clone, Default)]
pub struct ProgressRecorder {
    log: Arc<Mutex<Vec<Progress>>>,
    observers: Observers,
    listener: Arc<Listener>,
}

impl ProgressRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.observers.subscribe(callback)
    }

    /// Begin recording `play:*` events from `events`
    pub fn start(&self, events: broadcast::Receiver<BackendEvent>) {
        let recorder = self.clone();
        self.listener.replace(spawn_listener("progress", events, move |event| {
            if let BackendEvent::Play(progress) = event {
                recorder.record(progress);
            }
            async {}
        }));
    }

    pub fn stop(&self) {
        self.listener.stop();
    }

    fn record(&self, progress: Progress) {
        tracing::debug!("Progress: {:?}", progress);
        lock(&self.log).push(progress);
        self.observers.notify();
    }

    pub(crate) fn clear(&self) {
        lock(&self.log).clear();
        self.observers.notify();
    }

    /// The whole timeline in arrival order
    pub fn entries(&self) -> Vec<Progress> {
        lock(&self.log).clone()
    }

    /// Entries from position `offset` on, for incremental rendering
    pub fn entries_since(&self, offset: usize) -> Vec<Progress> {
        lock(&self.log).get(offset..).map(<[_]>::to_vec).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        lock(&self.log).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The run reported its final step
    pub fn is_finished(&self) -> bool {
        lock(&self.log).last() == Some(&Progress::Finished)
    }
}
