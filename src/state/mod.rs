//! Application stores
//!
//! Each store is a cheap `Clone` handle over shared state. Check-and-set
//! steps happen inside a single lock scope that never spans an `.await`, and
//! observers are notified only after the lock is released.

mod actions;
mod app;
mod catalog;
mod progress;

pub use actions::{ActionsStore, Operation, Outcome};
pub use app::{PersistOutcome, StateStore};
pub use catalog::{CatalogStore, FlagResolver, DEFAULT_FLAG_URL_TEMPLATE};
pub use progress::ProgressRecorder;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a store mutex, recovering the data if a previous holder panicked
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs the closure when dropped: on success, on error, on panic, and when
/// the owning future is dropped mid-await.
struct ResetOnDrop<F: FnOnce()>(Option<F>);

impl<F: FnOnce()> ResetOnDrop<F> {
    fn new(reset: F) -> Self {
        Self(Some(reset))
    }
}

impl<F: FnOnce()> Drop for ResetOnDrop<F> {
    fn drop(&mut self) {
        if let Some(reset) = self.0.take() {
            reset();
        }
    }
}
