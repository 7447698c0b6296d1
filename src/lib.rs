//! Client-side state core for the Limbus Company localization launcher.
//!
//! The stores in [`state`] mirror what an external backend process reports,
//! apply local edits optimistically, and coordinate the operations a user can
//! trigger. [`context::AppContext`] wires them together.

pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod i18n;
pub mod models;
pub mod notify;
pub mod state;
pub mod task;
pub mod version;

pub use context::AppContext;
pub use error::{CoreError, Result};
