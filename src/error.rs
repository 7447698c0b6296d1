//! Error taxonomy for the state core.

use thiserror::Error;

/// Errors surfaced by the stores and the backend seam
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A settings mutation was attempted before the initial state load finished
    #[error("Application state is not loaded")]
    NotLoaded,

    /// Another install/uninstall/repair is still running for this package
    #[error("Operation already in progress for localization: {id}")]
    OperationInProgress { id: String },

    /// `update_and_play` was invoked while a previous run is still going
    #[error("Game is already starting")]
    AlreadyStarting,

    /// A backend command was rejected or the transport failed
    #[error("Backend command '{command}' failed: {message}")]
    BackendCallFailed { command: String, message: String },

    /// Initial state or catalog fetch failed
    #[error("Load failed: {0}")]
    LoadFailed(String),
}

impl CoreError {
    /// Build a `BackendCallFailed` for the named command
    pub fn backend(command: &str, message: impl Into<String>) -> Self {
        CoreError::BackendCallFailed {
            command: command.to_string(),
            message: message.into(),
        }
    }

    /// Guard violations are programmer errors; callers should disable the
    /// controls that trigger them instead of retrying.
    pub fn is_guard_violation(&self) -> bool {
        matches!(
            self,
            CoreError::NotLoaded | CoreError::OperationInProgress { .. } | CoreError::AlreadyStarting
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(CoreError::NotLoaded.to_string(), "Application state is not loaded");
        assert_eq!(
            CoreError::OperationInProgress { id: "p1".into() }.to_string(),
            "Operation already in progress for localization: p1"
        );
        assert_eq!(
            CoreError::backend("install_localization", "Game is running").to_string(),
            "Backend command 'install_localization' failed: Game is running"
        );
    }

    #[test]
    fn test_guard_violation_classification() {
        assert!(CoreError::NotLoaded.is_guard_violation());
        assert!(CoreError::AlreadyStarting.is_guard_violation());
        assert!(CoreError::OperationInProgress { id: "x".into() }.is_guard_violation());
        assert!(!CoreError::backend("get_app_state", "boom").is_guard_violation());
        assert!(!CoreError::LoadFailed("offline".into()).is_guard_violation());
    }
}
