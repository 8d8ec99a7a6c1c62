//! Error types for the store runtime.

use modstore_state::Path;
use thiserror::Error;

/// Failure produced by an action handler.
pub type ActionError = Box<dyn std::error::Error + Send + Sync>;

/// Usage errors surfaced by the store.
///
/// Recoverable conditions (unknown types, hot-reload conflicts, strict-mode
/// violations) never show up here; they are reported as diagnostics.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Object-style commit/dispatch without a string `type` field.
    #[error("expects string as the type, but found {found}")]
    InvalidType { found: String },

    /// `register_module` was called with the empty path.
    #[error("cannot register the root module by using register_module")]
    RootRegistration,

    /// A path did not resolve to a module.
    #[error("module not found at '{path}'")]
    ModuleNotFound { path: Path },

    /// `Host::init` was called twice.
    #[error("host already initialized; init should be called only once")]
    AlreadyInitialized,

    /// A store was created against a host that was never initialized.
    #[error("host must be initialized before creating a store")]
    HostNotInitialized,

    /// State tree navigation or write failure.
    #[error("state error: {0}")]
    State(#[from] modstore_state::Error),

    /// Typed state conversion failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use modstore_state::path;
    use std::error::Error as StdError;

    #[test]
    fn invalid_type_display() {
        let e = StoreError::InvalidType {
            found: "number".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "expects string as the type, but found number"
        );
    }

    #[test]
    fn module_not_found_display() {
        let e = StoreError::ModuleNotFound { path: path!("a/b") };
        assert!(e.to_string().contains("a/b"));
    }

    #[test]
    fn state_error_has_source() {
        let e: StoreError = modstore_state::Error::Destroyed.into();
        assert!(StdError::source(&e).is_some());
    }

    #[test]
    fn action_error_from_str() {
        let e: ActionError = "boom".into();
        assert_eq!(e.to_string(), "boom");
    }
}
