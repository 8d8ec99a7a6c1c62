//! Error types for the state layer.

use thiserror::Error;

use crate::path::{Path, PathError};

/// Errors raised while navigating or writing the state tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Path validation error.
    #[error("path error: {0}")]
    Path(#[from] PathError),

    /// Nothing lives at the path.
    #[error("no state at path '{path}'")]
    NotFound { path: Path },

    /// The value at the path cannot hold children.
    #[error("state at '{path}' is not an object")]
    NotContainer { path: Path },

    /// The container was torn down and no longer accepts writes.
    #[error("container has been destroyed")]
    Destroyed,
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;
    use std::error::Error as StdError;

    #[test]
    fn not_found_display() {
        let e = Error::NotFound {
            path: path!("a/b"),
        };
        assert_eq!(e.to_string(), "no state at path 'a/b'");
    }

    #[test]
    fn path_error_conversion_keeps_source() {
        let e: Error = PathError::InvalidPath {
            message: "bad".to_string(),
        }
        .into();
        assert!(matches!(e, Error::Path(_)));
        assert!(e.to_string().contains("path error"));
        assert!(StdError::source(&e).is_none());
    }

    #[test]
    fn destroyed_display() {
        assert_eq!(Error::Destroyed.to_string(), "container has been destroyed");
    }
}
