//! Error types for storage backends

use std::path::PathBuf;

/// Errors raised by a [`StorageBackend`](crate::StorageBackend)
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// IO error while reading or writing the backing file
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Backing document is not a JSON object of strings
    #[error("corrupt store document {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Backend refused the operation
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl BackendError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create corrupt-document error for path
    pub fn corrupt(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Corrupt {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for backend operations
pub type BackendResult<T> = Result<T, BackendError>;
