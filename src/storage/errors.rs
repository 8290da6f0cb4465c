//! Storage errors.

use std::io::ErrorKind;

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors returned by every storage verb. None are retried or swallowed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    /// A note collection that cannot be stored as given.
    #[error("invalid note: {0}")]
    InvalidNote(String),

    #[error("storage error: {0}")]
    Other(String),
}

impl StorageError {
    /// Classify an I/O failure on `subject` (a key or path).
    pub fn from_io(subject: &str, err: std::io::Error) -> Self {
        match err.kind() {
            ErrorKind::NotFound => StorageError::NotFound(subject.to_string()),
            ErrorKind::PermissionDenied => StorageError::PermissionDenied(subject.to_string()),
            _ => StorageError::Other(format!("{subject}: {err}")),
        }
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Other(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Other(format!("serialization: {err}"))
    }
}
