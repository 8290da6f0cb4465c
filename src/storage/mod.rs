//! Durable storage subsystem.
//!
//! # Data Flow
//! ```text
//! application layer (synchronous, on the event-loop task)
//!     → Storage trait (save / load / delete / exists / list / get_notes / save_notes)
//!     → file.rs   (one file per key, temp file + atomic rename)
//!     → sqlite.rs (notes table, kv table)
//! ```
//!
//! # Design Decisions
//! - Both backends answer the same verb set; deployment config picks one
//! - Keys are sanitized before they reach a path or a row
//! - Saving notes replaces the whole collection, never merges
//! - Every failure is returned to the caller; nothing is retried

pub mod errors;
pub mod file;
pub mod notes;
pub mod sqlite;

pub use errors::{StorageError, StorageResult};
pub use file::FileStore;
pub use notes::{Note, NoteCollection};
pub use sqlite::SqliteStore;

use crate::config::{StorageBackendKind, StorageConfig};
use crate::observability::metrics;

/// Suffix of in-flight writes; reserved and never a valid key.
pub const TEMP_SUFFIX: &str = ".tmp";

/// The verb set shared by every backend.
pub trait Storage: Send + std::fmt::Debug {
    /// Create or overwrite `key`.
    fn save(&self, key: &str, bytes: &[u8]) -> StorageResult<()>;

    /// Read `key`, failing with `NotFound` if it was never saved or was deleted.
    fn load(&self, key: &str) -> StorageResult<Vec<u8>>;

    fn delete(&self, key: &str) -> StorageResult<()>;

    fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Every stored key, sorted.
    fn list(&self) -> StorageResult<Vec<String>>;

    /// All notes ordered by id descending, with the next free id.
    fn get_notes(&self) -> StorageResult<NoteCollection>;

    /// Replace the stored notes with exactly `collection`.
    fn save_notes(&self, collection: &NoteCollection) -> StorageResult<()>;
}

/// Open the backend selected by `config`.
pub fn open_storage(config: &StorageConfig) -> StorageResult<Box<dyn Storage>> {
    match config.backend {
        StorageBackendKind::File => {
            tracing::info!(root = %config.root.display(), "Using file storage backend");
            Ok(Box::new(FileStore::new(config.root.clone())))
        }
        StorageBackendKind::Sqlite => {
            tracing::info!(database = %config.database.display(), "Using sqlite storage backend");
            Ok(Box::new(SqliteStore::open(&config.database)?))
        }
    }
}

/// Map a caller key to a safe file name.
///
/// Characters outside `[A-Za-z0-9._-]` become `_`; `.`/`..`, empty keys and
/// keys ending in the temp suffix are rejected.
pub fn sanitize_key(key: &str) -> StorageResult<String> {
    let sanitized: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() || sanitized == "." || sanitized == ".." || sanitized.ends_with(TEMP_SUFFIX) {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(sanitized)
}

/// Record the outcome of a storage verb and pass the result through.
pub(crate) fn observe<T>(verb: &'static str, result: StorageResult<T>) -> StorageResult<T> {
    metrics::record_storage_op(verb, result.is_ok());
    if let Err(e) = &result {
        tracing::debug!(verb, error = %e, "Storage operation failed");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_key("notes.json").unwrap(), "notes.json");
        assert_eq!(sanitize_key("a/b\\c d").unwrap(), "a_b_c_d");
        assert_eq!(sanitize_key("../../etc/passwd").unwrap(), ".._.._etc_passwd");
        assert_eq!(sanitize_key("día").unwrap(), "d_a");
    }

    #[test]
    fn sanitize_rejects_reserved_names() {
        for key in ["", ".", "..", "draft.tmp"] {
            assert!(matches!(sanitize_key(key), Err(StorageError::InvalidKey(_))), "{key:?}");
        }
    }

    #[test]
    fn open_storage_selects_backend() {
        let temp = TempDir::new().unwrap();
        let mut config = StorageConfig {
            backend: StorageBackendKind::File,
            root: temp.path().join("kv"),
            database: temp.path().join("db").join("notes.db"),
        };

        let file = open_storage(&config).unwrap();
        file.save("k", b"v").unwrap();
        assert!(temp.path().join("kv").join("k").is_file());

        config.backend = StorageBackendKind::Sqlite;
        let sqlite = open_storage(&config).unwrap();
        sqlite.save("k", b"v").unwrap();
        assert_eq!(sqlite.load("k").unwrap(), b"v");
        assert!(temp.path().join("db").join("notes.db").is_file());
    }
}
