//! # Atomic Key/Value File Backend
//!
//! One file per key under the storage root. Writes land in `<key>.tmp` and
//! are renamed over `<key>`, so a reader sees either the previous value or
//! the new one, never a partial file. A crash mid-save leaves at most a
//! stray `.tmp` file, which `list()` ignores and the next save overwrites.
//!
//! The note collection lives beside the keys in [`NOTES_FILE`]. Its name
//! contains `#`, which `sanitize_key` never emits, so no key can read or
//! overwrite it and `list()` leaves it out.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::errors::{StorageError, StorageResult};
use super::notes::{now_millis, NoteCollection};
use super::{observe, sanitize_key, Storage, TEMP_SUFFIX};

/// File holding the note collection, outside the key namespace.
pub const NOTES_FILE: &str = "#notes.json";

/// Local filesystem key/value store.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> StorageResult<(String, PathBuf)> {
        let key = sanitize_key(key)?;
        let path = self.root.join(&key);
        Ok((key, path))
    }

    fn temp_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(TEMP_SUFFIX);
        PathBuf::from(name)
    }

    fn write_atomic(&self, key: &str, path: &Path, bytes: &[u8]) -> StorageResult<()> {
        fs::create_dir_all(&self.root)
            .map_err(|e| StorageError::from_io(&self.root.display().to_string(), e))?;

        let tmp = Self::temp_path(path);
        let written = fs::File::create(&tmp).and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        });
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(StorageError::from_io(key, e));
        }

        fs::rename(&tmp, path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            StorageError::from_io(key, e)
        })
    }
}

impl Storage for FileStore {
    fn save(&self, key: &str, bytes: &[u8]) -> StorageResult<()> {
        let result = self
            .path_for(key)
            .and_then(|(key, path)| self.write_atomic(&key, &path, bytes));
        observe("save", result)
    }

    fn load(&self, key: &str) -> StorageResult<Vec<u8>> {
        let result = self
            .path_for(key)
            .and_then(|(key, path)| fs::read(&path).map_err(|e| StorageError::from_io(&key, e)));
        observe("load", result)
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        let result = self
            .path_for(key)
            .and_then(|(key, path)| fs::remove_file(&path).map_err(|e| StorageError::from_io(&key, e)));
        observe("delete", result)
    }

    fn exists(&self, key: &str) -> StorageResult<bool> {
        let result = self.path_for(key).and_then(|(key, path)| match fs::metadata(&path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::from_io(&key, e)),
        });
        observe("exists", result)
    }

    fn list(&self) -> StorageResult<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return observe("list", Err(StorageError::from_io(&self.root.display().to_string(), e))),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::from_io(&self.root.display().to_string(), e))?;
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if let Some(name) = entry.file_name().to_str() {
                if is_file && name != NOTES_FILE && !name.ends_with(TEMP_SUFFIX) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        observe("list", Ok(names))
    }

    fn get_notes(&self) -> StorageResult<NoteCollection> {
        let result = match fs::read(self.root.join(NOTES_FILE)) {
            Ok(bytes) => serde_json::from_slice::<NoteCollection>(&bytes)
                .map_err(StorageError::from)
                .and_then(|stored| NoteCollection::from_notes(stored.notes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => NoteCollection::from_notes(Vec::new()),
            Err(e) => Err(StorageError::from_io(NOTES_FILE, e)),
        };
        observe("get_notes", result)
    }

    fn save_notes(&self, collection: &NoteCollection) -> StorageResult<()> {
        let result = NoteCollection::from_notes(collection.notes.clone()).and_then(|mut replacement| {
            replacement.stamp_missing(now_millis());
            let bytes = serde_json::to_vec(&replacement)?;
            self.write_atomic(NOTES_FILE, &self.root.join(NOTES_FILE), &bytes)
        });
        observe("save_notes", result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::notes::Note;
    use tempfile::TempDir;

    fn store() -> (TempDir, FileStore) {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path().join("data"));
        (temp, store)
    }

    #[test]
    fn save_load_overwrite() {
        let (_temp, store) = store();
        store.save("doc", b"one").unwrap();
        store.save("doc", b"two").unwrap();
        assert_eq!(store.load("doc").unwrap(), b"two");
        assert!(!store.root().join("doc.tmp").exists());
    }

    #[test]
    fn root_created_lazily() {
        let (_temp, store) = store();
        assert!(!store.root().exists());
        assert_eq!(store.list().unwrap(), Vec::<String>::new());
        store.save("k", b"v").unwrap();
        assert!(store.root().is_dir());
    }

    #[test]
    fn missing_key_is_not_found() {
        let (_temp, store) = store();
        assert!(matches!(store.load("nope"), Err(StorageError::NotFound(_))));
        assert!(matches!(store.delete("nope"), Err(StorageError::NotFound(_))));
        assert!(!store.exists("nope").unwrap());
    }

    #[test]
    fn delete_and_exists() {
        let (_temp, store) = store();
        store.save("gone", b"bye").unwrap();
        assert!(store.exists("gone").unwrap());
        store.delete("gone").unwrap();
        assert!(!store.exists("gone").unwrap());
    }

    #[test]
    fn keys_cannot_escape_root() {
        let (temp, store) = store();
        store.save("../escape", b"x").unwrap();
        assert!(!temp.path().join("escape").exists());
        assert_eq!(store.load(".._escape").unwrap(), b"x");
        assert!(matches!(store.save("..", b"x"), Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn interrupted_save_leaves_prior_value() {
        let (_temp, store) = store();
        store.save("doc", b"committed").unwrap();

        // A crash after writing the temp file but before the rename.
        fs::write(store.root().join("doc.tmp"), b"partial").unwrap();

        assert_eq!(store.load("doc").unwrap(), b"committed");
        assert_eq!(store.list().unwrap(), vec!["doc".to_string()]);
    }

    #[test]
    fn interrupted_first_save_is_not_found() {
        let (_temp, store) = store();
        fs::create_dir_all(store.root()).unwrap();
        fs::write(store.root().join("fresh.tmp"), b"parti").unwrap();
        assert!(matches!(store.load("fresh"), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn list_is_sorted() {
        let (_temp, store) = store();
        for key in ["b", "a", "c"] {
            store.save(key, b"").unwrap();
        }
        assert_eq!(store.list().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn notes_round_trip_through_file() {
        let (_temp, store) = store();
        assert_eq!(store.get_notes().unwrap().next_id, 1);

        let collection = NoteCollection::from_notes(vec![Note {
            id: "1".into(),
            content: "abc".into(),
            created_at: 0,
            updated_at: 0,
        }]).unwrap();
        store.save_notes(&collection).unwrap();

        let loaded = store.get_notes().unwrap();
        assert_eq!(loaded.get("1").unwrap().content, "abc");
        assert!(loaded.get("1").unwrap().created_at > 0);
        assert_eq!(loaded.next_id, 2);
        assert!(store.root().join(NOTES_FILE).is_file());
    }

    #[test]
    fn notes_file_is_out_of_key_reach() {
        let (_temp, store) = store();
        let mut collection = NoteCollection::default();
        collection.add("kept").unwrap();
        store.save_notes(&collection).unwrap();

        store.save("notes.json", b"clobber").unwrap();
        store.save("#notes.json", b"clobber").unwrap();

        assert_eq!(store.get_notes().unwrap().notes[0].content, "kept");
        assert_eq!(store.list().unwrap(), vec!["_notes.json", "notes.json"]);
    }

    #[test]
    fn exists_reports_unreadable_root() {
        let temp = TempDir::new().unwrap();
        let not_a_dir = temp.path().join("plain");
        fs::write(&not_a_dir, b"x").unwrap();

        let store = FileStore::new(&not_a_dir);
        assert!(matches!(store.exists("k"), Err(StorageError::Other(_))));
    }

    #[test]
    fn notes_save_replaces_collection() {
        let (_temp, store) = store();
        let mut first = NoteCollection::default();
        first.add("a").unwrap();
        first.add("b").unwrap();
        store.save_notes(&first).unwrap();

        let mut second = NoteCollection::default();
        second.add("only").unwrap();
        store.save_notes(&second).unwrap();

        let loaded = store.get_notes().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.notes[0].content, "only");
    }
}
