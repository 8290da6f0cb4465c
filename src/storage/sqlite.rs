//! SQLite storage backend with the relational `notes` table.

use std::fs;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use super::errors::{StorageError, StorageResult};
use super::notes::{next_id_for, now_millis, Note, NoteCollection};
use super::{observe, sanitize_key, Storage};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS notes (
        id TEXT PRIMARY KEY,
        content TEXT NOT NULL,
        created_at INTEGER,
        updated_at INTEGER
    );

    CREATE TABLE IF NOT EXISTS kv (
        key TEXT PRIMARY KEY,
        value BLOB NOT NULL
    );
";

/// SQLite-backed storage.
pub struct SqliteStore {
    conn: Connection,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and its parent directory.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| StorageError::from_io(&parent.display().to_string(), e))?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    fn replace_notes(&self, collection: &NoteCollection) -> StorageResult<()> {
        let now = now_millis();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM notes", [])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO notes (id, content, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for note in &collection.notes {
                let created = if note.created_at == 0 { now } else { note.created_at };
                let updated = if note.updated_at == 0 { created } else { note.updated_at };
                insert.execute(params![note.id, note.content, created, updated])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn select_notes(&self) -> StorageResult<Vec<Note>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, content, created_at, updated_at FROM notes
             ORDER BY CAST(id AS INTEGER) DESC, id DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Note {
                id: row.get(0)?,
                content: row.get(1)?,
                created_at: row.get::<_, Option<i64>>(2)?.unwrap_or_default(),
                updated_at: row.get::<_, Option<i64>>(3)?.unwrap_or_default(),
            })
        })?;
        let mut notes = Vec::new();
        for row in rows {
            notes.push(row?);
        }
        Ok(notes)
    }
}

impl Storage for SqliteStore {
    fn save(&self, key: &str, bytes: &[u8]) -> StorageResult<()> {
        let result = sanitize_key(key).and_then(|key| {
            self.conn.execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, bytes],
            )?;
            Ok(())
        });
        observe("save", result)
    }

    fn load(&self, key: &str) -> StorageResult<Vec<u8>> {
        let result = sanitize_key(key).and_then(|key| {
            let value: Option<Vec<u8>> = self
                .conn
                .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
                .optional()?;
            value.ok_or(StorageError::NotFound(key))
        });
        observe("load", result)
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        let result = sanitize_key(key).and_then(|key| {
            let removed = self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
            if removed == 0 {
                return Err(StorageError::NotFound(key));
            }
            Ok(())
        });
        observe("delete", result)
    }

    fn exists(&self, key: &str) -> StorageResult<bool> {
        let result = sanitize_key(key).and_then(|key| {
            let exists: bool = self.conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM kv WHERE key = ?1)",
                params![key],
                |row| row.get(0),
            )?;
            Ok(exists)
        });
        observe("exists", result)
    }

    fn list(&self) -> StorageResult<Vec<String>> {
        let result = (|| -> StorageResult<Vec<String>> {
            let mut stmt = self.conn.prepare("SELECT key FROM kv ORDER BY key")?;
            let keys = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(keys)
        })();
        observe("list", result)
    }

    fn get_notes(&self) -> StorageResult<NoteCollection> {
        let result = self.select_notes().and_then(NoteCollection::from_notes);
        observe("get_notes", result)
    }

    fn save_notes(&self, collection: &NoteCollection) -> StorageResult<()> {
        let result = next_id_for(&collection.notes).and_then(|_| self.replace_notes(collection));
        observe("save_notes", result)
    }
}
