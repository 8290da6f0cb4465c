//! Note model and the collection exchanged with the application layer.
//!
//! The collection serializes as
//! `{"notes": {"<id>": {"id", "content", "createdAt", "updatedAt"}}, "nextId": n}`
//! with notes ordered by id descending.

use std::cmp::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use super::errors::{StorageError, StorageResult};

/// One note. Timestamps are epoch milliseconds; `0` means "not yet stamped".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    #[serde(default)]
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

/// Every note plus the id the next new note will receive.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteCollection {
    #[serde(with = "notes_by_id")]
    pub notes: Vec<Note>,
    #[serde(default)]
    pub next_id: u64,
}

impl NoteCollection {
    /// Build a collection from notes in any order; sorts and recomputes `next_id`.
    pub fn from_notes(mut notes: Vec<Note>) -> StorageResult<Self> {
        let next_id = next_id_for(&notes)?;
        notes.sort_by(|a, b| compare_ids_desc(&a.id, &b.id));
        Ok(Self { notes, next_id })
    }

    pub fn get(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Add a note under a freshly assigned id and return that id.
    pub fn add(&mut self, content: impl Into<String>) -> StorageResult<String> {
        let id = next_id_for(&self.notes)?.to_string();
        let now = now_millis();
        self.notes.insert(
            0,
            Note {
                id: id.clone(),
                content: content.into(),
                created_at: now,
                updated_at: now,
            },
        );
        self.next_id = next_id_for(&self.notes)?;
        Ok(id)
    }

    /// Fill missing timestamps with `now` (epoch milliseconds).
    pub fn stamp_missing(&mut self, now: i64) {
        for note in &mut self.notes {
            if note.created_at == 0 {
                note.created_at = now;
            }
            if note.updated_at == 0 {
                note.updated_at = note.created_at;
            }
        }
    }
}

/// One plus the largest numeric id, or 1 when there is none.
///
/// Fails with `InvalidNote` when the largest id is `u64::MAX`, which has no successor.
pub fn next_id_for(notes: &[Note]) -> StorageResult<u64> {
    match notes.iter().filter_map(|n| n.id.parse::<u64>().ok()).max() {
        None => Ok(1),
        Some(max) => max
            .checked_add(1)
            .ok_or_else(|| StorageError::InvalidNote(format!("id {max} leaves no next id"))),
    }
}

/// Numeric ids compare numerically and sort before non-numeric ones.
fn compare_ids_desc(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => y.cmp(&x),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => b.cmp(a),
    }
}

pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Serialize the note list as an object keyed by id, keeping list order.
mod notes_by_id {
    use super::*;
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(notes: &[Note], serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(notes.len()))?;
        for note in notes {
            map.serialize_entry(&note.id, note)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Note>, D::Error> {
        let map = BTreeMap::<String, Note>::deserialize(deserializer)?;
        let mut notes: Vec<Note> = map
            .into_iter()
            .map(|(key, mut note)| {
                if note.id.is_empty() {
                    note.id = key;
                }
                note
            })
            .collect();
        notes.sort_by(|a, b| compare_ids_desc(&a.id, &b.id));
        Ok(notes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(id: &str) -> Note {
        Note {
            id: id.into(),
            content: format!("note {id}"),
            created_at: 1,
            updated_at: 1,
        }
    }

    #[test]
    fn next_id_is_max_numeric_plus_one() {
        assert_eq!(next_id_for(&[]), Ok(1));
        assert_eq!(next_id_for(&[note("3"), note("10"), note("draft")]), Ok(11));
        assert_eq!(next_id_for(&[note("draft")]), Ok(1));
    }

    #[test]
    fn largest_possible_id_is_rejected() {
        let max = u64::MAX.to_string();
        assert_eq!(next_id_for(&[note(&(u64::MAX - 1).to_string())]), Ok(u64::MAX));
        assert!(matches!(next_id_for(&[note("1"), note(&max)]), Err(StorageError::InvalidNote(_))));
        assert!(matches!(
            NoteCollection::from_notes(vec![note(&max)]),
            Err(StorageError::InvalidNote(_))
        ));
    }

    #[test]
    fn ordering_is_numeric_descending() {
        let collection = NoteCollection::from_notes(vec![note("9"), note("10"), note("1")]).unwrap();
        let ids: Vec<_> = collection.notes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["10", "9", "1"]);
        assert_eq!(collection.next_id, 11);
    }

    #[test]
    fn parses_application_payload() {
        let body = r#"{"notes":{"1":{"id":"1","content":"abc"}},"nextId":2}"#;
        let collection: NoteCollection = serde_json::from_str(body).unwrap();
        assert_eq!(collection.next_id, 2);
        assert_eq!(collection.get("1").unwrap().content, "abc");
        assert_eq!(collection.get("1").unwrap().created_at, 0);
    }

    #[test]
    fn id_falls_back_to_map_key() {
        let body = r#"{"notes":{"7":{"content":"x"}}}"#;
        let collection: NoteCollection = serde_json::from_str(body).unwrap();
        assert_eq!(collection.notes[0].id, "7");
    }

    #[test]
    fn serializes_keyed_object_in_order() {
        let collection = NoteCollection::from_notes(vec![note("1"), note("2")]).unwrap();
        let json = serde_json::to_string(&collection).unwrap();
        assert!(json.starts_with(r#"{"notes":{"2":{"id":"2""#));
        assert!(json.ends_with(r#""nextId":3}"#));
    }

    #[test]
    fn add_assigns_next_id() {
        let mut collection = NoteCollection::from_notes(vec![note("4")]).unwrap();
        assert_eq!(collection.add("fresh").unwrap(), "5");
        assert_eq!(collection.notes[0].id, "5");
        assert!(collection.notes[0].created_at > 0);
        assert_eq!(collection.next_id, 6);
    }

    #[test]
    fn stamping_leaves_existing_times() {
        let mut collection = NoteCollection::from_notes(vec![
            Note { id: "1".into(), content: String::new(), created_at: 0, updated_at: 0 },
            note("2"),
        ]).unwrap();
        collection.stamp_missing(99);
        assert_eq!(collection.get("1").unwrap().created_at, 99);
        assert_eq!(collection.get("1").unwrap().updated_at, 99);
        assert_eq!(collection.get("2").unwrap().created_at, 1);
    }
}
