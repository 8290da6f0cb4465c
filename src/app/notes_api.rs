//! Default application: a notes/storage API plus a WebSocket relay.
//!
//! # Routes (under the API prefix, `/api/` by default)
//! - `GET  notes` → the stored note collection
//! - `POST notes` → replace the collection
//! - `GET  storage` → every key
//! - `GET  storage/<key>` → raw value
//! - `POST storage/<key>` → save the body
//! - `POST storage/<key>/delete` → delete
//!
//! Text from any WebSocket client is relayed to every client, sender included.

use std::collections::BTreeSet;

use serde_json::json;

use crate::http::request::{HttpRequest, Method};
use crate::http::response::HttpResponse;
use crate::net::ConnectionId;
use crate::server::events::{Command, Event, Handler};
use crate::storage::{NoteCollection, Storage, StorageError};

/// A resolved API route.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Route<'a> {
    GetNotes,
    SaveNotes,
    ListKeys,
    Load(&'a str),
    Save(&'a str),
    Delete(&'a str),
    NotFound,
}

impl<'a> Route<'a> {
    fn resolve(method: Method, rest: &'a str) -> Self {
        let rest = rest.trim_end_matches('/');
        match (method, rest) {
            (Method::Get, "notes") => Route::GetNotes,
            (Method::Post, "notes") => Route::SaveNotes,
            (Method::Get, "storage") => Route::ListKeys,
            _ => match rest.strip_prefix("storage/") {
                Some(key) if !key.is_empty() => match (method, key.strip_suffix("/delete")) {
                    (Method::Post, Some(key)) if !key.is_empty() => Route::Delete(key),
                    (Method::Get, _) => Route::Load(key),
                    (Method::Post, _) => Route::Save(key),
                },
                _ => Route::NotFound,
            },
        }
    }
}

/// Handler serving the notes API over a storage backend.
#[derive(Debug)]
pub struct NotesApi {
    storage: Box<dyn Storage>,
    api_prefix: String,
    /// Connections known to be WebSocket clients.
    clients: BTreeSet<ConnectionId>,
}

impl NotesApi {
    pub fn new(storage: Box<dyn Storage>) -> Self {
        Self {
            storage,
            api_prefix: "/api/".to_string(),
            clients: BTreeSet::new(),
        }
    }

    /// Serve routes under `prefix` instead of `/api/`.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into();
        self
    }

    /// Number of WebSocket clients currently connected.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Answer one raw HTTP request.
    pub fn respond(&self, raw: &str) -> HttpResponse {
        let request = match HttpRequest::parse(raw.as_bytes()) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(error = %e, "Unparsable API request");
                return HttpResponse::status_text(400);
            }
        };

        let path = request.path_only();
        let rest = path
            .strip_prefix(self.api_prefix.as_str())
            .unwrap_or_default();

        match Route::resolve(request.method, rest) {
            Route::GetNotes => match self.storage.get_notes() {
                Ok(collection) => json_response(200, &collection),
                Err(e) => storage_failure(e),
            },
            Route::SaveNotes => match serde_json::from_slice::<NoteCollection>(&request.body) {
                Ok(collection) => match self.storage.save_notes(&collection) {
                    Ok(()) => HttpResponse::new(200).json(&json!({ "ok": true })),
                    Err(e) => storage_failure(e),
                },
                Err(e) => HttpResponse::new(400).json(&json!({ "error": e.to_string() })),
            },
            Route::ListKeys => match self.storage.list() {
                Ok(keys) => json_response(200, &keys),
                Err(e) => storage_failure(e),
            },
            Route::Load(key) => match self.storage.load(key) {
                Ok(bytes) => HttpResponse::new(200).body("application/octet-stream", bytes),
                Err(e) => storage_failure(e),
            },
            Route::Save(key) => match self.storage.save(key, &request.body) {
                Ok(()) => HttpResponse::new(204),
                Err(e) => storage_failure(e),
            },
            Route::Delete(key) => match self.storage.delete(key) {
                Ok(()) => HttpResponse::new(204),
                Err(e) => storage_failure(e),
            },
            Route::NotFound => HttpResponse::status_text(404),
        }
    }
}

impl Handler for NotesApi {
    fn handle(&mut self, event: Event) -> Vec<Command> {
        match event {
            Event::Connected(id) => {
                self.clients.insert(id);
                tracing::info!(connection_id = %id, clients = self.clients.len(), "Client joined");
                Vec::new()
            }
            Event::Disconnected(id) => {
                self.clients.remove(&id);
                tracing::info!(connection_id = %id, clients = self.clients.len(), "Client left");
                Vec::new()
            }
            Event::Message(id, text) if self.clients.contains(&id) => {
                vec![Command::Broadcast(text)]
            }
            Event::Message(id, raw) => {
                let response = self.respond(&raw);
                tracing::debug!(connection_id = %id, status = response.status, "API response");
                vec![Command::Send(id, response.into_text())]
            }
            Event::Error(e) => {
                tracing::warn!(error = %e, "Host error");
                Vec::new()
            }
            Event::Shutdown => Vec::new(),
        }
    }
}

fn json_response<T: serde::Serialize>(status: u16, value: &T) -> HttpResponse {
    match serde_json::to_value(value) {
        Ok(value) => HttpResponse::new(status).json(&value),
        Err(e) => storage_failure(StorageError::from(e)),
    }
}

fn storage_failure(err: StorageError) -> HttpResponse {
    let status = match &err {
        StorageError::NotFound(_) => 404,
        StorageError::PermissionDenied(_) => 403,
        StorageError::InvalidKey(_) | StorageError::InvalidNote(_) => 400,
        StorageError::Other(_) => 500,
    };
    if status == 500 {
        tracing::error!(error = %err, "Storage failure");
    }
    HttpResponse::new(status).json(&json!({ "error": err.to_string() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStore, SqliteStore};
    use tempfile::TempDir;

    fn api(dir: &TempDir) -> NotesApi {
        NotesApi::new(Box::new(FileStore::new(dir.path())))
    }

    fn request(method: &str, path: &str, body: &str) -> String {
        format!(
            "{method} {path} HTTP/1.1\r\nHost: test\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        )
    }

    #[test]
    fn routes_resolve() {
        assert_eq!(Route::resolve(Method::Get, "notes"), Route::GetNotes);
        assert_eq!(Route::resolve(Method::Post, "notes/"), Route::SaveNotes);
        assert_eq!(Route::resolve(Method::Get, "storage"), Route::ListKeys);
        assert_eq!(Route::resolve(Method::Get, "storage/a.txt"), Route::Load("a.txt"));
        assert_eq!(Route::resolve(Method::Post, "storage/a.txt"), Route::Save("a.txt"));
        assert_eq!(Route::resolve(Method::Post, "storage/a.txt/delete"), Route::Delete("a.txt"));
        assert_eq!(Route::resolve(Method::Get, "storage/"), Route::NotFound);
        assert_eq!(Route::resolve(Method::Get, "elsewhere"), Route::NotFound);
    }

    #[test]
    fn saves_then_reads_notes() {
        let dir = TempDir::new().unwrap();
        let app = api(&dir);

        let body = r#"{"notes":{"1":{"id":"1","content":"abc"}},"nextId":2}"#;
        let saved = app.respond(&request("POST", "/api/notes", body));
        assert_eq!(saved.status, 200);

        let read = app.respond(&request("GET", "/api/notes", ""));
        assert_eq!(read.status, 200);
        let value: serde_json::Value = serde_json::from_slice(&read.body).unwrap();
        assert_eq!(value["notes"]["1"]["content"], "abc");
        assert_eq!(value["nextId"], 2);
    }

    #[test]
    fn invalid_notes_body_is_a_bad_request() {
        let dir = TempDir::new().unwrap();
        let response = api(&dir).respond(&request("POST", "/api/notes", "{not json"));
        assert_eq!(response.status, 400);
    }

    #[test]
    fn key_value_lifecycle() {
        let dir = TempDir::new().unwrap();
        let app = api(&dir);

        assert_eq!(app.respond(&request("GET", "/api/storage/k", "")).status, 404);
        assert_eq!(app.respond(&request("POST", "/api/storage/k", "v1")).status, 204);

        let loaded = app.respond(&request("GET", "/api/storage/k", ""));
        assert_eq!(loaded.status, 200);
        assert_eq!(loaded.body, b"v1");

        let keys = app.respond(&request("GET", "/api/storage", ""));
        assert_eq!(keys.body, br#"["k"]"#);

        assert_eq!(app.respond(&request("POST", "/api/storage/k/delete", "")).status, 204);
        assert_eq!(app.respond(&request("POST", "/api/storage/k/delete", "")).status, 404);
    }

    #[test]
    fn reserved_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let response = api(&dir).respond(&request("POST", "/api/storage/x.tmp", "v"));
        assert_eq!(response.status, 400);
    }

    #[test]
    fn note_id_without_successor_is_refused() {
        let dir = TempDir::new().unwrap();
        let backends: Vec<NotesApi> = vec![
            api(&dir),
            NotesApi::new(Box::new(SqliteStore::in_memory().unwrap())),
        ];

        for app in backends {
            let body = r#"{"notes":{"18446744073709551615":{"id":"18446744073709551615","content":"x"}}}"#;
            let saved = app.respond(&request("POST", "/api/notes", body));
            assert_eq!(saved.status, 400);

            let read = app.respond(&request("GET", "/api/notes", ""));
            assert_eq!(read.status, 200);
            let value: serde_json::Value = serde_json::from_slice(&read.body).unwrap();
            assert_eq!(value["nextId"], 1);
            assert_eq!(value["notes"], json!({}));
        }
    }

    #[test]
    fn storage_keys_cannot_reach_the_notes() {
        let dir = TempDir::new().unwrap();
        let app = api(&dir);

        let body = r#"{"notes":{"1":{"id":"1","content":"keep me"}}}"#;
        assert_eq!(app.respond(&request("POST", "/api/notes", body)).status, 200);
        assert_eq!(app.respond(&request("GET", "/api/storage/notes.json", "")).status, 404);
        assert_eq!(app.respond(&request("POST", "/api/storage/notes.json", "junk")).status, 204);
        assert_eq!(app.respond(&request("POST", "/api/storage/%23notes.json", "junk")).status, 204);

        let read = app.respond(&request("GET", "/api/notes", ""));
        let value: serde_json::Value = serde_json::from_slice(&read.body).unwrap();
        assert_eq!(value["notes"]["1"]["content"], "keep me");
    }

    #[test]
    fn websocket_text_is_broadcast_and_requests_are_answered() {
        let dir = TempDir::new().unwrap();
        let mut app = api(&dir);
        let ws = ConnectionId::from_u64(1);
        let http = ConnectionId::from_u64(2);

        assert!(app.handle(Event::Connected(ws)).is_empty());
        assert_eq!(
            app.handle(Event::Message(ws, "hello".into())),
            vec![Command::Broadcast("hello".into())]
        );

        let commands = app.handle(Event::Message(http, request("GET", "/api/nope", "")));
        match commands.as_slice() {
            [Command::Send(id, text)] => {
                assert_eq!(*id, http);
                assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
            }
            other => panic!("unexpected commands: {other:?}"),
        }

        app.handle(Event::Disconnected(ws));
        assert_eq!(app.client_count(), 0);
    }
}
