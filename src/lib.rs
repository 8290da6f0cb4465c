//! Note Host Library
//!
//! A single-task host that serves static assets, upgrades WebSocket
//! clients, and hands application traffic to a `Handler` as events.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod server;
pub mod websocket;

// Persistence and the default application
pub mod app;
pub mod storage;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use app::NotesApi;
pub use config::schema::HostConfig;
pub use lifecycle::Shutdown;
pub use net::ConnectionId;
pub use server::{Command, Event, Handler, Server, ServerError};
pub use storage::{open_storage, Storage, StorageError};
