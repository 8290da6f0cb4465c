//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bind with SO_REUSEADDR, accept)
//!     → registry.rs (assign id, own the connection)
//!     → connection.rs (role state machine, inbound buffer)
//!     → Hand off to HTTP / WebSocket handling in the event loop
//!
//! Connection Roles:
//!     Pending → Http       (answered, then closed)
//!     Pending → WebSocket  (stays open until close)
//! ```
//!
//! # Design Decisions
//! - One task owns the registry; no shared state between connections
//! - Ids are allocated by the registry, strictly increasing, never reused
//! - Removal from the registry is the only way a transport is released

pub mod connection;
pub mod listener;
pub mod registry;

pub use connection::{Connection, ConnectionId, Role};
pub use listener::{Listener, ListenerError};
pub use registry::ConnectionRegistry;
