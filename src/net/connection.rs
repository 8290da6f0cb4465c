//! Per-connection state.
//!
//! # Responsibilities
//! - Identify connections with a process-unique, increasing id
//! - Track the protocol role (Pending → Http | WebSocket)
//! - Hold the inbound byte buffer and request framer

use std::net::SocketAddr;

use crate::http::request::RequestParser;

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn from_u64(raw: u64) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Protocol role of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Accepted; request not yet fully read.
    Pending,
    /// Plain HTTP exchange owned by the application; closed after its response.
    Http,
    /// Upgraded; stays open until either side closes.
    WebSocket,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Pending => "pending",
            Role::Http => "http",
            Role::WebSocket => "websocket",
        }
    }
}

/// A live connection and its protocol state.
#[derive(Debug)]
pub struct Connection<T> {
    id: ConnectionId,
    pub(crate) transport: T,
    peer: Option<SocketAddr>,
    role: Role,
    /// Set when a write failed; the loop reaps it on the next cycle.
    closed: bool,
    /// Bytes read but not yet consumed by the request parser or frame codec.
    pub(crate) buffer: Vec<u8>,
    pub(crate) parser: RequestParser,
}

impl<T> Connection<T> {
    pub(crate) fn new(id: ConnectionId, transport: T, peer: Option<SocketAddr>, parser: RequestParser) -> Self {
        Self {
            id,
            transport,
            peer,
            role: Role::Pending,
            closed: false,
            buffer: Vec::new(),
            parser,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn mark_closed(&mut self) {
        self.closed = true;
    }

    /// Leave `Pending` for `role`. Returns `false` (and changes nothing) if the
    /// role was already decided or `role` is `Pending`.
    pub fn promote(&mut self, role: Role) -> bool {
        if self.role != Role::Pending || role == Role::Pending {
            return false;
        }
        self.role = role;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection<()> {
        Connection::new(ConnectionId::from_u64(7), (), None, RequestParser::new(64, 64))
    }

    #[test]
    fn display_format() {
        assert_eq!(ConnectionId::from_u64(7).to_string(), "conn-7");
    }

    #[test]
    fn role_changes_at_most_once() {
        let mut c = conn();
        assert_eq!(c.role(), Role::Pending);
        assert!(c.promote(Role::WebSocket));
        assert!(!c.promote(Role::Http));
        assert!(!c.promote(Role::Pending));
        assert_eq!(c.role(), Role::WebSocket);
    }

    #[test]
    fn pending_cannot_be_reentered() {
        let mut c = conn();
        assert!(!c.promote(Role::Pending));
        assert!(c.promote(Role::Http));
        assert_eq!(c.role(), Role::Http);
    }
}
