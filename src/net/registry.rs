//! Registry of live connections.
//!
//! # Responsibilities
//! - Allocate strictly increasing connection ids, never reused
//! - Own every live connection exclusively
//! - Release a connection's transport exactly once, on removal
//!
//! # Design Decisions
//! - Owned by the single event-loop task, so no locking
//! - Ordered map: iteration (polling, broadcast) follows accept order

use std::collections::BTreeMap;
use std::net::SocketAddr;

use crate::http::request::RequestParser;
use crate::net::connection::{Connection, ConnectionId, Role};

/// Owns the set of live connections keyed by id.
#[derive(Debug)]
pub struct ConnectionRegistry<T> {
    connections: BTreeMap<ConnectionId, Connection<T>>,
    next_id: u64,
}

impl<T> ConnectionRegistry<T> {
    pub fn new() -> Self {
        Self {
            connections: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Register a freshly accepted transport in the `Pending` role.
    pub fn insert(&mut self, transport: T, peer: Option<SocketAddr>, parser: RequestParser) -> ConnectionId {
        let id = ConnectionId::from_u64(self.next_id);
        self.next_id += 1;
        self.connections
            .insert(id, Connection::new(id, transport, peer, parser));
        metrics_gauge(self.connections.len());
        id
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Connection<T>> {
        self.connections.get(&id)
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut Connection<T>> {
        self.connections.get_mut(&id)
    }

    /// Remove a connection, handing back ownership of it. Dropping the result
    /// releases the transport. A second call for the same id returns `None`.
    pub fn remove(&mut self, id: ConnectionId) -> Option<Connection<T>> {
        let removed = self.connections.remove(&id);
        if removed.is_some() {
            metrics_gauge(self.connections.len());
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Connections eligible for readiness polling.
    pub fn open(&self) -> impl Iterator<Item = &Connection<T>> {
        self.connections.values().filter(|c| !c.is_closed())
    }

    pub fn open_count(&self) -> usize {
        self.open().count()
    }

    /// Open connections in the `WebSocket` role, mutably, in accept order.
    pub fn websockets_mut(&mut self) -> impl Iterator<Item = &mut Connection<T>> {
        self.connections
            .values_mut()
            .filter(|c| !c.is_closed() && c.role() == Role::WebSocket)
    }

    /// Ids of connections marked closed but not yet removed.
    pub fn closed_ids(&self) -> Vec<ConnectionId> {
        self.connections
            .values()
            .filter(|c| c.is_closed())
            .map(|c| c.id())
            .collect()
    }
}

impl<T> Default for ConnectionRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn metrics_gauge(open: usize) {
    crate::observability::metrics::record_open_connections(open);
}
