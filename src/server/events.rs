//! The Event/Command boundary between the core and the application layer.

use thiserror::Error;

use crate::net::ConnectionId;

/// Something the core observed. Exactly one is returned per `Server::accept`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A WebSocket client finished its handshake.
    Connected(ConnectionId),
    /// A WebSocket client is gone (close frame, error, or explicit close).
    Disconnected(ConnectionId),
    /// A text frame from a WebSocket client, or the raw text of an
    /// application API request awaiting a `Send`. Requests that are not
    /// UTF-8 are answered `400` by the core and never arrive here.
    Message(ConnectionId, String),
    /// A failure not tied to a live connection (e.g. accept failed).
    Error(String),
    /// The loop has stopped; no further events follow.
    Shutdown,
}

/// Something the application asks the core to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// WebSocket: send a text frame. API request: write the full HTTP
    /// response text, then close.
    Send(ConnectionId, String),
    /// Send a text frame to every open WebSocket client, best-effort.
    Broadcast(String),
    /// Close a connection.
    Close(ConnectionId),
}

/// Application layer driven by `Server::run`.
pub trait Handler {
    /// React to one event. Commands run in order before the next event.
    fn handle(&mut self, event: Event) -> Vec<Command>;
}

impl<F> Handler for F
where
    F: FnMut(Event) -> Vec<Command>,
{
    fn handle(&mut self, event: Event) -> Vec<Command> {
        self(event)
    }
}

/// Errors from executing a command. The loop itself is unaffected.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),

    #[error("connection {0} has not finished its request")]
    NotReady(ConnectionId),

    #[error("write to {id} failed: {source}")]
    Write {
        id: ConnectionId,
        #[source]
        source: std::io::Error,
    },
}
