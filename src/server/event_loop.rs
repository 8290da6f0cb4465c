//! Single-task event loop multiplexing the listener and every connection.
//!
//! # Responsibilities
//! - Wait for readiness on the listener and all open connections at once
//! - Frame HTTP requests and decide each connection's role
//! - Serve static assets, complete WebSocket handshakes, decode frames
//! - Hand exactly one `Event` per `accept()` to the application
//! - Execute `Command`s (send, broadcast, close)
//!
//! # Design Decisions
//! - One cycle reacts to one readiness source; extra events are queued
//! - Queued events are always drained before waiting again
//! - Readiness waits are bounded by `poll_wait` so shutdown is noticed
//! - Connections whose writes failed are reaped at the start of a cycle

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use futures_util::future::select_all;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::config::{HostConfig, LimitsConfig};
use crate::http::request::{HttpRequest, Method, RequestParser};
use crate::http::response::HttpResponse;
use crate::http::static_files;
use crate::lifecycle::shutdown::Shutdown;
use crate::net::{ConnectionId, ConnectionRegistry, Listener, ListenerError, Role};
use crate::observability::metrics;
use crate::server::events::{Command, Event, Handler, ServerError};
use crate::websocket::{self, Frame, Opcode};

const READ_CHUNK: usize = 16 * 1024;

/// Close code sent when the application closes a WebSocket.
const CLOSE_NORMAL: u16 = 1000;

/// What woke the loop during one cycle.
enum Readiness {
    Shutdown,
    Accepted(Result<(TcpStream, SocketAddr), ListenerError>),
    Readable(ConnectionId, std::io::Result<()>),
    Idle,
}

/// Why a connection is being released.
#[derive(Debug)]
enum CloseReason {
    PeerClosed,
    Served,
    Requested,
    Protocol(String),
    Transport(String),
}

/// The connection multiplexer.
#[derive(Debug)]
pub struct Server {
    listener: Listener,
    registry: ConnectionRegistry<TcpStream>,
    pending: VecDeque<Event>,
    shutdown: Shutdown,
    poll_wait: Duration,
    limits: LimitsConfig,
    static_root: PathBuf,
    api_prefix: String,
    stopped: bool,
}

impl Server {
    /// Bind the listener described by `config`. Must be called inside a Tokio runtime.
    pub fn bind(config: &HostConfig, shutdown: Shutdown) -> Result<Self, ListenerError> {
        let listener = Listener::bind(&config.listener)?;
        Ok(Self::with_listener(listener, config, shutdown))
    }

    /// Build a server around an already bound listener.
    pub fn with_listener(listener: Listener, config: &HostConfig, shutdown: Shutdown) -> Self {
        Self {
            listener,
            registry: ConnectionRegistry::new(),
            pending: VecDeque::new(),
            shutdown,
            poll_wait: Duration::from_millis(config.listener.poll_wait_ms),
            limits: config.limits.clone(),
            static_root: config.static_files.root.clone(),
            api_prefix: config.static_files.api_prefix.clone(),
            stopped: false,
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Number of live connections, including ones not yet reaped.
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Role of a live connection.
    pub fn role_of(&self, id: ConnectionId) -> Option<Role> {
        self.registry.get(id).map(|c| c.role())
    }

    /// Wait for the next event.
    ///
    /// Queued events are returned first. Once shutdown has been requested
    /// and the queue is empty, every call returns `Event::Shutdown`.
    pub async fn accept(&mut self) -> Event {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return event;
            }
            if self.shutdown.is_triggered() {
                if !self.stopped {
                    self.stopped = true;
                    tracing::info!(open_connections = self.registry.len(), "Event loop stopped");
                }
                return Event::Shutdown;
            }
            self.poll_once().await;
        }
    }

    /// Execute one application command.
    pub async fn execute(&mut self, command: Command) -> Result<(), ServerError> {
        match command {
            Command::Send(id, text) => self.send(id, &text).await,
            Command::Broadcast(text) => {
                self.broadcast(&text).await;
                Ok(())
            }
            Command::Close(id) => self.close(id).await,
        }
    }

    /// Drive `handler` until shutdown. Command failures are logged, never fatal.
    pub async fn run<H: Handler>(&mut self, handler: &mut H) {
        loop {
            let event = self.accept().await;
            let last = event == Event::Shutdown;
            for command in handler.handle(event) {
                if let Err(e) = self.execute(command).await {
                    tracing::debug!(error = %e, "Command failed");
                }
            }
            if last {
                break;
            }
        }
    }

    /// Send `text` to one connection.
    ///
    /// WebSocket connections get a text frame. An API request gets `text`
    /// written verbatim as its HTTP response, after which it is closed.
    pub async fn send(&mut self, id: ConnectionId, text: &str) -> Result<(), ServerError> {
        let conn = self
            .registry
            .get_mut(id)
            .ok_or(ServerError::UnknownConnection(id))?;

        match conn.role() {
            Role::WebSocket => {
                let bytes = websocket::encode(&Frame::text(text));
                if let Err(e) = conn.transport.write_all(&bytes).await {
                    self.release(id, CloseReason::Transport(e.to_string()));
                    return Err(ServerError::Write { id, source: e });
                }
                Ok(())
            }
            Role::Http => {
                let written = async {
                    conn.transport.write_all(text.as_bytes()).await?;
                    conn.transport.shutdown().await
                }
                .await;
                if let Some(status) = status_of(text) {
                    metrics::record_http_response(status);
                }
                self.release(id, CloseReason::Served);
                written.map_err(|source| ServerError::Write { id, source })
            }
            Role::Pending => Err(ServerError::NotReady(id)),
        }
    }

    /// Send `text` to every open WebSocket client. Returns how many got it.
    ///
    /// A failed write marks that client closed; it is reaped, and its
    /// `Disconnected` emitted, on the next cycle.
    pub async fn broadcast(&mut self, text: &str) -> usize {
        let bytes = websocket::encode(&Frame::text(text));
        let mut delivered = 0;
        for conn in self.registry.websockets_mut() {
            match conn.transport.write_all(&bytes).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(connection_id = %conn.id(), error = %e, "Broadcast write failed");
                    conn.mark_closed();
                }
            }
        }
        tracing::debug!(delivered, "Broadcast sent");
        delivered
    }

    /// Close a connection at the application's request.
    pub async fn close(&mut self, id: ConnectionId) -> Result<(), ServerError> {
        let conn = self
            .registry
            .get_mut(id)
            .ok_or(ServerError::UnknownConnection(id))?;
        if conn.role() == Role::WebSocket {
            let bytes = websocket::encode(&Frame::close(Some(CLOSE_NORMAL)));
            let _ = conn.transport.write_all(&bytes).await;
        }
        self.release(id, CloseReason::Requested);
        Ok(())
    }

    /// One multiplexing cycle.
    async fn poll_once(&mut self) {
        for id in self.registry.closed_ids() {
            self.release(id, CloseReason::Transport("write failed".into()));
        }
        if !self.pending.is_empty() {
            return;
        }

        let readiness = {
            let registry = &self.registry;
            tokio::select! {
                _ = self.shutdown.notified() => Readiness::Shutdown,
                accepted = self.listener.accept() => Readiness::Accepted(accepted),
                (id, ready) = next_readable(registry), if registry.open_count() > 0 => {
                    Readiness::Readable(id, ready)
                }
                _ = tokio::time::sleep(self.poll_wait) => Readiness::Idle,
            }
        };

        match readiness {
            Readiness::Shutdown => {}
            Readiness::Idle => {
                tracing::trace!(open_connections = self.registry.len(), "Poll cycle idle");
            }
            Readiness::Accepted(Ok((stream, peer))) => {
                let parser = RequestParser::new(self.limits.max_header_bytes, self.limits.max_body_bytes);
                let id = self.registry.insert(stream, Some(peer), parser);
                metrics::record_connection_accepted();
                tracing::debug!(connection_id = %id, peer_addr = %peer, "Connection registered");
            }
            Readiness::Accepted(Err(e)) => {
                tracing::warn!(error = %e, "Accept failed");
                self.pending.push_back(Event::Error(e.to_string()));
            }
            Readiness::Readable(id, Err(e)) => {
                self.release(id, CloseReason::Transport(e.to_string()));
            }
            Readiness::Readable(id, Ok(())) => self.on_readable(id).await,
        }
    }

    async fn on_readable(&mut self, id: ConnectionId) {
        let read = match self.registry.get_mut(id) {
            Some(conn) => {
                let mut chunk = [0u8; READ_CHUNK];
                match conn.transport.try_read(&mut chunk) {
                    Ok(n) if n > 0 => {
                        conn.buffer.extend_from_slice(&chunk[..n]);
                        Ok(n)
                    }
                    other => other,
                }
            }
            None => return,
        };

        match read {
            Ok(0) => {
                self.release(id, CloseReason::PeerClosed);
                return;
            }
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::WouldBlock => return,
            Err(e) => {
                self.release(id, CloseReason::Transport(e.to_string()));
                return;
            }
        }

        match self.role_of(id) {
            Some(Role::Pending) => self.on_request_bytes(id).await,
            Some(Role::WebSocket) => self.on_frame_bytes(id).await,
            Some(Role::Http) => {
                // The request is already with the application.
                if let Some(conn) = self.registry.get_mut(id) {
                    conn.buffer.clear();
                }
            }
            None => {}
        }
    }

    /// Try to frame a request on a `Pending` connection and route it.
    async fn on_request_bytes(&mut self, id: ConnectionId) {
        let parsed = match self.registry.get_mut(id) {
            Some(conn) => conn.parser.parse(&conn.buffer),
            None => return,
        };
        let (request, consumed) = match parsed {
            Ok(Some(framed)) => framed,
            Ok(None) => return,
            Err(e) => {
                self.release(id, CloseReason::Protocol(e.to_string()));
                return;
            }
        };

        if let Some(key) = websocket::client_key(&request) {
            self.upgrade(id, key, consumed).await;
        } else if self.is_api_path(&request) {
            self.hand_to_application(id, &request, consumed).await;
        } else if request.method == Method::Get {
            self.serve_static(id, &request).await;
        } else {
            self.reject(id, 405).await;
        }
    }

    fn is_api_path(&self, request: &HttpRequest) -> bool {
        let path = request.path_only();
        path.starts_with(&self.api_prefix) || path == self.api_prefix.trim_end_matches('/')
    }

    async fn upgrade(&mut self, id: ConnectionId, key: &str, consumed: usize) {
        let response = websocket::switching_protocols(key);
        let Some(conn) = self.registry.get_mut(id) else {
            return;
        };
        if let Err(e) = conn.transport.write_all(&response).await {
            self.release(id, CloseReason::Transport(e.to_string()));
            return;
        }
        conn.promote(Role::WebSocket);
        conn.buffer.drain(..consumed);
        let pipelined = !conn.buffer.is_empty();

        metrics::record_http_response(101);
        tracing::info!(connection_id = %id, "WebSocket connected");
        self.pending.push_back(Event::Connected(id));

        if pipelined {
            self.on_frame_bytes(id).await;
        }
    }

    /// Queue an API request for the application. Requests that are not
    /// UTF-8 cannot be carried as text and are answered with `400` here.
    async fn hand_to_application(&mut self, id: ConnectionId, request: &HttpRequest, consumed: usize) {
        let Some(conn) = self.registry.get_mut(id) else {
            return;
        };
        let raw = match std::str::from_utf8(&conn.buffer[..consumed]) {
            Ok(text) => text.to_owned(),
            Err(e) => {
                tracing::debug!(connection_id = %id, path = %request.path, error = %e, "API request is not UTF-8");
                self.reject(id, 400).await;
                return;
            }
        };
        conn.promote(Role::Http);
        conn.buffer.clear();

        tracing::debug!(
            connection_id = %id,
            method = %request.method,
            path = %request.path,
            "API request"
        );
        self.pending.push_back(Event::Message(id, raw));
    }

    async fn serve_static(&mut self, id: ConnectionId, request: &HttpRequest) {
        let root = &self.static_root;
        let Some(conn) = self.registry.get_mut(id) else {
            return;
        };
        conn.promote(Role::Http);

        let served = async {
            let status = static_files::serve(&mut conn.transport, root, &request.path).await?;
            conn.transport.shutdown().await?;
            Ok::<u16, std::io::Error>(status)
        }
        .await;

        match served {
            Ok(status) => {
                metrics::record_http_response(status);
                tracing::debug!(connection_id = %id, path = %request.path, status, "Static response");
                self.release(id, CloseReason::Served);
            }
            Err(e) => self.release(id, CloseReason::Transport(e.to_string())),
        }
    }

    async fn reject(&mut self, id: ConnectionId, status: u16) {
        let Some(conn) = self.registry.get_mut(id) else {
            return;
        };
        conn.promote(Role::Http);
        let bytes = HttpResponse::status_text(status).to_bytes();
        let _ = conn.transport.write_all(&bytes).await;
        let _ = conn.transport.shutdown().await;
        metrics::record_http_response(status);
        self.release(id, CloseReason::Served);
    }

    /// Decode and act on every complete frame buffered for `id`.
    async fn on_frame_bytes(&mut self, id: ConnectionId) {
        loop {
            let decoded = match self.registry.get_mut(id) {
                Some(conn) => match websocket::decode(&conn.buffer, self.limits.max_frame_payload) {
                    Ok(Some((frame, used))) => {
                        conn.buffer.drain(..used);
                        Ok(Some(frame))
                    }
                    Ok(None) => Ok(None),
                    Err(e) => Err(e),
                },
                None => return,
            };

            let frame = match decoded {
                Ok(Some(frame)) => frame,
                Ok(None) => return,
                Err(e) => {
                    self.release(id, CloseReason::Protocol(e.to_string()));
                    return;
                }
            };

            if !self.on_frame(id, frame).await {
                return;
            }
        }
    }

    /// React to one frame. Returns `false` once the connection is gone.
    async fn on_frame(&mut self, id: ConnectionId, frame: Frame) -> bool {
        metrics::record_frame(frame.opcode.name());

        match frame.opcode {
            Opcode::Text if !frame.fin => {
                self.release(id, CloseReason::Protocol("fragmented text frame".into()));
                false
            }
            Opcode::Text => match String::from_utf8(frame.payload) {
                Ok(text) => {
                    self.pending.push_back(Event::Message(id, text));
                    true
                }
                Err(_) => {
                    self.release(id, CloseReason::Protocol("text frame is not UTF-8".into()));
                    false
                }
            },
            Opcode::Ping => {
                tracing::trace!(connection_id = %id, "Ping");
                let pong = websocket::encode(&Frame::pong(frame.payload));
                let Some(conn) = self.registry.get_mut(id) else {
                    return false;
                };
                if let Err(e) = conn.transport.write_all(&pong).await {
                    self.release(id, CloseReason::Transport(e.to_string()));
                    return false;
                }
                true
            }
            Opcode::Pong => {
                tracing::trace!(connection_id = %id, "Pong");
                true
            }
            Opcode::Close => {
                if let Some(conn) = self.registry.get_mut(id) {
                    let reply = websocket::encode(&Frame::close(frame.close_code()));
                    let _ = conn.transport.write_all(&reply).await;
                }
                self.release(id, CloseReason::PeerClosed);
                false
            }
            Opcode::Binary | Opcode::Continuation => {
                let reason = format!("unsupported {} frame", frame.opcode.name());
                self.release(id, CloseReason::Protocol(reason));
                false
            }
        }
    }

    /// Remove `id` from the registry, releasing its transport. WebSocket
    /// clients produce a `Disconnected` event. No-op for unknown ids.
    fn release(&mut self, id: ConnectionId, reason: CloseReason) {
        let Some(conn) = self.registry.remove(id) else {
            return;
        };
        let role = conn.role();
        let peer = conn.peer();
        metrics::record_connection_closed(role.as_str());

        match &reason {
            CloseReason::Protocol(detail) => {
                tracing::debug!(connection_id = %id, peer_addr = ?peer, role = role.as_str(), error = %detail, "Protocol error, closing")
            }
            CloseReason::Transport(detail) => {
                tracing::warn!(connection_id = %id, peer_addr = ?peer, role = role.as_str(), error = %detail, "Transport error, closing")
            }
            other => tracing::debug!(connection_id = %id, peer_addr = ?peer, role = role.as_str(), reason = ?other, "Connection closed"),
        }

        if role == Role::WebSocket {
            tracing::info!(connection_id = %id, "WebSocket disconnected");
            self.pending.push_back(Event::Disconnected(id));
        }
    }
}

/// Resolve when any open connection becomes readable.
async fn next_readable(registry: &ConnectionRegistry<TcpStream>) -> (ConnectionId, std::io::Result<()>) {
    let waits = registry.open().map(|conn| {
        let id = conn.id();
        Box::pin(async move { (id, conn.transport.readable().await) })
    });
    let ((id, ready), _, _) = select_all(waits).await;
    (id, ready)
}

/// Status code of a raw HTTP response, for metrics.
fn status_of(response: &str) -> Option<u16> {
    response.split(' ').nth(1)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_read_from_the_status_line() {
        assert_eq!(status_of("HTTP/1.1 204 No Content\r\n\r\n"), Some(204));
        assert_eq!(status_of("garbage"), None);
    }

    #[tokio::test]
    async fn accept_returns_shutdown_once_triggered() {
        let mut config = HostConfig::default();
        config.listener.host = "127.0.0.1".into();
        config.listener.port = 0;
        config.listener.poll_wait_ms = 50;

        let shutdown = Shutdown::new();
        let mut server = Server::bind(&config, shutdown.clone()).unwrap();
        shutdown.trigger();

        assert_eq!(server.accept().await, Event::Shutdown);
        assert_eq!(server.accept().await, Event::Shutdown);
    }

    #[tokio::test]
    async fn commands_for_unknown_connections_fail() {
        let mut config = HostConfig::default();
        config.listener.host = "127.0.0.1".into();
        config.listener.port = 0;

        let mut server = Server::bind(&config, Shutdown::new()).unwrap();
        let ghost = ConnectionId::from_u64(99);
        assert!(matches!(
            server.execute(Command::Send(ghost, "x".into())).await,
            Err(ServerError::UnknownConnection(id)) if id == ghost
        ));
        assert!(server.execute(Command::Close(ghost)).await.is_err());
        assert!(server.execute(Command::Broadcast("x".into())).await.is_ok());
    }
}
