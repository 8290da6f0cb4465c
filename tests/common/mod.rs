//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use note_host::config::HostConfig;
use note_host::lifecycle::{self, Shutdown};
use note_host::websocket::{self, Frame};
use note_host::{ConnectionId, Event, Server};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

pub const INDEX_HTML: &str = "<h1>hi</h1>\n";
pub const SAMPLE_KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";
const MASK: [u8; 4] = [0x37, 0xfa, 0x21, 0x3d];

/// Config bound to an ephemeral loopback port, with a static root holding
/// `index.html` and storage under the temp dir.
pub fn test_config(dir: &TempDir) -> HostConfig {
    let public = dir.path().join("public");
    std::fs::create_dir_all(&public).unwrap();
    std::fs::write(public.join("index.html"), INDEX_HTML).unwrap();

    let mut config = HostConfig::default();
    config.listener.host = "127.0.0.1".into();
    config.listener.port = 0;
    config.listener.poll_wait_ms = 100;
    config.static_files.root = public;
    config.storage.root = dir.path().join("data");
    config.storage.database = dir.path().join("notes.db");
    config
}

/// A bare server, driven by the test itself through `accept`/`execute`.
pub fn start_server(dir: &TempDir) -> (Server, SocketAddr) {
    let server = Server::bind(&test_config(dir), Shutdown::new()).unwrap();
    let addr = server.local_addr().unwrap();
    (server, addr)
}

/// A full host (server plus notes API) running in the background.
pub fn spawn_host(config: &HostConfig) -> (SocketAddr, Shutdown, JoinHandle<()>) {
    let shutdown = Shutdown::new();
    let host = lifecycle::start(config, shutdown.clone()).unwrap();
    let addr = host.server.local_addr().unwrap();
    (addr, shutdown, tokio::spawn(host.run()))
}

/// Keep the server's loop turning until `fut` completes, collecting events.
pub async fn pump<F: Future>(server: &mut Server, fut: F) -> (F::Output, Vec<Event>) {
    tokio::pin!(fut);
    let deadline = tokio::time::sleep(Duration::from_secs(5));
    tokio::pin!(deadline);
    let mut events = Vec::new();
    loop {
        tokio::select! {
            out = &mut fut => return (out, events),
            event = server.accept() => events.push(event),
            _ = &mut deadline => panic!("timed out; events so far: {events:?}"),
        }
    }
}

/// Next event, failing the test if none arrives promptly.
pub async fn next_event(server: &mut Server) -> Event {
    tokio::time::timeout(Duration::from_secs(5), server.accept())
        .await
        .expect("no event within 5s")
}

/// Open a raw WebSocket connection (handshake only; the server must be pumped).
pub async fn ws_connect(addr: SocketAddr) -> (TcpStream, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET /ws HTTP/1.1\r\nHost: {addr}\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\
         Sec-WebSocket-Key: {SAMPLE_KEY}\r\nSec-WebSocket-Version: 13\r\n\r\n"
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        stream.read_exact(&mut byte).await.unwrap();
        head.push(byte[0]);
    }
    (stream, String::from_utf8(head).unwrap())
}

/// Write `frame` masked, as a client must.
pub async fn send_frame(stream: &mut TcpStream, frame: &Frame) {
    stream
        .write_all(&websocket::encode_masked(frame, MASK))
        .await
        .unwrap();
}

/// Read one complete frame from the server.
pub async fn read_frame(stream: &mut TcpStream) -> Frame {
    let mut buf = Vec::new();
    loop {
        if let Some((frame, _)) = websocket::decode(&buf, usize::MAX).unwrap() {
            return frame;
        }
        let mut chunk = [0u8; 1024];
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "server closed before a full frame arrived");
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Send a raw HTTP request and read until the server closes. A reset is
/// treated as the end of the response.
pub async fn raw_request(addr: SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut out = Vec::new();
    let _ = stream.read_to_end(&mut out).await;
    String::from_utf8_lossy(&out).into_owned()
}

/// Complete a raw handshake against a server driven by the test, returning
/// the client stream and the id from its `Connected` event.
pub async fn ws_client(server: &mut Server, addr: SocketAddr) -> (TcpStream, ConnectionId) {
    let ((stream, _), events) = pump(server, ws_connect(addr)).await;
    let event = match events.into_iter().next() {
        Some(event) => event,
        None => next_event(server).await,
    };
    match event {
        Event::Connected(id) => (stream, id),
        other => panic!("expected Connected, got {other:?}"),
    }
}
