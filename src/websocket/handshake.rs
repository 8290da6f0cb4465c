//! WebSocket opening handshake (RFC 6455 §4).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha1::{Digest, Sha1};

use crate::http::request::HttpRequest;
use crate::http::response::reason_phrase;

/// GUID appended to the client key before hashing.
pub const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// The client's `Sec-WebSocket-Key`, if this request asks for an upgrade.
///
/// Only the key header is consulted. `Upgrade`/`Connection` are left alone
/// because intermediaries rewrite them.
pub fn client_key(request: &HttpRequest) -> Option<&str> {
    request
        .header("sec-websocket-key")
        .map(str::trim)
        .filter(|k| !k.is_empty())
}

/// `base64(SHA1(key ++ GUID))`.
pub fn accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WEBSOCKET_GUID.as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// Serialized `101 Switching Protocols` response for `client_key`.
pub fn switching_protocols(client_key: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 101 {}\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {}\r\n\r\n",
        reason_phrase(101),
        accept_key(client_key)
    )
    .into_bytes()
}
