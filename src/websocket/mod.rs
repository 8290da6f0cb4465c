//! WebSocket protocol handling.
//!
//! # Responsibilities
//! - Detect upgrade requests by the presence of `Sec-WebSocket-Key`
//! - Complete the opening handshake (101 Switching Protocols)
//! - Encode and decode frames, including extended lengths and masking
//!
//! # Data Flow
//! ```text
//! Pending request ──handshake.rs──→ 101 response, role = WebSocket
//! Client bytes    ──frame.rs──────→ Frame ──→ event loop (text / close / ping / pong)
//! Server text     ──frame.rs──────→ unmasked frame bytes ──→ client
//! ```
//!
//! # Design Decisions
//! - Only unfragmented text frames carry application data
//! - Binary and continuation frames are a protocol error for this profile
//! - Ping is answered by the core and never reaches the application
//! - No extensions are negotiated, so reserved bits must be zero

pub mod frame;
pub mod handshake;

pub use frame::{apply_mask, decode, encode, encode_masked, Frame, FrameError, Opcode};
pub use handshake::{accept_key, client_key, switching_protocols};
