//! Connection multiplexer and its application boundary.
//!
//! # Data Flow
//! ```text
//! Listener / connections (readiness)
//!     → event_loop.rs (frame requests, route by role, decode frames)
//!     → events.rs (Event queue, one per accept())
//!     → Handler (application) → Command
//!     → event_loop.rs (send / broadcast / close)
//! ```
//!
//! # Design Decisions
//! - Single task owns every connection; no locks on the hot path
//! - Only WebSocket clients produce Connected/Disconnected
//! - The application never sees sockets, only connection ids

pub mod event_loop;
pub mod events;

pub use event_loop::Server;
pub use events::{Command, Event, Handler, ServerError};
