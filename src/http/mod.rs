//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Pending connection bytes
//!     → request.rs (accumulate, frame headers + Content-Length body)
//!     → [event loop decides: upgrade / application API / static]
//!     → static_files.rs (resolve under root, stream file)
//!     → response.rs (status line, headers, body)
//!     → Send to client, then close
//! ```

pub mod request;
pub mod response;
pub mod static_files;

pub use request::{HttpRequest, Method, ParseError, RequestParser};
pub use response::HttpResponse;
