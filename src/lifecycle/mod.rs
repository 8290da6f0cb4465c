//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Open storage → Bind listener
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C / trigger() → loop returns Event::Shutdown → Exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then storage, then listener
//! - Shutdown is cooperative: the loop checks a flag once per cycle

pub mod shutdown;
pub mod startup;

pub use shutdown::{trigger_on_ctrl_c, Shutdown};
pub use startup::{start, Host, StartupError};
