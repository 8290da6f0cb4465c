//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout (text or JSON lines)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Connection id is a field on every per-connection log line
//! - Control frames log at trace so they never look like failures
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
