//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define host metrics (connections, frames, responses, storage)
//! - Expose a Prometheus-compatible scrape endpoint when enabled
//!
//! # Metrics
//! - `host_connections_accepted_total` (counter)
//! - `host_connections_closed_total` (counter): by role
//! - `host_open_connections` (gauge)
//! - `host_frames_received_total` (counter): by opcode
//! - `host_http_responses_total` (counter): by status
//! - `host_storage_operations_total` (counter): by verb, outcome
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Labels are static strings; no per-connection cardinality

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_connection_accepted() {
    counter!("host_connections_accepted_total").increment(1);
}

pub fn record_connection_closed(role: &'static str) {
    counter!("host_connections_closed_total", "role" => role).increment(1);
}

pub fn record_open_connections(open: usize) {
    gauge!("host_open_connections").set(open as f64);
}

pub fn record_frame(opcode: &'static str) {
    counter!("host_frames_received_total", "opcode" => opcode).increment(1);
}

pub fn record_http_response(status: u16) {
    counter!("host_http_responses_total", "status" => status.to_string()).increment(1);
}

pub fn record_storage_op(verb: &'static str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!("host_storage_operations_total", "verb" => verb, "outcome" => outcome).increment(1);
}
