//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (bind address, poll wait, limits)
//! - Check the application prefix is a usable path prefix
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: HostConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::HostConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    /// What is wrong with it.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a configuration, collecting every violation.
pub fn validate_config(config: &HostConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address().parse::<SocketAddr>().is_err() {
        errors.push(ValidationError {
            field: "listener.host",
            message: format!("'{}' is not an IP address", config.listener.host),
        });
    }
    if config.listener.poll_wait_ms == 0 {
        errors.push(ValidationError {
            field: "listener.poll_wait_ms",
            message: "must be greater than zero".into(),
        });
    }
    if config.limits.max_header_bytes == 0 {
        errors.push(ValidationError {
            field: "limits.max_header_bytes",
            message: "must be greater than zero".into(),
        });
    }
    if config.limits.max_frame_payload == 0 {
        errors.push(ValidationError {
            field: "limits.max_frame_payload",
            message: "must be greater than zero".into(),
        });
    }

    let prefix = &config.static_files.api_prefix;
    if prefix.is_empty() || !prefix.starts_with('/') || prefix == "/" {
        errors.push(ValidationError {
            field: "static_files.api_prefix",
            message: format!("'{prefix}' must be a non-root path starting with '/'"),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError {
            field: "observability.metrics_address",
            message: format!("'{}' is not a socket address", config.observability.metrics_address),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
