//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the host.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for the note host.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HostConfig {
    /// Listener configuration (bind address, poll cadence).
    pub listener: ListenerConfig,

    /// Protocol size limits.
    pub limits: LimitsConfig,

    /// Static asset serving.
    pub static_files: StaticFilesConfig,

    /// Durable storage selection.
    pub storage: StorageConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// TCP port.
    pub port: u16,

    /// Upper bound on a single readiness wait, in milliseconds.
    pub poll_wait_ms: u64,

    /// Listen backlog handed to the OS.
    pub backlog: u32,
}

impl ListenerConfig {
    /// The `host:port` string to bind.
    pub fn bind_address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            poll_wait_ms: 5_000,
            backlog: 1024,
        }
    }
}

/// Protocol limits enforced by the core.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum size of an HTTP header section in bytes.
    pub max_header_bytes: usize,

    /// Maximum HTTP request body accepted via `Content-Length`.
    pub max_body_bytes: usize,

    /// Maximum payload of a single WebSocket frame in bytes.
    pub max_frame_payload: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_header_bytes: 1024 * 1024, // 1 MiB
            max_body_bytes: 8 * 1024 * 1024,
            max_frame_payload: 64 * 1024,  // 64 KiB
        }
    }
}

/// Static file serving configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    /// Directory assets are resolved under.
    pub root: PathBuf,

    /// Path prefix reserved for the application layer.
    pub api_prefix: String,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("public"),
            api_prefix: "/api/".to_string(),
        }
    }
}

/// Which storage backend is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    /// One file per key with atomic rename.
    #[default]
    File,
    /// SQLite database with a `notes` table.
    Sqlite,
}

impl std::str::FromStr for StorageBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(format!("unknown storage backend: {other}")),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Active backend.
    pub backend: StorageBackendKind,

    /// Root directory of the key/value file backend.
    pub root: PathBuf,

    /// SQLite database file of the relational backend.
    pub database: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::File,
            root: PathBuf::from("data"),
            database: PathBuf::from("data/notes.db"),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log line format.
    pub log_format: LogFormat,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Address the exporter listens on.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Text,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = HostConfig::default();
        assert_eq!(config.listener.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.listener.poll_wait_ms, 5_000);
        assert_eq!(config.limits.max_header_bytes, 1024 * 1024);
        assert_eq!(config.limits.max_frame_payload, 64 * 1024);
        assert_eq!(config.storage.backend, StorageBackendKind::File);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: HostConfig = toml::from_str(
            r#"
            [listener]
            port = 9000

            [storage]
            backend = "sqlite"
            "#,
        )
        .unwrap();
        assert_eq!(config.listener.port, 9000);
        assert_eq!(config.listener.host, "0.0.0.0");
        assert_eq!(config.storage.backend, StorageBackendKind::Sqlite);
        assert_eq!(config.static_files.api_prefix, "/api/");
    }

    #[test]
    fn backend_kind_parses_case_insensitively() {
        assert_eq!("SQLite".parse::<StorageBackendKind>().unwrap(), StorageBackendKind::Sqlite);
        assert!("redis".parse::<StorageBackendKind>().is_err());
    }
}
