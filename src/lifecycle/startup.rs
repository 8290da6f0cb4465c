//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Open the storage backend
//! - Bind the listener last, once everything it serves is ready
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::path::Path;

use thiserror::Error;

use crate::app::NotesApi;
use crate::config::{load_config, validate_config, ConfigError, HostConfig};
use crate::lifecycle::shutdown::Shutdown;
use crate::net::ListenerError;
use crate::server::Server;
use crate::storage::{open_storage, StorageError};

/// A failure that prevents the host from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    #[error("listener: {0}")]
    Bind(#[from] ListenerError),
}

/// A host ready to run: bound server plus its application.
#[derive(Debug)]
pub struct Host {
    pub server: Server,
    pub app: NotesApi,
}

impl Host {
    /// Serve until shutdown is triggered.
    pub async fn run(mut self) {
        self.server.run(&mut self.app).await;
        tracing::info!("Shutdown complete");
    }
}

/// Load configuration from `path`, or defaults when no file is given.
pub fn load(path: Option<&Path>) -> Result<HostConfig, StartupError> {
    match path {
        Some(path) => {
            let config = load_config(path)?;
            tracing::info!(path = %path.display(), "Configuration loaded");
            Ok(config)
        }
        None => Ok(HostConfig::default()),
    }
}

/// Validate `config`, open storage, then bind. Must run inside a Tokio runtime.
pub fn start(config: &HostConfig, shutdown: Shutdown) -> Result<Host, StartupError> {
    validate_config(config).map_err(ConfigError::Validation)?;

    let storage = open_storage(&config.storage)?;
    let app = NotesApi::new(storage).with_prefix(config.static_files.api_prefix.clone());

    let server = Server::bind(config, shutdown)?;
    tracing::info!(
        static_root = %config.static_files.root.display(),
        api_prefix = %config.static_files.api_prefix,
        "Host started"
    );

    Ok(Host { server, app })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageBackendKind;
    use tempfile::TempDir;

    fn local_config(dir: &TempDir) -> HostConfig {
        let mut config = HostConfig::default();
        config.listener.host = "127.0.0.1".into();
        config.listener.port = 0;
        config.storage.root = dir.path().join("data");
        config.storage.database = dir.path().join("notes.db");
        config
    }

    #[tokio::test]
    async fn starts_with_each_backend() {
        let dir = TempDir::new().unwrap();
        let mut config = local_config(&dir);
        assert!(start(&config, Shutdown::new()).is_ok());

        config.storage.backend = StorageBackendKind::Sqlite;
        let host = start(&config, Shutdown::new()).unwrap();
        assert!(host.server.local_addr().unwrap().port() > 0);
        assert!(dir.path().join("notes.db").exists());
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_binding() {
        let dir = TempDir::new().unwrap();
        let mut config = local_config(&dir);
        config.listener.poll_wait_ms = 0;

        assert!(matches!(
            start(&config, Shutdown::new()),
            Err(StartupError::Config(ConfigError::Validation(_)))
        ));
    }

    #[tokio::test]
    async fn port_in_use_is_a_bind_error() {
        let dir = TempDir::new().unwrap();
        let first = start(&local_config(&dir), Shutdown::new()).unwrap();
        let port = first.server.local_addr().unwrap().port();

        let mut config = local_config(&dir);
        config.listener.port = port;
        assert!(matches!(
            start(&config, Shutdown::new()),
            Err(StartupError::Bind(_))
        ));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = load(Some(Path::new("/nonexistent/host.toml"))).unwrap_err();
        assert!(matches!(err, StartupError::Config(ConfigError::Read { .. })));
        assert_eq!(load(None).unwrap().listener.port, 8080);
    }
}
