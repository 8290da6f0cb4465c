//! Note Host
//!
//! Serves a static web client, relays WebSocket text between clients, and
//! exposes a small notes/storage API, all from one event-loop task.
//!
//! # Architecture Overview
//!
//! ```text
//!     Browser ──▶ net::Listener ──▶ server::Server (event loop)
//!                                      │
//!                  ┌───────────────────┼────────────────────┐
//!                  ▼                   ▼                    ▼
//!          http::static_files    websocket (handshake,   Event queue
//!          (GET, non-API)        frames, ping/close)        │
//!                                                           ▼
//!                                                   app::NotesApi (Handler)
//!                                                           │
//!                                   Command (Send / Broadcast / Close)
//!                                                           │
//!                                                           ▼
//!                                                 storage (file | sqlite)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use note_host::config::{HostConfig, LogFormat, StorageBackendKind};
use note_host::lifecycle::{self, startup, Shutdown};
use note_host::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "note-host")]
#[command(version, about = "Static, WebSocket and notes API host", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (default 8080).
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory served for non-API GET requests.
    #[arg(long)]
    static_root: Option<PathBuf>,

    /// Directory used by the file storage backend.
    #[arg(long)]
    storage_root: Option<PathBuf>,

    /// Storage backend: file or sqlite.
    #[arg(long)]
    backend: Option<StorageBackendKind>,
}

impl Cli {
    /// Command-line values win over the configuration file.
    fn apply(&self, mut config: HostConfig) -> HostConfig {
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(root) = &self.static_root {
            config.static_files.root = root.clone();
        }
        if let Some(root) = &self.storage_root {
            config.storage.root = root.clone();
        }
        if let Some(backend) = self.backend {
            config.storage.backend = backend;
        }
        config
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let config = match startup::load(cli.config.as_deref()) {
        Ok(config) => cli.apply(config),
        Err(e) => {
            logging::init_tracing(LogFormat::Text);
            tracing::error!(error = %e, "Startup failed");
            std::process::exit(1);
        }
    };

    logging::init_tracing(config.observability.log_format);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "note-host starting");
    tracing::info!(
        bind_address = %config.listener.bind_address(),
        backend = ?config.storage.backend,
        poll_wait_ms = config.listener.poll_wait_ms,
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    let host = match lifecycle::start(&config, shutdown.clone()) {
        Ok(host) => host,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            std::process::exit(1);
        }
    };

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    lifecycle::trigger_on_ctrl_c(shutdown);
    host.run().await;
}
