//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → command-line overrides (main.rs)
//!     → HostConfig (validated, immutable)
//!     → handed by value to the server and storage at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the event loop never re-reads it
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    HostConfig, LimitsConfig, ListenerConfig, LogFormat, ObservabilityConfig,
    StaticFilesConfig, StorageBackendKind, StorageConfig,
};
pub use validation::{validate_config, ValidationError};
