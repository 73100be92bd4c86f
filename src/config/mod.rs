//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, apply RELAY_* env overrides)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated, immutable)
//!     → shared via Arc with the server and every session
//! ```
//!
//! # Design Decisions
//! - Config is built once at startup and never mutated
//! - All fields have defaults to allow minimal configs
//! - Credentials come from the environment and are redacted in logs

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    redacted, ListenerConfig, LogFormat, ObservabilityConfig, RelayConfig, ShutdownConfig,
    UpstreamConfig,
};
pub use validation::ValidationError;
