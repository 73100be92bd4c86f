//! Voice dialogue relay library.
//!
//! Accepts browser WebSocket connections, opens a credentialed connection
//! to the dialogue service for each one, and relays frames verbatim in
//! both directions.

pub mod config;
pub mod frame;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod relay;

pub use config::schema::RelayConfig;
pub use http::RelayServer;
pub use lifecycle::Shutdown;
