//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup)
//!         ├─ Upgrade: websocket → relay::Session (one per connection)
//!         ├─ GET /status        → status.rs (JSON)
//!         ├─ GET /              → status.rs (HTML)
//!         └─ anything else      → 404
//! ```

pub mod server;
pub mod status;

pub use server::{AppState, RelayServer};
pub use status::StatusBody;
