//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Sessions and server produce:
//!     → logging.rs (structured events, session_id on every line)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape), when enabled
//! ```
//!
//! # Design Decisions
//! - Per-frame header details are logged at debug only
//! - Credentials are never logged in full

pub mod logging;
pub mod metrics;
