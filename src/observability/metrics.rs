//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_sessions_active` (gauge): live sessions
//! - `relay_sessions_total` (counter): sessions created
//! - `relay_session_duration_seconds` (histogram): session lifetime
//! - `relay_frames_total` (counter): frames relayed, by direction
//! - `relay_frame_bytes_total` (counter): payload bytes relayed, by direction
//! - `relay_upstream_failures_total` (counter): failed upstream handshakes, by reason
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::relay::leg::Direction;

/// Install the Prometheus exporter with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_session_opened(active: usize) {
    counter!("relay_sessions_total").increment(1);
    gauge!("relay_sessions_active").set(active as f64);
}

pub fn record_session_closed(active: usize, lifetime: Duration) {
    gauge!("relay_sessions_active").set(active as f64);
    histogram!("relay_session_duration_seconds").record(lifetime.as_secs_f64());
}

pub fn record_frame(direction: Direction, len: usize) {
    let direction = direction.as_str();
    counter!("relay_frames_total", "direction" => direction).increment(1);
    counter!("relay_frame_bytes_total", "direction" => direction).increment(len as u64);
}

pub fn record_upstream_failure(reason: &'static str) {
    counter!("relay_upstream_failures_total", "reason" => reason).increment(1);
}
