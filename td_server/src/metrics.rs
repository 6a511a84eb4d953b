//! Prometheus metrics for monitoring the tournament director.
//!
//! The library records domain metrics through the `metrics` facade
//! (`timer_ticks_total`, `players_seated_total`, `events_consumed_total`, ...).
//! This module installs the exporter and records the HTTP layer.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use td_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::http_requests_total("POST", "/tournaments", 201);
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
///
/// # Arguments
///
/// - `addr`: Address to bind the metrics server to (e.g., `0.0.0.0:9090`)
///
/// # Returns
///
/// Result indicating success or error message
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record HTTP request.
///
/// Increments the total HTTP request counter with method, path, and status labels.
pub fn http_requests_total(method: &str, path: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record HTTP request duration in milliseconds.
pub fn http_request_duration_ms(method: &str, path: &str, duration_ms: f64) {
    metrics::histogram!("http_request_duration_ms",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_ms);
}

// ============================================================================
// Service Metrics
// ============================================================================

/// Set how many timers the startup sweep brought back.
pub fn timers_recovered(count: usize) {
    metrics::gauge!("timers_recovered").set(count as f64);
}

/// Set how many background tasks (consumers and ticker) are running.
pub fn background_tasks(count: usize) {
    metrics::gauge!("background_tasks").set(count as f64);
}

/// Increment live timer stream subscriptions.
pub fn timer_streams_opened() {
    metrics::counter!("timer_streams_opened_total").increment(1);
}
