//! Metrics collection and exposition.
//!
//! # Metrics
//! - `provision_requests_total` (counter): requests by outcome
//! - `provision_duration_seconds` (histogram): end-to-end handler latency
//! - `retry_attempts_total` (counter): mutation attempts by action
//! - `operation_polls_total` (counter): status probes by observed outcome
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so library code and
//!   tests can call these freely
//! - The Prometheus exporter is opt-in

use std::net::SocketAddr;
use std::time::Instant;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished provisioning request.
pub fn record_request(outcome: &'static str, start: Instant) {
    counter!("provision_requests_total", "outcome" => outcome).increment(1);
    histogram!("provision_duration_seconds", "outcome" => outcome).record(start.elapsed().as_secs_f64());
}

/// Record one attempt of a retried mutation.
pub fn record_retry_attempt(action: &str) {
    counter!("retry_attempts_total", "action" => action.to_string()).increment(1);
}

/// Record one status probe.
pub fn record_poll(outcome: &'static str) {
    counter!("operation_polls_total", "outcome" => outcome).increment(1);
}
