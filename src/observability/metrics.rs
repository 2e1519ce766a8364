//! Metrics collection and exposition.
//!
//! # Metrics
//! - `task_host_requests_total` (counter): dispatched request-tasks by
//!   method, path
//! - `task_host_request_outcomes_total` (counter): terminal outcomes by
//!   outcome, method, path
//! - `task_host_in_flight_tasks` (gauge): request-tasks currently running

use std::net::SocketAddr;

use metrics::{counter, gauge};

/// Install the Prometheus exporter at the given address.
pub fn init_metrics(addr: SocketAddr) {
    use metrics_exporter_prometheus::PrometheusBuilder;

    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "metrics exporter listening"),
        Err(error) => tracing::error!(error = %error, "failed to install metrics exporter"),
    }
}

/// Record one dispatched request-task.
pub fn record_dispatched(method: &str, path: &str) {
    counter!(
        "task_host_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
    )
    .increment(1);
    gauge!("task_host_in_flight_tasks").increment(1.0);
}

/// Record a request-task's terminal outcome.
pub fn record_outcome(outcome: &'static str, method: &str, path: &str) {
    counter!(
        "task_host_request_outcomes_total",
        "outcome" => outcome,
        "method" => method.to_string(),
        "path" => path.to_string(),
    )
    .increment(1);
    gauge!("task_host_in_flight_tasks").decrement(1.0);
}
