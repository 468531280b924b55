//! Metrics collection and exposition.
//!
//! # Metrics
//! - `frontdoor_requests_total` (counter): requests by method, status, route
//! - `frontdoor_request_duration_seconds` (histogram): latency by route
//! - `frontdoor_requests_shed_total` (counter): admission rejections
//! - `frontdoor_forwarded_total` (counter): writer exchanges by outcome, status
//! - `frontdoor_liveness_relays_total` (counter): liveness relays by outcome
//! - `frontdoor_health_checks_total` (counter): probes by result
//! - `frontdoor_runtime_lag_seconds` (gauge): smoothed runtime lag
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so tests need no setup
//! - The Prometheus listener is only started when enabled in config

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, route: &'static str, started: Instant) {
    metrics::counter!(
        "frontdoor_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route
    )
    .increment(1);
    metrics::histogram!("frontdoor_request_duration_seconds", "route" => route)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_shed() {
    metrics::counter!("frontdoor_requests_shed_total").increment(1);
}

pub fn record_forward(outcome: &'static str, status: u16, started: Instant) {
    metrics::counter!(
        "frontdoor_forwarded_total",
        "outcome" => outcome,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("frontdoor_request_duration_seconds", "route" => "writer")
        .record(started.elapsed().as_secs_f64());
}

pub fn record_liveness(outcome: &'static str) {
    metrics::counter!("frontdoor_liveness_relays_total", "outcome" => outcome).increment(1);
}

pub fn record_health(healthy: bool) {
    let result = if healthy { "ok" } else { "failed" };
    metrics::counter!("frontdoor_health_checks_total", "result" => result).increment(1);
}

pub fn record_lag(lag: Duration) {
    metrics::gauge!("frontdoor_runtime_lag_seconds").set(lag.as_secs_f64());
}
