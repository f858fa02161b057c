//! Prometheus metrics exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by route
//! - `gateway_rejections_total` (counter): rejections by route, reason
//! - `gateway_response_time_seconds` (histogram): latency by route
//! - `gateway_route_refresh_total` (counter): refreshes by outcome
//! - `gateway_routes_active` (gauge): routes in the live table
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; calls are no-ops until a
//!   recorder is installed, so tests never need one
//! - Histogram buckets tuned for typical web latencies

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};

use crate::error::RejectReason;

const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full("gateway_response_time_seconds".to_string()),
            LATENCY_BUCKETS,
        )?
        .install()?;

    tracing::info!(address = %addr, "Prometheus metrics endpoint listening");
    Ok(())
}

pub fn record_request(route_id: &str) {
    counter!("gateway_requests_total", "route" => route_id.to_string()).increment(1);
}

pub fn record_rejection(route_id: &str, reason: RejectReason) {
    counter!(
        "gateway_rejections_total",
        "route" => route_id.to_string(),
        "reason" => reason.as_str()
    )
    .increment(1);
}

pub fn record_response_time(route_id: &str, elapsed: Duration) {
    histogram!("gateway_response_time_seconds", "route" => route_id.to_string())
        .record(elapsed.as_secs_f64());
}

/// Record a route table refresh and the size of the table now live.
pub fn record_refresh(success: bool, active_routes: usize) {
    let outcome = if success { "success" } else { "failure" };
    counter!("gateway_route_refresh_total", "outcome" => outcome).increment(1);
    gauge!("gateway_routes_active").set(active_routes as f64);
}
