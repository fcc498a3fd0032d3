//! HTTP request metrics and Prometheus exposition.
//!
//! # Responsibilities
//! - Expose a Prometheus-compatible scrape endpoint
//! - Count and time every HTTP request passing the request logging layer
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by method, status
//! - `http_request_duration_seconds` (histogram): latency distribution
//!
//! # Design Decisions
//! - Goes through the `metrics` facade; without an installed recorder the
//!   calls are no-ops, so tests need no exporter
//! - Business instruments live in the instrument registry, not here

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

/// Install the Prometheus recorder and its HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            metrics::describe_counter!(HTTP_REQUESTS_TOTAL, "Total HTTP requests handled.");
            metrics::describe_histogram!(
                HTTP_REQUEST_DURATION_SECONDS,
                metrics::Unit::Seconds,
                "HTTP request latency."
            );
            tracing::info!(address = %addr, "Prometheus metrics endpoint listening");
        }
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install Prometheus exporter");
        }
    }
}

/// Record one finished request. `status` is the numeric code or a failure label.
pub fn record_request(method: &str, status: &str, start_time: Instant) {
    let elapsed = start_time.elapsed().as_secs_f64();
    metrics::counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .record(elapsed);
}
