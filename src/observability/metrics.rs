//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define balancer metrics (requests, latency, retries, pool state)
//! - Expose Prometheus-compatible metrics endpoint
//! - Track per-backend and aggregate metrics
//!
//! # Metrics
//! - `balancer_requests_total` (counter): requests by method, status, backend
//! - `balancer_request_duration_seconds` (histogram): latency distribution
//! - `balancer_retries_total` (counter): forwarding retries per backend
//! - `balancer_pool_exhausted_total` (counter): admissions refused per backend
//! - `balancer_backend_alive` (gauge): 1=alive, 0=dead
//! - `balancer_backend_in_use` / `balancer_backend_pool_size` (gauges): slot pool state
//!
//! # Design Decisions
//! - Recording without an installed exporter is a no-op, so library code and
//!   tests never need to initialize anything

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, backend: &str, start: Instant) {
    ::metrics::counter!(
        "balancer_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "backend" => backend.to_string()
    )
    .increment(1);

    ::metrics::histogram!(
        "balancer_request_duration_seconds",
        "method" => method.to_string(),
        "backend" => backend.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_retry(backend: &str) {
    ::metrics::counter!("balancer_retries_total", "backend" => backend.to_string()).increment(1);
}

pub fn record_pool_exhausted(backend: &str) {
    ::metrics::counter!("balancer_pool_exhausted_total", "backend" => backend.to_string()).increment(1);
}

pub fn record_backend_alive(backend: &str, alive: bool) {
    ::metrics::gauge!("balancer_backend_alive", "backend" => backend.to_string())
        .set(if alive { 1.0 } else { 0.0 });
}

pub fn record_pool_stats(backend: &str, in_use: usize, pool_size: usize) {
    ::metrics::gauge!("balancer_backend_in_use", "backend" => backend.to_string()).set(in_use as f64);
    ::metrics::gauge!("balancer_backend_pool_size", "backend" => backend.to_string()).set(pool_size as f64);
}
