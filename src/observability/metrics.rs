//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define service metrics (RPS, latency, in-flight, readiness failures)
//! - Own the Prometheus recorder rendered by the diagnostics metrics path
//!
//! # Metrics
//! - `summer_requests_total` (counter): dispatched requests by method, route, status
//! - `summer_request_duration_seconds` (histogram): dispatch latency by method, route
//! - `summer_inflight_requests` (gauge): requests currently holding a permit
//! - `summer_admission_wait_seconds` (histogram): time spent waiting for a permit
//! - `summer_readiness_failures` (gauge): current consecutive readiness failures
//!
//! # Design Decisions
//! - Low-overhead metric updates through the `metrics` facade
//! - The recorder is process-wide and installed at most once

use std::sync::OnceLock;
use std::time::Instant;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the process-wide Prometheus recorder and return its handle.
///
/// Repeated calls return the same handle. If another recorder already owns
/// the global slot, a detached recorder is built so rendering still works.
pub fn init_metrics() -> PrometheusHandle {
    HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                tracing::info!("Prometheus recorder installed");
                handle
            }
            Err(e) => {
                tracing::warn!(error = %e, "Global recorder unavailable, using a detached one");
                PrometheusBuilder::new().build_recorder().handle()
            }
        })
        .clone()
}

/// Record one dispatched request.
pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    metrics::counter!(
        "summer_requests_total",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "summer_request_duration_seconds",
        "method" => method.to_string(),
        "route" => route.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Track a permit being taken (`+1`) or returned (`-1`).
pub fn record_inflight(delta: f64) {
    metrics::gauge!("summer_inflight_requests").increment(delta);
}

/// Record how long a request waited for admission.
pub fn record_admission_wait(start: Instant) {
    metrics::histogram!("summer_admission_wait_seconds").record(start.elapsed().as_secs_f64());
}

/// Publish the current consecutive readiness failure count.
pub fn record_readiness_failures(count: u64) {
    metrics::gauge!("summer_readiness_failures").set(count as f64);
}
