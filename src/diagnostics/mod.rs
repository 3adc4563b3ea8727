//! Diagnostics surface.
//!
//! # Paths
//! | Path | Behavior |
//! |---|---|
//! | `/debug/alive` | `200 OK`, or `500 CASCADED` after sustained readiness failure |
//! | `/debug/ready` | runs health checks; `200` or `500` with the report |
//! | `/debug/metrics` | Prometheus exposition |
//! | `/debug/pprof/` | profiling router supplied by the application, if any |
//!
//! # Design Decisions
//! - Mounted outside user routing and outside admission control
//! - Plain-text bodies only

pub mod handlers;

use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;

use crate::health::{CascadeTracker, HealthRegistry};

pub const DEBUG_PATH_PREFIX: &str = "/debug/";
pub const DEBUG_PATH_ALIVE: &str = "/debug/alive";
pub const DEBUG_PATH_READY: &str = "/debug/ready";
pub const DEBUG_PATH_METRICS: &str = "/debug/metrics";
pub const DEBUG_PATH_PPROF: &str = "/debug/pprof";

/// Shared state of the diagnostics handlers.
#[derive(Clone)]
pub struct DiagnosticsState {
    pub registry: HealthRegistry,
    pub cascade: CascadeTracker,
    pub metrics: Option<PrometheusHandle>,
}

/// Whether `path` belongs to the diagnostics surface.
pub fn is_diagnostics_path(path: &str) -> bool {
    path.starts_with(DEBUG_PATH_PREFIX)
}

/// Build the diagnostics router. `profiler` is mounted under `/debug/pprof`.
pub fn setup_diagnostics_router(state: DiagnosticsState, profiler: Option<Router>) -> Router {
    let router = Router::new()
        .route(DEBUG_PATH_ALIVE, get(handlers::alive))
        .route(DEBUG_PATH_READY, get(handlers::ready))
        .route(DEBUG_PATH_METRICS, get(handlers::metrics))
        .with_state(state);

    match profiler {
        Some(profiler) => router.nest(DEBUG_PATH_PPROF, profiler),
        None => router,
    }
}
