//! Application facade.
//!
//! # Data Flow
//! ```text
//! Request
//!     → path starts with /debug/ ? → diagnostics router (never gated)
//!     → otherwise                   → admission (permit) → user router
//!                                        → dispatch: construct → handler → finalize
//! ```
//!
//! # Design Decisions
//! - One concrete context type per App, chosen through the factory
//! - Pattern syntax: trailing `/` means "this path and everything below"
//! - Cascade counter and permit pool belong to the App instance, not the process

use std::future::Future;
use std::sync::Arc;

use axum::{
    body::Body,
    http::Request,
    middleware,
    routing::any,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use crate::admission::{admission_middleware, Admission};
use crate::config::Options;
use crate::diagnostics::{is_diagnostics_path, setup_diagnostics_router, DiagnosticsState};
use crate::health::{CascadeTracker, HealthRegistry};
use crate::http::context::{Context, ContextFactory};
use crate::http::dispatch::{dispatch_route, handler_fn};
use crate::observability::metrics;

/// The request-handling core.
pub struct App<C: Context> {
    factory: ContextFactory<C>,
    options: Options,
    registry: HealthRegistry,
    cascade: CascadeTracker,
    admission: Admission,
    routes: Router,
    patterns: Vec<String>,
    profiler: Option<Router>,
    metrics: Option<PrometheusHandle>,
}

impl<C: Context> std::fmt::Debug for App<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("options", &self.options)
            .field("patterns", &self.patterns)
            .field("checks", &self.registry.names())
            .finish_non_exhaustive()
    }
}

/// Expand a pattern into the axum paths that implement it.
fn route_paths(pattern: &str) -> Vec<String> {
    if pattern.ends_with('/') {
        vec![pattern.to_string(), format!("{pattern}{{*rest}}")]
    } else {
        vec![pattern.to_string()]
    }
}

impl<C: Context> App<C> {
    /// Create an App building one context per request through `factory`.
    pub fn new(factory: ContextFactory<C>, options: Options) -> Self {
        tracing::debug!(
            concurrency = options.concurrency,
            readiness_cascade = options.readiness_cascade,
            "App created"
        );
        Self {
            factory,
            options,
            registry: HealthRegistry::new(),
            cascade: CascadeTracker::new(options.readiness_cascade),
            admission: Admission::new(options.concurrency),
            routes: Router::new(),
            patterns: Vec::new(),
            profiler: None,
            metrics: Some(metrics::init_metrics()),
        }
    }

    /// Register a health check evaluated by the readiness probe.
    pub fn check_func<F, Fut, E>(&self, name: impl Into<String>, check: F)
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: std::fmt::Display + 'static,
    {
        self.registry.check_func(name, check);
    }

    /// Register `handler` for `pattern`.
    ///
    /// # Panics
    ///
    /// Panics if the pattern is already registered or is not a valid path,
    /// the same way the underlying router does.
    pub fn handle_func<F, Fut>(&mut self, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler = handler_fn(handler);
        let route: Arc<str> = Arc::from(pattern);

        let mut routes = std::mem::take(&mut self.routes);
        for path in route_paths(pattern) {
            let factory = Arc::clone(&self.factory);
            let handler = Arc::clone(&handler);
            let route = Arc::clone(&route);
            routes = routes.route(
                &path,
                any(move |request: Request<Body>| {
                    dispatch_route(route, factory, handler, request)
                }),
            );
        }
        self.routes = routes;
        self.patterns.push(pattern.to_string());

        tracing::debug!(pattern, "Route registered");
        self
    }

    /// Mount a profiling router under `/debug/pprof`.
    pub fn with_profiler(mut self, profiler: Router) -> Self {
        self.profiler = Some(profiler);
        self
    }

    /// Disable the metrics path.
    pub fn without_metrics(mut self) -> Self {
        self.metrics = None;
        self
    }

    pub fn options(&self) -> Options {
        self.options
    }

    pub fn registry(&self) -> &HealthRegistry {
        &self.registry
    }

    pub fn cascade(&self) -> &CascadeTracker {
        &self.cascade
    }

    pub fn admission(&self) -> &Admission {
        &self.admission
    }

    /// Registered patterns, in registration order.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Build the top-level router: diagnostics first, gated user routes otherwise.
    pub fn into_router(self) -> Router {
        let diagnostics = setup_diagnostics_router(
            DiagnosticsState {
                registry: self.registry,
                cascade: self.cascade,
                metrics: self.metrics,
            },
            self.profiler,
        );

        let routes = if self.admission.is_bounded() {
            self.routes.layer(middleware::from_fn_with_state(
                self.admission,
                admission_middleware,
            ))
        } else {
            self.routes
        };

        let split = tower::service_fn(move |request: Request<Body>| {
            let target = if is_diagnostics_path(request.uri().path()) {
                diagnostics.clone()
            } else {
                routes.clone()
            };
            target.oneshot(request)
        });

        Router::new().fallback_service(split)
    }
}
