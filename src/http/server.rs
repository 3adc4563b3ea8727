//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Wrap the App router with transport middleware (tracing, deadline, request ID)
//! - Bind server to listener
//! - Serve until the shutdown signal fires

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::app::App;
use crate::config::AppConfig;
use crate::http::context::Context;

/// HTTP server in front of an [`App`].
pub struct HttpServer {
    router: Router,
    config: AppConfig,
}

impl HttpServer {
    /// Create a new HTTP server for `app`.
    pub fn new<C: Context>(config: AppConfig, app: App<C>) -> Self {
        let app = if config.observability.metrics_enabled {
            app
        } else {
            app.without_metrics()
        };
        let router = Self::build_router(&config, app.into_router());
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, router: Router) -> Router {
        let router = if config.timeouts.request_secs > 0 {
            router.layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
        } else {
            router
        };

        router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            concurrency = self.config.concurrency,
            readiness_cascade = self.config.readiness_cascade,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
