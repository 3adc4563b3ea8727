use axum::{extract::State, http::StatusCode, response::Response};
use tokio_util::sync::CancellationToken;

use crate::diagnostics::DiagnosticsState;
use crate::http::response::respond_text;

/// Liveness: `OK`, or `CASCADED` once readiness failures exceed the threshold.
pub async fn alive(State(state): State<DiagnosticsState>) -> Response {
    if state.cascade.is_cascaded() {
        respond_text("CASCADED", StatusCode::INTERNAL_SERVER_ERROR)
    } else {
        respond_text("OK", StatusCode::OK)
    }
}

/// Readiness: run every check and feed the outcome into the cascade tracker.
pub async fn ready(State(state): State<DiagnosticsState>) -> Response {
    // Cancelled when this request future is dropped.
    let token = CancellationToken::new();
    let _guard = token.clone().drop_guard();

    let report = state.registry.evaluate(token).await;
    let failures = state.cascade.record(report.failed);

    let status = if report.failed {
        tracing::warn!(failures, "Readiness check failed");
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    respond_text(report.render(), status)
}

/// Prometheus exposition of the process recorder.
pub async fn metrics(State(state): State<DiagnosticsState>) -> Response {
    match &state.metrics {
        Some(handle) => {
            let mut response = respond_text(handle.render(), StatusCode::OK);
            response.headers_mut().insert(
                axum::http::header::CONTENT_TYPE,
                axum::http::HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
            );
            response
        }
        None => respond_text("metrics disabled", StatusCode::NOT_FOUND),
    }
}
