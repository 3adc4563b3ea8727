//! Admission middleware for user routes.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::admission::pool::Admission;
use crate::http::response::respond_text;

/// Hold a permit for the whole downstream run.
pub async fn admission_middleware(
    State(admission): State<Admission>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let _permit = match admission.acquire().await {
        Ok(permit) => permit,
        Err(e) => {
            tracing::error!(error = %e, "Admission failed");
            return respond_text("Service Unavailable", StatusCode::SERVICE_UNAVAILABLE);
        }
    };

    next.run(request).await
}
