//! Response helpers.
//!
//! # Design Decisions
//! - Diagnostics answers are plain text only; no structured error payload

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::Response,
};

/// Content type used for every plain-text answer.
pub const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";

/// Build a plain-text response with the given status.
pub fn respond_text(text: impl Into<String>, status: StatusCode) -> Response {
    let mut response = Response::new(Body::from(text.into()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(TEXT_PLAIN_UTF8),
    );
    response
}
