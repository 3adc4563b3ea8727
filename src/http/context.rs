//! Request-scoped context.
//!
//! # Responsibilities
//! - Define the capability every handler context implements (`Context`)
//! - Provide the factory seam the dispatch core builds contexts through
//! - Ship `BasicContext`, a ready-made context over an axum request
//!
//! # Design Decisions
//! - Contexts are cheap handles (`Clone` over shared state): the handler gets
//!   one copy, the dispatch core keeps another to finalize with
//! - `finalize` consumes the context and runs exactly once per request
//! - The concrete context type is fixed per `App`, not per request

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    body::{Body, Bytes},
    extract::ConnectInfo,
    http::{header, request::Parts, HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode, Uri},
    response::Response,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::http::request::{extract_client_ip, flatten_request, FlatMap, NormalizeError};
use crate::http::response::{respond_text, TEXT_PLAIN_UTF8};

/// Why a handler did not run to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerFailure {
    /// The handler panicked; carries the panic message when it was a string.
    Panicked(String),
    /// The request was dropped (client gone or deadline hit) mid-handler.
    Cancelled,
}

/// Capability a handler context must provide.
pub trait Context: Clone + Send + Sync + 'static {
    /// Produce the response. Called exactly once, after the handler returned,
    /// panicked or was cancelled.
    fn finalize(self, failure: Option<HandlerFailure>) -> Response;
}

/// Builds a context for each matched request.
pub type ContextFactory<C> = Arc<dyn Fn(Request<Body>) -> C + Send + Sync>;

/// Errors from [`BasicContext::bind`].
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error("failed to decode parameters: {0}")]
    Decode(#[from] serde_json::Error),
}

enum BodyState {
    Unread(Body),
    Read(Bytes),
    Failed(String),
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

struct Inner {
    parts: Parts,
    max_body_size: usize,
    body: tokio::sync::Mutex<BodyState>,
    reply: Mutex<Reply>,
}

/// A general purpose [`Context`] over an axum request.
#[derive(Clone)]
pub struct BasicContext {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for BasicContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicContext")
            .field("method", &self.inner.parts.method)
            .field("uri", &self.inner.parts.uri)
            .finish_non_exhaustive()
    }
}

impl BasicContext {
    pub fn new(request: Request<Body>, max_body_size: usize) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            inner: Arc::new(Inner {
                parts,
                max_body_size,
                body: tokio::sync::Mutex::new(BodyState::Unread(body)),
                reply: Mutex::new(Reply {
                    status: StatusCode::OK,
                    headers: HeaderMap::new(),
                    body: Bytes::new(),
                }),
            }),
        }
    }

    /// Factory suitable for [`App::new`](crate::app::App::new).
    pub fn factory(max_body_size: usize) -> ContextFactory<Self> {
        Arc::new(move |request| Self::new(request, max_body_size))
    }

    pub fn method(&self) -> &Method {
        &self.inner.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.inner.parts.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.inner.parts.headers
    }

    /// Request id assigned by the request-id layer, if any.
    pub fn request_id(&self) -> Option<&str> {
        self.headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
    }

    /// Client address, honoring `X-Forwarded-For`.
    pub fn client_ip(&self) -> Option<String> {
        let remote = self
            .inner
            .parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        extract_client_ip(self.headers(), remote)
    }

    /// Read the request body, at most once; later calls return the cached bytes.
    pub async fn body(&self) -> Result<Bytes, NormalizeError> {
        let mut state = self.inner.body.lock().await;
        let body = match std::mem::replace(&mut *state, BodyState::Read(Bytes::new())) {
            BodyState::Unread(body) => body,
            BodyState::Read(bytes) => {
                *state = BodyState::Read(bytes.clone());
                return Ok(bytes);
            }
            BodyState::Failed(reason) => {
                *state = BodyState::Failed(reason.clone());
                return Err(NormalizeError::Body(reason));
            }
        };

        match axum::body::to_bytes(body, self.inner.max_body_size).await {
            Ok(bytes) => {
                *state = BodyState::Read(bytes.clone());
                Ok(bytes)
            }
            Err(e) => {
                let reason = e.to_string();
                *state = BodyState::Failed(reason.clone());
                Err(NormalizeError::Body(reason))
            }
        }
    }

    /// Flatten query, headers and body into one map.
    pub async fn flatten(&self) -> Result<FlatMap, NormalizeError> {
        let body = self.body().await?;
        let mut map = FlatMap::new();
        flatten_request(&mut map, self.uri(), self.headers(), &body)?;
        Ok(map)
    }

    /// Flatten the request and decode it into `T`.
    pub async fn bind<T: DeserializeOwned>(&self) -> Result<T, BindError> {
        let map = self.flatten().await?;
        Ok(serde_json::from_value(serde_json::Value::Object(map))?)
    }

    fn reply(&self) -> std::sync::MutexGuard<'_, Reply> {
        self.inner.reply.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the response status.
    pub fn code(&self, status: StatusCode) {
        self.reply().status = status;
    }

    /// Set a response header, replacing any previous value.
    pub fn header(&self, name: HeaderName, value: HeaderValue) {
        self.reply().headers.insert(name, value);
    }

    /// Respond with plain text.
    pub fn text(&self, text: impl Into<String>) {
        let mut reply = self.reply();
        reply
            .headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN_UTF8));
        reply.body = Bytes::from(text.into());
    }

    /// Respond with a JSON document.
    pub fn json<T: Serialize>(&self, value: &T) -> Result<(), serde_json::Error> {
        let encoded = serde_json::to_vec(value)?;
        let mut reply = self.reply();
        reply.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        reply.body = Bytes::from(encoded);
        Ok(())
    }
}

impl Context for BasicContext {
    fn finalize(self, failure: Option<HandlerFailure>) -> Response {
        match failure {
            Some(HandlerFailure::Panicked(message)) => {
                tracing::error!(
                    method = %self.method(),
                    path = %self.uri().path(),
                    panic = %message,
                    "Handler panicked"
                );
                respond_text("Internal Server Error", StatusCode::INTERNAL_SERVER_ERROR)
            }
            failure => {
                if failure.is_some() {
                    tracing::debug!(path = %self.uri().path(), "Request cancelled before completion");
                }
                let mut reply = self.reply();
                let mut response = Response::new(Body::from(std::mem::take(&mut reply.body)));
                *response.status_mut() = reply.status;
                *response.headers_mut() = std::mem::take(&mut reply.headers);
                response
            }
        }
    }
}
