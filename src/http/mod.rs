//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, deadline)
//!     → dispatch.rs (context → handler → finalize)
//!     → context.rs (request access, normalization, response building)
//!     → request.rs (flatten query / headers / body)
//!     → response.rs (plain-text answers)
//! ```

pub mod context;
pub mod dispatch;
pub mod request;
pub mod response;
pub mod server;

pub use context::{BasicContext, BindError, Context, ContextFactory, HandlerFailure};
pub use request::{extract_client_ip, flatten_request, flatten_values, FlatMap, NormalizeError};
pub use response::respond_text;
pub use server::HttpServer;
