//! Minimal request-handling core for HTTP services.
//!
//! Dispatches requests to registered handlers through a pluggable context
//! type, bounds in-flight work with a permit pool, serves liveness/readiness
//! probes backed by named health checks, and flattens request payloads into
//! a single key-value map.

pub mod admission;
pub mod app;
pub mod config;
pub mod diagnostics;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use app::App;
pub use config::{AppConfig, Options};
pub use http::{BasicContext, Context, HttpServer};
pub use lifecycle::Shutdown;
