//! Admission control subsystem.
//!
//! # Data Flow
//! ```text
//! Non-diagnostics request
//!     → middleware.rs (acquire permit, may wait)
//!     → dispatch core runs the handler
//!     → permit dropped (handler returned, panicked or request cancelled)
//! ```
//!
//! # Design Decisions
//! - Diagnostics requests never reach this layer
//! - No built-in timeout; the request deadline layer bounds the wait
//! - Tokens in circulation (held + available) stay constant

pub mod middleware;
pub mod pool;

pub use middleware::admission_middleware;
pub use pool::{Admission, AdmissionError, AdmissionPermit};
