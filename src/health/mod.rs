//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! GET /debug/ready:
//!     → registry.rs (run every named check)
//!     → cascade.rs (count consecutive failures / reset on success)
//!
//! GET /debug/alive:
//!     → cascade.rs (escalate once failures exceed the threshold)
//! ```
//!
//! # Design Decisions
//! - Readiness answers "is a dependency down", liveness answers
//!   "should this process be restarted"
//! - Liveness never runs checks itself; it only reads the counter

pub mod cascade;
pub mod registry;

pub use cascade::CascadeTracker;
pub use registry::{CheckFailure, HealthRegistry, ReadinessReport};
