//! Readiness cascade tracking.
//!
//! # State Transitions
//! ```text
//! readiness failed  → failures += 1
//! readiness passed  → failures = 0
//! liveness          → CASCADED if threshold > 0 && failures > threshold
//! ```
//!
//! # Design Decisions
//! - One atomic counter per App instance, shared by both probes
//! - Non-positive threshold disables escalation entirely

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::observability::metrics;

/// Consecutive readiness failure counter.
#[derive(Debug, Clone)]
pub struct CascadeTracker {
    failures: Arc<AtomicU64>,
    threshold: i64,
}

impl CascadeTracker {
    pub fn new(threshold: i64) -> Self {
        Self {
            failures: Arc::new(AtomicU64::new(0)),
            threshold,
        }
    }

    /// Record one readiness outcome. Returns the counter after the update.
    pub fn record(&self, failed: bool) -> u64 {
        let count = if failed {
            self.failures.fetch_add(1, Ordering::SeqCst) + 1
        } else {
            self.failures.store(0, Ordering::SeqCst);
            0
        };

        metrics::record_readiness_failures(count);
        if failed && self.threshold > 0 && count == self.threshold as u64 + 1 {
            tracing::error!(
                failures = count,
                threshold = self.threshold,
                "Readiness failures cascaded into liveness"
            );
        }
        count
    }

    /// Current consecutive failure count.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::SeqCst)
    }

    pub fn threshold(&self) -> i64 {
        self.threshold
    }

    /// Whether liveness should report a cascaded failure.
    pub fn is_cascaded(&self) -> bool {
        self.threshold > 0 && self.failures() > self.threshold as u64
    }
}
