//! Fixed-size permit pool.
//!
//! # Responsibilities
//! - Bound the number of concurrently running handlers
//! - Hand out RAII permits released on every exit path (return, panic, drop)
//!
//! # Design Decisions
//! - Backed by `tokio::sync::Semaphore`, which queues waiters fairly
//! - A cancelled `acquire` future leaves the wait queue on drop
//! - Non-positive capacity allocates nothing and admits everything

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::observability::metrics;

/// Error type for admission.
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    /// The pool was closed; never happens while the app is alive.
    #[error("admission pool closed")]
    Closed,
}

/// Admission controller over a fixed pool of permits.
#[derive(Debug, Clone)]
pub struct Admission {
    /// `None` in unbounded mode.
    pool: Option<Arc<Semaphore>>,
    capacity: usize,
}

impl Admission {
    /// Create a controller; `capacity <= 0` disables gating.
    pub fn new(capacity: i64) -> Self {
        match usize::try_from(capacity) {
            Ok(capacity) if capacity > 0 => Self {
                pool: Some(Arc::new(Semaphore::new(capacity))),
                capacity,
            },
            _ => Self::unbounded(),
        }
    }

    /// A controller that never blocks.
    pub fn unbounded() -> Self {
        Self {
            pool: None,
            capacity: 0,
        }
    }

    /// Whether requests are gated at all.
    pub fn is_bounded(&self) -> bool {
        self.pool.is_some()
    }

    /// Configured pool size (0 when unbounded).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently free, `None` when unbounded.
    pub fn available(&self) -> Option<usize> {
        self.pool.as_ref().map(|pool| pool.available_permits())
    }

    /// Wait for a permit.
    ///
    /// The returned permit must be held for the whole handler run; dropping
    /// it returns the token to the pool.
    pub async fn acquire(&self) -> Result<AdmissionPermit, AdmissionError> {
        let Some(pool) = &self.pool else {
            return Ok(AdmissionPermit { permit: None });
        };

        let start = Instant::now();
        if pool.available_permits() == 0 {
            tracing::debug!(capacity = self.capacity, "Admission pool exhausted, waiting");
        }

        let permit = Arc::clone(pool)
            .acquire_owned()
            .await
            .map_err(|_| AdmissionError::Closed)?;

        metrics::record_admission_wait(start);
        metrics::record_inflight(1.0);
        Ok(AdmissionPermit {
            permit: Some(permit),
        })
    }
}

/// A permit representing an admission slot.
///
/// When dropped, the slot is released back to the pool.
#[derive(Debug)]
pub struct AdmissionPermit {
    permit: Option<OwnedSemaphorePermit>,
}

impl AdmissionPermit {
    /// False for permits handed out in unbounded mode.
    pub fn is_gated(&self) -> bool {
        self.permit.is_some()
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        if self.permit.is_some() {
            metrics::record_inflight(-1.0);
        }
    }
}
