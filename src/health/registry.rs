//! Named health checks.
//!
//! # Responsibilities
//! - Hold check functions keyed by name (re-registering a name replaces it)
//! - Evaluate every check and render the aggregate report
//!
//! # Design Decisions
//! - A failing check is recorded in the report, never returned as an error
//! - Checks run one after another; report line order is unspecified
//! - Each evaluation gets a cancellation token tied to the probe request

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use futures_util::{future::BoxFuture, FutureExt};
use tokio_util::sync::CancellationToken;

/// Failure reported by a single check.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct CheckFailure(pub String);

impl CheckFailure {
    pub fn new(message: impl fmt::Display) -> Self {
        Self(message.to_string())
    }
}

type CheckFn = Arc<dyn Fn(CancellationToken) -> BoxFuture<'static, Result<(), CheckFailure>> + Send + Sync>;

/// Result of evaluating every registered check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessReport {
    /// `(name, outcome)` per check, in evaluation order.
    pub entries: Vec<(String, Result<(), CheckFailure>)>,
    /// True when at least one check failed.
    pub failed: bool,
}

impl ReadinessReport {
    /// `name: OK` / `name: <error>` lines joined by `\n`; `OK` when empty.
    pub fn render(&self) -> String {
        if self.entries.is_empty() {
            return "OK".to_string();
        }
        self.entries
            .iter()
            .map(|(name, outcome)| match outcome {
                Ok(()) => format!("{name}: OK"),
                Err(e) => format!("{name}: {e}"),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for ReadinessReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Registry of named checks.
#[derive(Clone, Default)]
pub struct HealthRegistry {
    checks: Arc<RwLock<HashMap<String, CheckFn>>>,
}

impl fmt::Debug for HealthRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthRegistry")
            .field("checks", &self.names())
            .finish()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `check` under `name`, replacing an existing one.
    pub fn check_func<F, Fut, E>(&self, name: impl Into<String>, check: F)
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display + 'static,
    {
        let check = Arc::new(check);
        let wrapped: CheckFn = Arc::new(move |token| {
            let fut = check(token);
            async move { fut.await.map_err(CheckFailure::new) }.boxed()
        });

        let name = name.into();
        let mut checks = self.checks.write().unwrap_or_else(PoisonError::into_inner);
        if checks.insert(name.clone(), wrapped).is_some() {
            tracing::debug!(check = %name, "Health check replaced");
        }
    }

    /// Registered check names, sorted.
    pub fn names(&self) -> Vec<String> {
        let checks = self.checks.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<_> = checks.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.checks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every check in turn.
    pub async fn evaluate(&self, token: CancellationToken) -> ReadinessReport {
        // Snapshot so no lock is held across awaits.
        let checks: Vec<(String, CheckFn)> = self
            .checks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, check)| (name.clone(), Arc::clone(check)))
            .collect();

        let mut entries = Vec::with_capacity(checks.len());
        let mut failed = false;
        for (name, check) in checks {
            let outcome = check(token.clone()).await;
            if let Err(e) = &outcome {
                failed = true;
                tracing::warn!(check = %name, error = %e, "Health check failed");
            }
            entries.push((name, outcome));
        }

        ReadinessReport { entries, failed }
    }
}
