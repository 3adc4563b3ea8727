//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → Options (admission / cascade knobs handed to the App)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; it is read at construction time only
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{AppConfig, ListenerConfig, LogFormat, ObservabilityConfig};
pub use validation::ValidationError;

use schema::{DEFAULT_CONCURRENCY, DEFAULT_READINESS_CASCADE};

/// Construction-time options of an [`App`](crate::app::App).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Admission pool size; `<= 0` disables admission control.
    pub concurrency: i64,
    /// Cascade threshold; `<= 0` disables cascading.
    pub readiness_cascade: i64,
}

impl Options {
    /// Set the admission pool size.
    pub fn concurrency(mut self, concurrency: i64) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the readiness cascade threshold.
    pub fn readiness_cascade(mut self, threshold: i64) -> Self {
        self.readiness_cascade = threshold;
        self
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            readiness_cascade: DEFAULT_READINESS_CASCADE,
        }
    }
}

impl From<&AppConfig> for Options {
    fn from(config: &AppConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            readiness_cascade: config.readiness_cascade,
        }
    }
}
