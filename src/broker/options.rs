//! Broker tuning options.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use mqtt_lifecycle::BrokerOptions;
//!
//! let options = BrokerOptions::new()
//!     .with_all_idle(Duration::from_secs(45))
//!     .with_persist_concurrency(4);
//!
//! let from_file = BrokerOptions::from_json(r#"{ "allIdleSecs": 45, "persistConcurrency": 4 }"#)?;
//! assert_eq!(options, from_file);
//! # Ok::<(), mqtt_lifecycle::Error>(())
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::Semaphore;

use crate::error::{Error, Result};
use crate::transport::IdleTimeouts;

// ============================================================================
// Constants
// ============================================================================

/// Default number of session writes allowed in parallel.
pub const DEFAULT_PERSIST_CONCURRENCY: usize = 16;

/// Largest accepted idle threshold (one week).
pub const MAX_IDLE_THRESHOLD: Duration = Duration::from_secs(7 * 24 * 60 * 60);

// ============================================================================
// BrokerOptions
// ============================================================================

/// Per-broker configuration applied to every accepted link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokerOptions {
    /// Idle thresholds.
    pub idle: IdleTimeouts,

    /// Maximum concurrent session writes.
    pub persist_concurrency: usize,
}

impl Default for BrokerOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl BrokerOptions {
    /// Creates options with defaults: all-idle after 90 s, 16 writers.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            idle: IdleTimeouts::all_idle(IdleTimeouts::DEFAULT_ALL_IDLE),
            persist_concurrency: DEFAULT_PERSIST_CONCURRENCY,
        }
    }

    /// Parses options from a JSON document.
    ///
    /// Durations are whole seconds; `0` disables that idle kind. Missing
    /// fields keep their defaults.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the document is malformed
    /// - [`Error::Config`] if the resulting options are invalid
    pub fn from_json(json: &str) -> Result<Self> {
        let document: OptionsDocument = serde_json::from_str(json)?;
        let options = document.apply(Self::new());
        options.validate()?;
        Ok(options)
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl BrokerOptions {
    /// Sets the reader idle threshold.
    #[inline]
    #[must_use]
    pub fn with_reader_idle(mut self, threshold: Duration) -> Self {
        self.idle.reader = Some(threshold);
        self
    }

    /// Sets the writer idle threshold.
    #[inline]
    #[must_use]
    pub fn with_writer_idle(mut self, threshold: Duration) -> Self {
        self.idle.writer = Some(threshold);
        self
    }

    /// Sets the all idle threshold.
    #[inline]
    #[must_use]
    pub fn with_all_idle(mut self, threshold: Duration) -> Self {
        self.idle.all = Some(threshold);
        self
    }

    /// Replaces all idle thresholds at once.
    #[inline]
    #[must_use]
    pub fn with_idle(mut self, idle: IdleTimeouts) -> Self {
        self.idle = idle;
        self
    }

    /// Turns idle detection off.
    #[inline]
    #[must_use]
    pub fn without_idle(mut self) -> Self {
        self.idle = IdleTimeouts::disabled();
        self
    }

    /// Sets the maximum number of concurrent session writes.
    #[inline]
    #[must_use]
    pub fn with_persist_concurrency(mut self, concurrency: usize) -> Self {
        self.persist_concurrency = concurrency;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl BrokerOptions {
    /// Checks the options are usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the concurrency is outside
    /// `1..=Semaphore::MAX_PERMITS`, or if an idle threshold is zero or
    /// above [`MAX_IDLE_THRESHOLD`].
    pub fn validate(&self) -> Result<()> {
        if self.persist_concurrency == 0 {
            return Err(Error::config(
                "persist_concurrency must be at least 1. \
                 Use .with_persist_concurrency(n) with n > 0.",
            ));
        }

        if self.persist_concurrency > Semaphore::MAX_PERMITS {
            return Err(Error::config(format!(
                "persist_concurrency must be at most {}, got {}",
                Semaphore::MAX_PERMITS,
                self.persist_concurrency
            )));
        }

        let thresholds = [
            ("reader", self.idle.reader),
            ("writer", self.idle.writer),
            ("all", self.idle.all),
        ];
        for (name, threshold) in thresholds {
            if threshold.is_some_and(|t| t.is_zero()) {
                return Err(Error::config(format!(
                    "{name} idle threshold must be non-zero. \
                     Use .without_idle() or leave it unset to disable it."
                )));
            }

            if let Some(t) = threshold
                && t > MAX_IDLE_THRESHOLD
            {
                return Err(Error::config(format!(
                    "{name} idle threshold must be at most {} seconds, got {}",
                    MAX_IDLE_THRESHOLD.as_secs(),
                    t.as_secs()
                )));
            }
        }

        Ok(())
    }
}

// ============================================================================
// OptionsDocument
// ============================================================================

/// JSON shape accepted by [`BrokerOptions::from_json`].
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct OptionsDocument {
    reader_idle_secs: Option<u64>,
    writer_idle_secs: Option<u64>,
    all_idle_secs: Option<u64>,
    persist_concurrency: Option<usize>,
}

impl OptionsDocument {
    /// Overlays the document on `base`.
    fn apply(self, mut base: BrokerOptions) -> BrokerOptions {
        let secs = |value: u64| (value > 0).then(|| Duration::from_secs(value));

        if let Some(value) = self.reader_idle_secs {
            base.idle.reader = secs(value);
        }
        if let Some(value) = self.writer_idle_secs {
            base.idle.writer = secs(value);
        }
        if let Some(value) = self.all_idle_secs {
            base.idle.all = secs(value);
        }
        if let Some(value) = self.persist_concurrency {
            base.persist_concurrency = value;
        }
        base
    }
}

// ============================================================================
// Tests
// ============================================================================
