//! Timeout scheduler configuration.
//!
//! Defines the bounds and tuning parameters for the adaptive timeout
//! estimate and the dispatch loop's wake resolution.

use std::time::Duration;

/// Configuration for the adaptive timeout scheduler.
///
/// All durations are in milliseconds.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Starting value of the adaptive timeout estimate.
    /// Default: 1000 (1 second).
    pub initial_timeout_ms: u64,

    /// Floor below which the estimate never decays, no matter how many
    /// requests complete quickly.
    /// Default: 500.
    pub min_timeout_ms: u64,

    /// Ceiling above which the estimate never grows, no matter how many
    /// requests time out.
    /// Default: 10_000.
    pub max_timeout_ms: u64,

    /// Multiplicative growth applied to the estimate when a request times
    /// out. Must be > 1.
    /// Default: 2.0.
    pub backoff_factor: f64,

    /// Minimum resolution at which the dispatch loop wakes to check for
    /// expirations. Near-simultaneous deadlines coalesce into one wake.
    /// Default: 1.
    pub granularity_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            initial_timeout_ms: 1_000,
            min_timeout_ms: 500,
            max_timeout_ms: 10_000,
            backoff_factor: 2.0,
            granularity_ms: 1,
        }
    }
}

impl TimeoutConfig {
    /// The starting estimate as a [`Duration`].
    pub fn initial_timeout(&self) -> Duration {
        Duration::from_millis(self.initial_timeout_ms)
    }

    /// The estimate floor as a [`Duration`].
    pub fn min_timeout(&self) -> Duration {
        Duration::from_millis(self.min_timeout_ms)
    }

    /// The estimate ceiling as a [`Duration`].
    pub fn max_timeout(&self) -> Duration {
        Duration::from_millis(self.max_timeout_ms)
    }

    /// The dispatch wake resolution as a [`Duration`].
    pub fn granularity(&self) -> Duration {
        Duration::from_millis(self.granularity_ms)
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_timeout_ms > self.max_timeout_ms {
            return Err(ConfigError::InvalidBounds {
                min_ms: self.min_timeout_ms,
                max_ms: self.max_timeout_ms,
            });
        }
        if self.initial_timeout_ms < self.min_timeout_ms
            || self.initial_timeout_ms > self.max_timeout_ms
        {
            return Err(ConfigError::InitialOutOfBounds {
                initial_ms: self.initial_timeout_ms,
                min_ms: self.min_timeout_ms,
                max_ms: self.max_timeout_ms,
            });
        }
        if !(self.backoff_factor > 1.0) {
            return Err(ConfigError::InvalidBackoffFactor(self.backoff_factor));
        }
        if self.granularity_ms == 0 {
            return Err(ConfigError::InvalidGranularity);
        }
        Ok(())
    }

    /// Create a config suitable for local testing with short timeouts.
    #[cfg(any(test, feature = "dev-context-only-utils"))]
    pub fn dev_default() -> Self {
        Self {
            initial_timeout_ms: 50,
            min_timeout_ms: 10,
            max_timeout_ms: 500,
            backoff_factor: 2.0,
            granularity_ms: 1,
        }
    }
}

/// Errors in timeout scheduler configuration.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("timeout bounds invalid: min {min_ms}ms > max {max_ms}ms")]
    InvalidBounds { min_ms: u64, max_ms: u64 },
    #[error("initial_timeout_ms {initial_ms} outside [{min_ms}, {max_ms}]")]
    InitialOutOfBounds {
        initial_ms: u64,
        min_ms: u64,
        max_ms: u64,
    },
    #[error("backoff_factor must be > 1, got {0}")]
    InvalidBackoffFactor(f64),
    #[error("granularity_ms must be > 0")]
    InvalidGranularity,
}
