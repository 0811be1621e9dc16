//! Worker configuration and its validation error.

use std::error::Error;
use std::fmt;
use std::time::Duration;

// ── WorkerConfig ───────────────────────────────────────────────────

/// Timing configuration for [`SimWorker`](crate::SimWorker).
///
/// Defaults suit interactive use; tests override them to shrink
/// timeouts.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Hard upper bound on waiting for an access grant when the caller
    /// supplied no deadline. Exceeding it is a fatal
    /// [`AccessError::HardTimeout`](vivarium_core::AccessError::HardTimeout).
    /// Default: 5000 ms.
    pub hard_access_timeout: Duration,
    /// Minimum interval between monitor snapshot refreshes.
    /// Default: 30 ms.
    pub monitor_refresh: Duration,
    /// Soft deadline used by frame-rate-bound operations such as
    /// [`try_region_data`](crate::SimWorker::try_region_data).
    /// Default: 30 ms.
    pub frame_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            hard_access_timeout: Duration::from_millis(5000),
            monitor_refresh: Duration::from_millis(30),
            frame_timeout: Duration::from_millis(30),
        }
    }
}

impl WorkerConfig {
    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hard_access_timeout.is_zero() {
            return Err(ConfigError::ZeroAccessTimeout);
        }
        Ok(())
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`WorkerConfig::validate()`] or worker
/// construction.
#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// `hard_access_timeout` is zero; every guarded operation would
    /// fail immediately.
    ZeroAccessTimeout,
    /// The loop thread could not be spawned.
    ThreadSpawnFailed {
        /// Description of the spawn failure.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroAccessTimeout => write!(f, "hard_access_timeout must be non-zero"),
            Self::ThreadSpawnFailed { reason } => write!(f, "thread spawn failed: {reason}"),
        }
    }
}

impl Error for ConfigError {}
