//! Error types for the Vivarium workspace.
//!
//! Organized by subsystem: [`EngineError`] for faults raised by the
//! compute capability, [`AccessError`] for caller-visible failures of
//! the guarded access protocol.

use std::error::Error;
use std::fmt;

/// Faults raised by the compute capability.
///
/// Any of these surfacing on the worker loop thread is terminal for the
/// session: the loop records it in the fault channel and exits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineError {
    /// A kernel or state operation failed.
    ExecutionFailed {
        /// Human-readable description of the failure.
        reason: String,
    },
    /// Accelerator memory could not be grown to the requested size.
    OutOfMemory {
        /// Total number of entities that did not fit.
        requested: usize,
    },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExecutionFailed { reason } => write!(f, "engine execution failed: {reason}"),
            Self::OutOfMemory { requested } => {
                write!(f, "engine out of memory resizing for {requested} entities")
            }
        }
    }
}

impl Error for EngineError {}

/// Caller-visible failures of a guarded access attempt.
///
/// Soft timeouts are *not* represented here: a caller-supplied deadline
/// that elapses is signaled through the guard's timeout flag and the
/// operation's `Ok(None)` result, never as an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccessError {
    /// No caller deadline was supplied and the fixed upper bound elapsed
    /// before the worker loop granted access. The loop is wedged or has
    /// already faulted.
    HardTimeout,
    /// A fault previously captured on the worker loop thread, re-raised
    /// at guard construction. Permanent for the session.
    SimulationFault {
        /// The stored fault message.
        message: String,
    },
    /// No compute engine is attached (the session has been shut down).
    NoSession,
}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HardTimeout => write!(f, "timed out waiting for engine access"),
            Self::SimulationFault { message } => write!(f, "simulation fault: {message}"),
            Self::NoSession => write!(f, "no simulation session"),
        }
    }
}

impl Error for AccessError {}

impl From<EngineError> for AccessError {
    fn from(e: EngineError) -> Self {
        Self::SimulationFault {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        let e = EngineError::ExecutionFailed {
            reason: "kernel launch failed".into(),
        };
        assert_eq!(e.to_string(), "engine execution failed: kernel launch failed");

        let e = EngineError::OutOfMemory { requested: 1024 };
        assert_eq!(e.to_string(), "engine out of memory resizing for 1024 entities");

        let a = AccessError::HardTimeout;
        assert_eq!(a.to_string(), "timed out waiting for engine access");
    }

    #[test]
    fn engine_error_converts_to_fault() {
        let e = EngineError::ExecutionFailed {
            reason: "nan".into(),
        };
        let a: AccessError = e.into();
        assert!(matches!(a, AccessError::SimulationFault { .. }));
    }
}
