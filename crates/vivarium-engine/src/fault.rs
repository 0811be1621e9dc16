//! Cross-thread fault channel.
//!
//! The worker loop cannot unwind into caller threads, so a fault on the
//! loop thread is recorded here once and re-raised on every subsequent
//! guarded-access attempt. Within a session the slot is never cleared;
//! a fault permanently fails the session and a new worker must be
//! created to resume.

use std::sync::Mutex;

use vivarium_core::AccessError;

/// Mutex-protected optional fault message.
#[derive(Debug, Default)]
pub(crate) struct FaultChannel {
    message: Mutex<Option<String>>,
}

impl FaultChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fault. The first write wins; later writes are ignored.
    pub fn record(&self, message: String) {
        let mut slot = self.message.lock().expect("fault channel poisoned");
        if slot.is_none() {
            *slot = Some(message);
        }
    }

    /// Re-raise the stored fault, if any.
    pub fn check(&self) -> Result<(), AccessError> {
        let slot = self.message.lock().expect("fault channel poisoned");
        match &*slot {
            Some(message) => Err(AccessError::SimulationFault {
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Whether a fault has been recorded.
    #[cfg(test)]
    pub fn is_set(&self) -> bool {
        self.message.lock().expect("fault channel poisoned").is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_channel_checks_clean() {
        let channel = FaultChannel::new();
        assert!(channel.check().is_ok());
        assert!(!channel.is_set());
    }

    #[test]
    fn first_record_wins() {
        let channel = FaultChannel::new();
        channel.record("first".into());
        channel.record("second".into());
        let err = channel.check().unwrap_err();
        assert_eq!(
            err,
            AccessError::SimulationFault {
                message: "first".into()
            }
        );
    }

    #[test]
    fn fault_is_permanent() {
        let channel = FaultChannel::new();
        channel.record("boom".into());
        for _ in 0..3 {
            assert!(channel.check().is_err());
        }
    }
}
