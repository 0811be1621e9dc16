//! Timesteps-per-second measurement and rate restriction.
//!
//! The gauge separates the shared, lock-free side (measured rate and
//! the caller-settable restriction, both atomics) from the loop-private
//! measurement window, which lives in the loop state and feeds
//! [`measured_tps`] once per elapsed window.

use std::sync::atomic::{AtomicU32, Ordering};

/// Minimum measurement window before a rate is computed, in ms.
pub(crate) const MEASUREMENT_WINDOW_MS: u64 = 200;

/// Windows shorter than this are extrapolated; longer ones fall back to
/// a per-window rate, in ms.
const FULL_WINDOW_MS: u64 = 350;

/// Rate computed from one measurement window, or `None` if the window
/// has not elapsed yet.
///
/// Sub-full windows extrapolate as `steps * 5 * 200 / elapsed_ms`,
/// correcting for sampling less than a full second; beyond 350 ms the
/// loop is stepping slower than the window and the rate degenerates to
/// `1000 / elapsed_ms`.
pub(crate) fn measured_tps(elapsed_ms: u64, steps: u64) -> Option<f32> {
    if elapsed_ms < MEASUREMENT_WINDOW_MS {
        return None;
    }
    if elapsed_ms < FULL_WINDOW_MS {
        Some(steps as f32 * 5.0 * 200.0 / elapsed_ms as f32)
    } else {
        Some(1000.0 / elapsed_ms as f32)
    }
}

/// Shared side of the TPS state: measured rate and restriction cap.
///
/// The loop thread is the only writer of the rate; any thread may read
/// it or write the restriction.
#[derive(Debug, Default)]
pub(crate) struct TpsGauge {
    /// Measured rate, f32 bits.
    rate_bits: AtomicU32,
    /// Desired cap in Hz. 0 = unlimited.
    restriction_hz: AtomicU32,
}

impl TpsGauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rate(&self) -> f32 {
        f32::from_bits(self.rate_bits.load(Ordering::Acquire))
    }

    pub fn store_rate(&self, rate: f32) {
        self.rate_bits.store(rate.to_bits(), Ordering::Release);
    }

    pub fn restriction(&self) -> u32 {
        self.restriction_hz.load(Ordering::Acquire)
    }

    pub fn set_restriction(&self, hz: u32) {
        self.restriction_hz.store(hz, Ordering::Release);
    }

    /// Desired spacing between timestep starts for the current
    /// restriction, in microseconds. 0 when unrestricted.
    pub fn desired_spacing_us(&self) -> u64 {
        match self.restriction() {
            0 => 0,
            hz => 1_000_000 / u64::from(hz),
        }
    }
}
