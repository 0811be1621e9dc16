//! Lock-free monitoring snapshot.
//!
//! The loop thread (or a caller inside a guarded window) batches the
//! engine's aggregate statistics into a set of independently-updated
//! atomics at a bounded refresh rate; any thread reads them at any time
//! without locking. Fields are each current as of their own last
//! refresh, not transactionally consistent with one another — they are
//! advisory statistics, never state used for correctness.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use vivarium_core::{ComputeEngine, SimStatistics};

/// Atomic cell holding the most recently refreshed statistics.
#[derive(Debug, Default)]
pub(crate) struct MonitorCell {
    time_step: AtomicU64,
    num_cells: AtomicU64,
    num_particles: AtomicU64,
    num_tokens: AtomicU64,
    /// f64 bits.
    total_internal_energy: AtomicU64,
    num_created_cells: AtomicU64,
    num_successful_attacks: AtomicU64,
    num_failed_attacks: AtomicU64,
    num_muscle_activities: AtomicU64,
    /// Writers are serialized by the access protocol; the mutex is
    /// held only for the timestamp read-modify-write.
    last_refresh: Mutex<Option<Instant>>,
}

impl MonitorCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pull current statistics from the engine if `interval` has
    /// elapsed since the previous refresh (or none has happened yet).
    pub fn refresh(&self, engine: &dyn ComputeEngine, interval: Duration) {
        {
            let mut last = self.last_refresh.lock().expect("monitor mutex poisoned");
            match *last {
                Some(at) if at.elapsed() <= interval => return,
                _ => *last = Some(Instant::now()),
            }
        }
        let stats = engine.statistics();
        self.time_step.store(stats.time_step, Ordering::Release);
        self.num_cells.store(stats.num_cells, Ordering::Release);
        self.num_particles.store(stats.num_particles, Ordering::Release);
        self.num_tokens.store(stats.num_tokens, Ordering::Release);
        self.total_internal_energy
            .store(stats.total_internal_energy.to_bits(), Ordering::Release);
        self.num_created_cells
            .store(stats.num_created_cells, Ordering::Release);
        self.num_successful_attacks
            .store(stats.num_successful_attacks, Ordering::Release);
        self.num_failed_attacks
            .store(stats.num_failed_attacks, Ordering::Release);
        self.num_muscle_activities
            .store(stats.num_muscle_activities, Ordering::Release);
    }

    /// Lock-free read of the snapshot.
    pub fn read(&self) -> SimStatistics {
        SimStatistics {
            time_step: self.time_step.load(Ordering::Acquire),
            num_cells: self.num_cells.load(Ordering::Acquire),
            num_particles: self.num_particles.load(Ordering::Acquire),
            num_tokens: self.num_tokens.load(Ordering::Acquire),
            total_internal_energy: f64::from_bits(
                self.total_internal_energy.load(Ordering::Acquire),
            ),
            num_created_cells: self.num_created_cells.load(Ordering::Acquire),
            num_successful_attacks: self.num_successful_attacks.load(Ordering::Acquire),
            num_failed_attacks: self.num_failed_attacks.load(Ordering::Acquire),
            num_muscle_activities: self.num_muscle_activities.load(Ordering::Acquire),
        }
    }
}
