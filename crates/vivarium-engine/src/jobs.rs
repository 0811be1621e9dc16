//! Pending job store: coalescing configuration slots and the ordered
//! point-effect queue.
//!
//! Callers write here without ever waiting on the loop's timestep
//! computation. Each configuration setting has one optional slot with
//! last-write-wins semantics: a value written before the next drain
//! replaces, never queues behind, the previous one. Point effects are
//! different — they accumulate in strict submission order on an
//! unbounded channel and every drain applies and clears them all.

use std::sync::Mutex;

use crossbeam_channel::{Receiver, Sender};

use vivarium_core::{
    AcceleratorConfig, ComputeEngine, EngineError, FlowFieldConfig, ForceJob, ParameterSpots,
    SimulationParameters,
};

#[derive(Debug, Default)]
struct Slots {
    parameters: Option<SimulationParameters>,
    spots: Option<ParameterSpots>,
    accelerator: Option<AcceleratorConfig>,
    flow_field: Option<FlowFieldConfig>,
}

/// The store itself. Shared between caller threads (writers) and the
/// loop thread (the only drainer).
#[derive(Debug)]
pub(crate) struct PendingJobs {
    slots: Mutex<Slots>,
    force_tx: Sender<ForceJob>,
    force_rx: Receiver<ForceJob>,
}

impl PendingJobs {
    pub fn new() -> Self {
        let (force_tx, force_rx) = crossbeam_channel::unbounded();
        Self {
            slots: Mutex::new(Slots::default()),
            force_tx,
            force_rx,
        }
    }

    pub fn set_parameters(&self, parameters: SimulationParameters) {
        self.lock_slots().parameters = Some(parameters);
    }

    pub fn set_parameter_spots(&self, spots: ParameterSpots) {
        self.lock_slots().spots = Some(spots);
    }

    pub fn set_accelerator_config(&self, config: AcceleratorConfig) {
        self.lock_slots().accelerator = Some(config);
    }

    pub fn set_flow_field(&self, config: FlowFieldConfig) {
        self.lock_slots().flow_field = Some(config);
    }

    pub fn push_force(&self, job: ForceJob) {
        // The channel is unbounded and we hold both ends, so send
        // cannot fail.
        let _ = self.force_tx.send(job);
    }

    /// Whether any slot or queued effect awaits the next drain. The
    /// loop checks this before parking so a submission that lands
    /// between its wake and its wait is not stranded until the next
    /// wakeup.
    pub fn has_pending(&self) -> bool {
        if !self.force_rx.is_empty() {
            return true;
        }
        let slots = self.lock_slots();
        slots.parameters.is_some()
            || slots.spots.is_some()
            || slots.accelerator.is_some()
            || slots.flow_field.is_some()
    }

    /// Apply and clear every pending job. Loop thread only.
    ///
    /// Slots are taken atomically under the store mutex, then applied
    /// outside it; the point-effect queue is applied in submission
    /// order and fully emptied. The first engine error aborts the
    /// drain and is propagated (the session is terminal at that point).
    pub fn drain(&self, engine: &mut dyn ComputeEngine) -> Result<(), EngineError> {
        let taken = std::mem::take(&mut *self.lock_slots());

        if let Some(parameters) = taken.parameters {
            engine.set_parameters(parameters);
        }
        if let Some(spots) = taken.spots {
            engine.set_parameter_spots(spots);
        }
        if let Some(accelerator) = taken.accelerator {
            engine.set_accelerator_config(accelerator);
        }
        if let Some(flow_field) = taken.flow_field {
            engine.set_flow_field(flow_field);
        }

        while let Ok(job) = self.force_rx.try_recv() {
            engine.apply_force(&job)?;
        }
        Ok(())
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, Slots> {
        self.slots.lock().expect("job store poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use vivarium_core::Vec2;
    use vivarium_test_utils::MockEngine;

    fn force(magnitude: f32) -> ForceJob {
        ForceJob {
            start: Vec2::new(0.0, 0.0),
            end: Vec2::new(1.0, 1.0),
            force: Vec2::new(magnitude, 0.0),
            radius: 1.0,
        }
    }

    #[test]
    fn slot_write_coalesces_to_last_value() {
        let jobs = PendingJobs::new();
        let mut engine = MockEngine::new();
        let probe = engine.probe();

        for friction in [0.1, 0.2, 0.3] {
            jobs.set_parameters(SimulationParameters {
                friction,
                ..SimulationParameters::default()
            });
        }
        jobs.drain(&mut engine).unwrap();

        let applied = probe.applied_parameters.lock().unwrap();
        assert_eq!(applied.len(), 1, "only the last write may be applied");
        assert_eq!(applied[0].friction, 0.3);
    }

    #[test]
    fn has_pending_tracks_slots_and_queue() {
        let jobs = PendingJobs::new();
        let mut engine = MockEngine::new();
        assert!(!jobs.has_pending());

        jobs.set_parameters(SimulationParameters::default());
        assert!(jobs.has_pending());
        jobs.drain(&mut engine).unwrap();
        assert!(!jobs.has_pending());

        jobs.push_force(force(1.0));
        assert!(jobs.has_pending());
        jobs.drain(&mut engine).unwrap();
        assert!(!jobs.has_pending());
    }

    #[test]
    fn drain_clears_all_slots() {
        let jobs = PendingJobs::new();
        let mut engine = MockEngine::new();
        let probe = engine.probe();

        jobs.set_parameters(SimulationParameters::default());
        jobs.set_accelerator_config(AcceleratorConfig::default());
        jobs.drain(&mut engine).unwrap();
        jobs.drain(&mut engine).unwrap();

        assert_eq!(probe.applied_parameters.lock().unwrap().len(), 1);
        assert_eq!(probe.applied_accelerator.lock().unwrap().len(), 1);
    }

    #[test]
    fn forces_apply_in_submission_order_and_queue_empties() {
        let jobs = PendingJobs::new();
        let mut engine = MockEngine::new();
        let probe = engine.probe();

        for i in 0..5 {
            jobs.push_force(force(i as f32));
        }
        jobs.drain(&mut engine).unwrap();

        {
            let applied = probe.applied_forces.lock().unwrap();
            let magnitudes: Vec<f32> = applied.iter().map(|j| j.force.x).collect();
            assert_eq!(magnitudes, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        }

        // Queue must be empty immediately after a drain.
        jobs.drain(&mut engine).unwrap();
        assert_eq!(probe.applied_forces.lock().unwrap().len(), 5);
    }

    proptest! {
        #[test]
        fn coalescing_law(frictions in proptest::collection::vec(0.0f32..10.0, 1..20)) {
            let jobs = PendingJobs::new();
            let mut engine = MockEngine::new();
            let probe = engine.probe();

            for &friction in &frictions {
                jobs.set_parameters(SimulationParameters {
                    friction,
                    ..SimulationParameters::default()
                });
            }
            jobs.drain(&mut engine).unwrap();

            let applied = probe.applied_parameters.lock().unwrap();
            prop_assert_eq!(applied.len(), 1);
            prop_assert_eq!(applied[0].friction, *frictions.last().unwrap());
        }

        #[test]
        fn ordering_law(magnitudes in proptest::collection::vec(-100.0f32..100.0, 0..32)) {
            let jobs = PendingJobs::new();
            let mut engine = MockEngine::new();
            let probe = engine.probe();

            for &m in &magnitudes {
                jobs.push_force(force(m));
            }
            jobs.drain(&mut engine).unwrap();

            let applied = probe.applied_forces.lock().unwrap();
            let got: Vec<f32> = applied.iter().map(|j| j.force.x).collect();
            prop_assert_eq!(got, magnitudes);
        }
    }
}
