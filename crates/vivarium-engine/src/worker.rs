//! User-facing `SimWorker` API.
//!
//! The worker owns a dedicated loop thread that advances the compute
//! engine at a throttled rate, while caller threads (typically a
//! rendering/GUI thread) observe and mutate the shared state through
//! guarded operations, coalescing job slots, and the lock-free monitor.
//!
//! # Architecture
//!
//! ```text
//! Caller Thread(s)               Loop Thread
//!     |                              |
//!     |--set_*_async()-------------->| jobs.drain() each iteration
//!     |   [coalescing slots]         |
//!     |--apply_force_async()-------->| applied in submission order
//!     |                              |
//!     |--region_data()/set_data()    | access flag: Requested
//!     |   guard waits for grant ---->| grant, spin until Free
//!     |   exclusive engine access    |
//!     |   guard drop: Free --------->| resume stepping
//!     |                              |
//!     |--monitor_data()              | monitor.refresh() every 30 ms
//!     |   lock-free atomic reads     | engine.step() + throttle
//! ```

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use vivarium_core::{
    AcceleratorConfig, AccessError, AreaSelection, ComputeEngine, EntityChange, EntityCounts,
    FlowFieldConfig, ForceJob, ParameterSpots, SelectionSummary, SimStatistics,
    SimulationParameters, TransferBuffer, Vec2, WorldData, WorldRect,
};

use crate::config::{ConfigError, WorkerConfig};
use crate::context::{access, RunState, WorkerContext};
use crate::guard::AccessGuard;
use crate::loop_thread::LoopState;

/// Handle to a simulation session: one loop thread plus the shared
/// state callers go through to reach it.
///
/// A fault on the loop thread permanently fails the session; every
/// subsequent guarded operation returns the stored fault. Create a new
/// `SimWorker` to resume (which also starts with a clean fault channel
/// and a fresh TPS gauge).
pub struct SimWorker {
    ctx: Arc<WorkerContext>,
    thread: Option<JoinHandle<()>>,
}

impl SimWorker {
    /// Create a session around `engine` and spawn the loop thread.
    /// The loop starts in the stopped state; call [`run`](Self::run)
    /// to begin advancing timesteps.
    pub fn new(engine: Box<dyn ComputeEngine>, config: WorkerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let ctx = Arc::new(WorkerContext::new(engine, config));
        let loop_ctx = Arc::clone(&ctx);
        let thread = thread::Builder::new()
            .name("vivarium-loop".into())
            .spawn(move || LoopState::new(loop_ctx).run())
            .map_err(|e| ConfigError::ThreadSpawnFailed {
                reason: e.to_string(),
            })?;
        Ok(Self {
            ctx,
            thread: Some(thread),
        })
    }

    // ── Run control ────────────────────────────────────────────────

    /// Start advancing timesteps.
    pub fn run(&self) {
        let mut run = self.ctx.run.lock().expect("run state poisoned");
        if *run == RunState::Stopped {
            *run = RunState::Running;
        }
        self.ctx.worker_cv.notify_all();
    }

    /// Stop advancing timesteps. Guarded, so the in-flight timestep
    /// completes before this returns.
    pub fn pause(&self) -> Result<(), AccessError> {
        let _access = AccessGuard::acquire(&self.ctx, None)?;
        let mut run = self.ctx.run.lock().expect("run state poisoned");
        if *run == RunState::Running {
            *run = RunState::Stopped;
        }
        Ok(())
    }

    /// Whether the loop is currently advancing timesteps.
    pub fn is_running(&self) -> bool {
        self.ctx.run_state() == RunState::Running
    }

    /// Force exactly one timestep, regardless of run state.
    pub fn calc_single_timestep(&self) -> Result<(), AccessError> {
        let mut access = AccessGuard::acquire(&self.ctx, None)?;
        let engine = access.engine()?;
        engine.step()?;
        self.ctx
            .monitor
            .refresh(&*engine, self.ctx.config.monitor_refresh);
        Ok(())
    }

    /// Current timestep index.
    pub fn current_timestep(&self) -> Result<u64, AccessError> {
        let mut access = AccessGuard::acquire(&self.ctx, None)?;
        Ok(access.engine()?.current_timestep())
    }

    /// Overwrite the timestep index.
    pub fn set_current_timestep(&self, value: u64) -> Result<(), AccessError> {
        let mut access = AccessGuard::acquire(&self.ctx, None)?;
        access.engine()?.set_current_timestep(value);
        Ok(())
    }

    // ── Coalescing configuration jobs ──────────────────────────────

    /// Replace the global simulation parameters at the next drain.
    /// Non-blocking; a newer value overwrites an undrained older one.
    pub fn set_parameters_async(&self, parameters: SimulationParameters) {
        self.ctx.jobs.set_parameters(parameters);
        self.ctx.wake_worker();
    }

    /// Replace the spatial parameter overrides at the next drain.
    pub fn set_parameter_spots_async(&self, spots: ParameterSpots) {
        self.ctx.jobs.set_parameter_spots(spots);
        self.ctx.wake_worker();
    }

    /// Replace the accelerator tuning constants at the next drain.
    pub fn set_accelerator_config_async(&self, config: AcceleratorConfig) {
        self.ctx.jobs.set_accelerator_config(config);
        self.ctx.wake_worker();
    }

    /// Replace the flow field configuration at the next drain.
    pub fn set_flow_field_async(&self, config: FlowFieldConfig) {
        self.ctx.jobs.set_flow_field(config);
        self.ctx.wake_worker();
    }

    /// Queue a point effect. Non-blocking; effects are applied in
    /// submission order at the next drain.
    pub fn apply_force_async(&self, start: Vec2, end: Vec2, force: Vec2, radius: f32) {
        self.ctx.jobs.push_force(ForceJob {
            start,
            end,
            force,
            radius,
        });
        self.ctx.wake_worker();
    }

    // ── Monitoring and rate control ────────────────────────────────

    /// Lock-free read of the monitor snapshot.
    pub fn monitor_data(&self) -> SimStatistics {
        self.ctx.monitor.read()
    }

    /// Measured timesteps per second. 0 while paused.
    pub fn tps(&self) -> f32 {
        self.ctx.tps.rate()
    }

    /// Current rate cap in Hz. 0 = unlimited.
    pub fn tps_restriction(&self) -> u32 {
        self.ctx.tps.restriction()
    }

    /// Set the rate cap in Hz. 0 = unlimited.
    pub fn set_tps_restriction(&self, hz: u32) {
        self.ctx.tps.set_restriction(hz);
    }

    // ── Guarded data operations ────────────────────────────────────

    /// Read all entities intersecting `region`.
    pub fn region_data(&self, region: WorldRect) -> Result<WorldData, AccessError> {
        let mut access = AccessGuard::acquire(&self.ctx, None)?;
        let engine = access.engine()?;
        self.read_region_with(engine, region)
    }

    /// Frame-rate-bound variant of [`region_data`](Self::region_data):
    /// waits at most the configured frame timeout and returns
    /// `Ok(None)` if the loop did not grant access in time. The caller
    /// skips this frame's work and may retry on the next one.
    pub fn try_region_data(&self, region: WorldRect) -> Result<Option<WorldData>, AccessError> {
        let mut access =
            AccessGuard::acquire(&self.ctx, Some(self.ctx.config.frame_timeout))?;
        if access.is_timeout() {
            return Ok(None);
        }
        let engine = access.engine()?;
        self.read_region_with(engine, region).map(Some)
    }

    /// Read the currently selected entities.
    pub fn selected_data(&self, include_clusters: bool) -> Result<WorldData, AccessError> {
        let mut access = AccessGuard::acquire(&self.ctx, None)?;
        let engine = access.engine()?;
        let mut buffer = self.acquire_buffer(engine.entity_counts());
        match engine.read_selected(include_clusters, &mut buffer) {
            Ok(()) => {
                let data = Self::take_data(&mut buffer);
                self.release_buffer(buffer);
                Ok(data)
            }
            Err(e) => {
                self.release_buffer(buffer);
                Err(e.into())
            }
        }
    }

    /// Replace the world contents with `data`.
    pub fn set_data(&self, data: &WorldData) -> Result<(), AccessError> {
        self.write_data_impl(data, true, false)
    }

    /// Add `data` to the world and select the added entities.
    pub fn add_and_select_data(&self, data: &WorldData) -> Result<(), AccessError> {
        self.write_data_impl(data, false, true)
    }

    /// Apply a single-entity edit.
    pub fn change_entity(&self, change: EntityChange) -> Result<(), AccessError> {
        let mut access = AccessGuard::acquire(&self.ctx, None)?;
        access.engine()?.change_entity(&change)?;
        Ok(())
    }

    /// Delete the selected entities.
    pub fn remove_selected_entities(&self, include_clusters: bool) -> Result<(), AccessError> {
        let mut access = AccessGuard::acquire(&self.ctx, None)?;
        let engine = access.engine()?;
        engine.remove_selected(include_clusters)?;
        self.ctx
            .monitor
            .refresh(&*engine, self.ctx.config.monitor_refresh);
        Ok(())
    }

    /// Remove all entities.
    pub fn clear(&self) -> Result<(), AccessError> {
        let mut access = AccessGuard::acquire(&self.ctx, None)?;
        access.engine()?.clear()?;
        Ok(())
    }

    // ── Guarded selection operations ───────────────────────────────

    /// Toggle selection of the entity nearest `pos` within `radius`.
    pub fn switch_selection(&self, pos: Vec2, radius: f32) -> Result<(), AccessError> {
        let mut access = AccessGuard::acquire(&self.ctx, None)?;
        access.engine()?.switch_selection(pos, radius);
        Ok(())
    }

    /// Select all entities within an area.
    pub fn set_selection(&self, area: AreaSelection) -> Result<(), AccessError> {
        let mut access = AccessGuard::acquire(&self.ctx, None)?;
        access.engine()?.set_selection(area);
        Ok(())
    }

    /// Clear the selection.
    pub fn remove_selection(&self) -> Result<(), AccessError> {
        let mut access = AccessGuard::acquire(&self.ctx, None)?;
        access.engine()?.remove_selection();
        Ok(())
    }

    /// Re-derive the selection after entity data changed.
    pub fn update_selection(&self) -> Result<(), AccessError> {
        let mut access = AccessGuard::acquire(&self.ctx, None)?;
        access.engine()?.update_selection();
        Ok(())
    }

    /// Shallow summary of the current selection.
    pub fn selection_summary(&self) -> Result<SelectionSummary, AccessError> {
        let mut access = AccessGuard::acquire(&self.ctx, None)?;
        Ok(access.engine()?.selection_summary())
    }

    // ── Shutdown ───────────────────────────────────────────────────

    /// First phase of teardown: flag the loop to exit and wake it.
    /// Non-blocking.
    pub fn begin_shutdown(&self) {
        let mut run = self.ctx.run.lock().expect("run state poisoned");
        *run = RunState::ShuttingDown;
        self.ctx.worker_cv.notify_all();
    }

    /// Second phase of teardown: join the loop thread and release the
    /// compute capability. Call after [`begin_shutdown`](Self::begin_shutdown).
    pub fn end_shutdown(&mut self) {
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                log::warn!("worker loop thread panicked during shutdown");
            }
        }
        *self.ctx.run.lock().expect("run state poisoned") = RunState::Stopped;
        self.ctx
            .access
            .store(access::FREE, std::sync::atomic::Ordering::Release);
        *self.ctx.engine.lock().expect("engine mutex poisoned") = None;
    }

    // ── Internals ──────────────────────────────────────────────────

    fn read_region_with(
        &self,
        engine: &mut dyn ComputeEngine,
        region: WorldRect,
    ) -> Result<WorldData, AccessError> {
        let mut buffer = self.acquire_buffer(engine.entity_counts());
        match engine.read_region(region, &mut buffer) {
            Ok(()) => {
                let data = Self::take_data(&mut buffer);
                self.release_buffer(buffer);
                Ok(data)
            }
            Err(e) => {
                self.release_buffer(buffer);
                Err(e.into())
            }
        }
    }

    fn write_data_impl(
        &self,
        data: &WorldData,
        replace: bool,
        select_new: bool,
    ) -> Result<(), AccessError> {
        let counts = data.counts();
        let mut access = AccessGuard::acquire(&self.ctx, None)?;
        let engine = access.engine()?;
        engine.resize_if_necessary(counts)?;

        let mut buffer = self.acquire_buffer(counts);
        buffer.cells.extend_from_slice(&data.cells);
        buffer.particles.extend_from_slice(&data.particles);
        let result = if replace {
            match engine.clear() {
                Ok(()) => engine.write_data(&buffer, select_new),
                Err(e) => Err(e),
            }
        } else {
            engine.write_data(&buffer, select_new)
        };
        self.release_buffer(buffer);
        result?;

        self.ctx
            .monitor
            .refresh(&*engine, self.ctx.config.monitor_refresh);
        Ok(())
    }

    fn acquire_buffer(&self, counts: EntityCounts) -> TransferBuffer {
        self.ctx
            .pool
            .lock()
            .expect("buffer pool poisoned")
            .acquire(counts)
    }

    fn release_buffer(&self, buffer: TransferBuffer) {
        self.ctx
            .pool
            .lock()
            .expect("buffer pool poisoned")
            .release(buffer);
    }

    fn take_data(buffer: &mut TransferBuffer) -> WorldData {
        WorldData {
            cells: buffer.cells.drain(..).collect(),
            particles: buffer.particles.drain(..).collect(),
        }
    }
}

impl Drop for SimWorker {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.begin_shutdown();
            self.end_shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vivarium_core::Cell;
    use vivarium_test_utils::MockEngine;

    fn cell(id: u64, x: f32, y: f32) -> Cell {
        Cell {
            id,
            pos: Vec2::new(x, y),
            energy: 100.0,
            ..Cell::default()
        }
    }

    fn whole_world() -> WorldRect {
        WorldRect {
            top_left: Vec2::new(-1000.0, -1000.0),
            bottom_right: Vec2::new(1000.0, 1000.0),
        }
    }

    #[test]
    fn stopped_worker_grants_access_immediately() {
        let worker =
            SimWorker::new(Box::new(MockEngine::new()), WorkerConfig::default()).unwrap();
        // No loop thread is mutating state: the guarded read returns
        // without any handoff, and the access flag stays untouched.
        let data = worker.region_data(whole_world()).unwrap();
        assert!(data.cells.is_empty());
        assert_eq!(
            worker.ctx.access.load(std::sync::atomic::Ordering::Acquire),
            access::FREE
        );
    }

    #[test]
    fn data_roundtrip_while_stopped() {
        let worker =
            SimWorker::new(Box::new(MockEngine::new()), WorkerConfig::default()).unwrap();
        let data = WorldData {
            cells: vec![cell(1, 1.0, 1.0), cell(2, 2.0, 2.0)],
            particles: vec![],
        };
        worker.set_data(&data).unwrap();
        let read = worker.region_data(whole_world()).unwrap();
        assert_eq!(read.cells.len(), 2);
    }

    #[test]
    fn set_data_replaces_previous_contents() {
        let worker =
            SimWorker::new(Box::new(MockEngine::new()), WorkerConfig::default()).unwrap();
        worker
            .set_data(&WorldData {
                cells: vec![cell(1, 0.0, 0.0)],
                particles: vec![],
            })
            .unwrap();
        worker
            .set_data(&WorldData {
                cells: vec![cell(2, 0.0, 0.0)],
                particles: vec![],
            })
            .unwrap();
        let read = worker.region_data(whole_world()).unwrap();
        assert_eq!(read.cells.len(), 1);
        assert_eq!(read.cells[0].id, 2);
    }

    #[test]
    fn calc_single_timestep_advances_once() {
        let engine = MockEngine::new();
        let probe = engine.probe();
        let worker = SimWorker::new(Box::new(engine), WorkerConfig::default()).unwrap();
        worker.calc_single_timestep().unwrap();
        assert_eq!(probe.steps(), 1);
        assert_eq!(worker.current_timestep().unwrap(), 1);
    }

    #[test]
    fn caller_thread_engine_error_does_not_kill_session() {
        let worker =
            SimWorker::new(Box::new(MockEngine::new()), WorkerConfig::default()).unwrap();
        // Editing an unknown entity fails on the caller thread...
        let err = worker.change_entity(EntityChange::Cell(cell(42, 0.0, 0.0)));
        assert!(matches!(err, Err(AccessError::SimulationFault { .. })));
        // ...but the session stays usable: the guard released and the
        // fault channel was not involved.
        worker.calc_single_timestep().unwrap();
    }

    #[test]
    fn selection_ops_compose() {
        let worker =
            SimWorker::new(Box::new(MockEngine::new()), WorkerConfig::default()).unwrap();
        worker
            .add_and_select_data(&WorldData {
                cells: vec![cell(1, 1.0, 1.0), cell(2, 5.0, 5.0)],
                particles: vec![],
            })
            .unwrap();
        assert_eq!(worker.selection_summary().unwrap().num_cells, 2);

        worker.remove_selection().unwrap();
        assert_eq!(worker.selection_summary().unwrap().num_cells, 0);

        worker
            .set_selection(AreaSelection {
                start: Vec2::new(0.0, 0.0),
                end: Vec2::new(2.0, 2.0),
            })
            .unwrap();
        worker.remove_selected_entities(false).unwrap();
        let read = worker.region_data(whole_world()).unwrap();
        assert_eq!(read.cells.len(), 1);
        assert_eq!(read.cells[0].id, 2);
    }

    #[test]
    fn shutdown_releases_engine_and_later_ops_fail() {
        let mut worker =
            SimWorker::new(Box::new(MockEngine::new()), WorkerConfig::default()).unwrap();
        worker.begin_shutdown();
        worker.end_shutdown();
        assert_eq!(
            worker.region_data(whole_world()),
            Err(AccessError::NoSession)
        );
    }

    #[test]
    fn drop_shuts_down_cleanly() {
        let worker =
            SimWorker::new(Box::new(MockEngine::new()), WorkerConfig::default()).unwrap();
        worker.run();
        std::thread::sleep(std::time::Duration::from_millis(20));
        drop(worker);
        // If this doesn't hang, the two-phase teardown worked.
    }
}
