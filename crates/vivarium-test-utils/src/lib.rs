//! Test utilities and mock types for Vivarium development.
//!
//! Provides [`MockEngine`], an in-memory implementation of
//! [`ComputeEngine`] with deterministic behavior, failure injection,
//! and an [`EngineProbe`] that tests keep a handle on after the engine
//! has been moved into a worker.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use vivarium_core::{
    AcceleratorConfig, AreaSelection, Cell, ComputeEngine, EntityChange, EntityCounts, EngineError,
    FlowFieldConfig, ForceJob, Particle, ParameterSpots, SelectionSummary, SimStatistics,
    SimulationParameters, TransferBuffer, Vec2, WorldRect,
};

/// Shared inspection window into a [`MockEngine`] that has been moved
/// into a worker thread.
///
/// Counters are atomics; applied settings and jobs are recorded in
/// submission order behind short-held mutexes.
#[derive(Default)]
pub struct EngineProbe {
    steps: AtomicU64,
    pub applied_forces: Mutex<Vec<ForceJob>>,
    pub applied_parameters: Mutex<Vec<SimulationParameters>>,
    pub applied_spots: Mutex<Vec<ParameterSpots>>,
    pub applied_accelerator: Mutex<Vec<AcceleratorConfig>>,
    pub applied_flow_fields: Mutex<Vec<FlowFieldConfig>>,
}

impl EngineProbe {
    /// Number of completed timesteps.
    pub fn steps(&self) -> u64 {
        self.steps.load(Ordering::Acquire)
    }
}

/// Deterministic in-memory [`ComputeEngine`].
///
/// Entities live in plain vectors; `step()` advances the timestep
/// counter and integrates positions. Optional knobs:
///
/// - [`with_fail_after`](MockEngine::with_fail_after) — `step()` fails
///   once the given number of steps has completed.
/// - [`with_step_delay`](MockEngine::with_step_delay) — each `step()`
///   sleeps, simulating an expensive kernel.
pub struct MockEngine {
    probe: Arc<EngineProbe>,
    time_step: u64,
    cells: Vec<Cell>,
    particles: Vec<Particle>,
    selected: HashSet<u64>,
    capacity: EntityCounts,
    created_cells: u64,
    fail_after: Option<u64>,
    step_delay: Option<Duration>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            probe: Arc::new(EngineProbe::default()),
            time_step: 0,
            cells: Vec::new(),
            particles: Vec::new(),
            selected: HashSet::new(),
            capacity: EntityCounts::default(),
            created_cells: 0,
            fail_after: None,
            step_delay: None,
        }
    }

    /// Inject a step failure after `steps` successful steps.
    pub fn with_fail_after(mut self, steps: u64) -> Self {
        self.fail_after = Some(steps);
        self
    }

    /// Make every step sleep for `delay`.
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = Some(delay);
        self
    }

    /// Pre-populate cells.
    pub fn with_cells(mut self, cells: Vec<Cell>) -> Self {
        self.cells = cells;
        self
    }

    /// Pre-populate particles.
    pub fn with_particles(mut self, particles: Vec<Particle>) -> Self {
        self.particles = particles;
        self
    }

    /// Handle to the probe, kept by tests after the engine is moved.
    pub fn probe(&self) -> Arc<EngineProbe> {
        Arc::clone(&self.probe)
    }

    fn contains(rect: WorldRect, pos: Vec2) -> bool {
        pos.x >= rect.top_left.x
            && pos.x <= rect.bottom_right.x
            && pos.y >= rect.top_left.y
            && pos.y <= rect.bottom_right.y
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeEngine for MockEngine {
    fn step(&mut self) -> Result<(), EngineError> {
        if let Some(delay) = self.step_delay {
            std::thread::sleep(delay);
        }
        if let Some(limit) = self.fail_after {
            if self.probe.steps() >= limit {
                return Err(EngineError::ExecutionFailed {
                    reason: format!("injected failure at step {limit}"),
                });
            }
        }
        for cell in &mut self.cells {
            cell.pos.x += cell.vel.x;
            cell.pos.y += cell.vel.y;
        }
        for particle in &mut self.particles {
            particle.pos.x += particle.vel.x;
            particle.pos.y += particle.vel.y;
        }
        self.time_step += 1;
        self.probe.steps.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn current_timestep(&self) -> u64 {
        self.time_step
    }

    fn set_current_timestep(&mut self, value: u64) {
        self.time_step = value;
    }

    fn entity_counts(&self) -> EntityCounts {
        EntityCounts {
            cells: self.cells.len(),
            particles: self.particles.len(),
            tokens: self.cells.iter().map(|c| c.token_count as usize).sum(),
        }
    }

    fn resize_if_necessary(&mut self, counts: EntityCounts) -> Result<(), EngineError> {
        self.capacity = self.capacity.max(self.entity_counts().max(counts));
        Ok(())
    }

    fn read_region(
        &self,
        region: WorldRect,
        buffer: &mut TransferBuffer,
    ) -> Result<(), EngineError> {
        buffer.clear();
        buffer
            .cells
            .extend(self.cells.iter().filter(|c| Self::contains(region, c.pos)).cloned());
        buffer.particles.extend(
            self.particles
                .iter()
                .filter(|p| Self::contains(region, p.pos))
                .cloned(),
        );
        Ok(())
    }

    fn read_selected(
        &self,
        _include_clusters: bool,
        buffer: &mut TransferBuffer,
    ) -> Result<(), EngineError> {
        buffer.clear();
        buffer
            .cells
            .extend(self.cells.iter().filter(|c| self.selected.contains(&c.id)).cloned());
        buffer.particles.extend(
            self.particles
                .iter()
                .filter(|p| self.selected.contains(&p.id))
                .cloned(),
        );
        Ok(())
    }

    fn write_data(&mut self, buffer: &TransferBuffer, select_new: bool) -> Result<(), EngineError> {
        if select_new {
            self.selected.clear();
        }
        for cell in &buffer.cells {
            self.cells.push(cell.clone());
            self.created_cells += 1;
            if select_new {
                self.selected.insert(cell.id);
            }
        }
        for particle in &buffer.particles {
            self.particles.push(particle.clone());
            if select_new {
                self.selected.insert(particle.id);
            }
        }
        Ok(())
    }

    fn change_entity(&mut self, change: &EntityChange) -> Result<(), EngineError> {
        match change {
            EntityChange::Cell(cell) => {
                let slot = self.cells.iter_mut().find(|c| c.id == cell.id).ok_or_else(|| {
                    EngineError::ExecutionFailed {
                        reason: format!("unknown cell id {}", cell.id),
                    }
                })?;
                *slot = cell.clone();
            }
            EntityChange::Particle(particle) => {
                let slot = self
                    .particles
                    .iter_mut()
                    .find(|p| p.id == particle.id)
                    .ok_or_else(|| EngineError::ExecutionFailed {
                        reason: format!("unknown particle id {}", particle.id),
                    })?;
                *slot = particle.clone();
            }
        }
        Ok(())
    }

    fn apply_force(&mut self, job: &ForceJob) -> Result<(), EngineError> {
        self.probe
            .applied_forces
            .lock()
            .expect("probe mutex poisoned")
            .push(*job);
        for cell in &mut self.cells {
            cell.vel.x += job.force.x;
            cell.vel.y += job.force.y;
        }
        Ok(())
    }

    fn set_parameters(&mut self, parameters: SimulationParameters) {
        self.probe
            .applied_parameters
            .lock()
            .expect("probe mutex poisoned")
            .push(parameters);
    }

    fn set_parameter_spots(&mut self, spots: ParameterSpots) {
        self.probe
            .applied_spots
            .lock()
            .expect("probe mutex poisoned")
            .push(spots);
    }

    fn set_accelerator_config(&mut self, config: AcceleratorConfig) {
        self.probe
            .applied_accelerator
            .lock()
            .expect("probe mutex poisoned")
            .push(config);
    }

    fn set_flow_field(&mut self, config: FlowFieldConfig) {
        self.probe
            .applied_flow_fields
            .lock()
            .expect("probe mutex poisoned")
            .push(config);
    }

    fn switch_selection(&mut self, pos: Vec2, radius: f32) {
        let mut best: Option<(u64, f32)> = None;
        for cell in &self.cells {
            let d = (cell.pos.x - pos.x).hypot(cell.pos.y - pos.y);
            if d <= radius && best.map_or(true, |(_, bd)| d < bd) {
                best = Some((cell.id, d));
            }
        }
        for particle in &self.particles {
            let d = (particle.pos.x - pos.x).hypot(particle.pos.y - pos.y);
            if d <= radius && best.map_or(true, |(_, bd)| d < bd) {
                best = Some((particle.id, d));
            }
        }
        if let Some((id, _)) = best {
            if !self.selected.remove(&id) {
                self.selected.insert(id);
            }
        }
    }

    fn set_selection(&mut self, area: AreaSelection) {
        let rect = WorldRect {
            top_left: Vec2::new(area.start.x.min(area.end.x), area.start.y.min(area.end.y)),
            bottom_right: Vec2::new(area.start.x.max(area.end.x), area.start.y.max(area.end.y)),
        };
        self.selected.clear();
        for cell in &self.cells {
            if Self::contains(rect, cell.pos) {
                self.selected.insert(cell.id);
            }
        }
        for particle in &self.particles {
            if Self::contains(rect, particle.pos) {
                self.selected.insert(particle.id);
            }
        }
    }

    fn remove_selection(&mut self) {
        self.selected.clear();
    }

    fn update_selection(&mut self) {
        let live: HashSet<u64> = self
            .cells
            .iter()
            .map(|c| c.id)
            .chain(self.particles.iter().map(|p| p.id))
            .collect();
        self.selected.retain(|id| live.contains(id));
    }

    fn selection_summary(&self) -> SelectionSummary {
        let cells: Vec<&Cell> = self.cells.iter().filter(|c| self.selected.contains(&c.id)).collect();
        let particles: Vec<&Particle> = self
            .particles
            .iter()
            .filter(|p| self.selected.contains(&p.id))
            .collect();
        let n = cells.len() + particles.len();
        let mut center = Vec2::default();
        if n > 0 {
            for c in &cells {
                center.x += c.pos.x;
                center.y += c.pos.y;
            }
            for p in &particles {
                center.x += p.pos.x;
                center.y += p.pos.y;
            }
            center.x /= n as f32;
            center.y /= n as f32;
        }
        SelectionSummary {
            num_cells: cells.len(),
            num_particles: particles.len(),
            center,
        }
    }

    fn remove_selected(&mut self, _include_clusters: bool) -> Result<(), EngineError> {
        let selected = std::mem::take(&mut self.selected);
        self.cells.retain(|c| !selected.contains(&c.id));
        self.particles.retain(|p| !selected.contains(&p.id));
        Ok(())
    }

    fn clear(&mut self) -> Result<(), EngineError> {
        self.cells.clear();
        self.particles.clear();
        self.selected.clear();
        Ok(())
    }

    fn statistics(&self) -> SimStatistics {
        let cell_energy: f64 = self.cells.iter().map(|c| f64::from(c.energy)).sum();
        let particle_energy: f64 = self.particles.iter().map(|p| f64::from(p.energy)).sum();
        SimStatistics {
            time_step: self.time_step,
            num_cells: self.cells.len() as u64,
            num_particles: self.particles.len() as u64,
            num_tokens: self.cells.iter().map(|c| u64::from(c.token_count)).sum(),
            total_internal_energy: cell_energy + particle_energy,
            num_created_cells: self.created_cells,
            num_successful_attacks: 0,
            num_failed_attacks: 0,
            num_muscle_activities: 0,
        }
    }
}
