//! The compute capability consumed by the worker loop.

use crate::error::EngineError;
use crate::settings::{AcceleratorConfig, FlowFieldConfig, ParameterSpots, SimulationParameters};
use crate::stats::SimStatistics;
use crate::types::{
    AreaSelection, EntityChange, EntityCounts, ForceJob, SelectionSummary, TransferBuffer, Vec2,
    WorldRect,
};

/// The opaque compute capability that advances the simulation and owns
/// the entity state in accelerator memory.
///
/// Every method is synchronous and its duration bounds the worker
/// loop's iteration latency. The concurrency core guarantees calls are
/// strictly serialized: either the loop thread or, during a granted
/// access window, exactly one caller thread holds the engine at a time.
/// Implementations therefore need no internal locking.
pub trait ComputeEngine: Send {
    /// Advance the simulation by exactly one timestep.
    fn step(&mut self) -> Result<(), EngineError>;

    /// Current timestep index.
    fn current_timestep(&self) -> u64;

    /// Overwrite the timestep index.
    fn set_current_timestep(&mut self, value: u64);

    /// Current entity counts, used to size transfer buffers.
    fn entity_counts(&self) -> EntityCounts;

    /// Grow internal entity arrays so that `counts` additional entities
    /// fit. A no-op when capacity is already sufficient.
    fn resize_if_necessary(&mut self, counts: EntityCounts) -> Result<(), EngineError>;

    /// Read all entities intersecting `region` into `buffer`.
    fn read_region(&self, region: WorldRect, buffer: &mut TransferBuffer)
        -> Result<(), EngineError>;

    /// Read the currently selected entities into `buffer`. With
    /// `include_clusters`, selection extends over connected cells.
    fn read_selected(
        &self,
        include_clusters: bool,
        buffer: &mut TransferBuffer,
    ) -> Result<(), EngineError>;

    /// Write the staged entities in `buffer` into the simulation.
    /// With `select_new`, the written entities become the selection.
    fn write_data(&mut self, buffer: &TransferBuffer, select_new: bool)
        -> Result<(), EngineError>;

    /// Apply a single-entity edit.
    fn change_entity(&mut self, change: &EntityChange) -> Result<(), EngineError>;

    /// Apply a point effect.
    fn apply_force(&mut self, job: &ForceJob) -> Result<(), EngineError>;

    /// Replace the global simulation parameters.
    fn set_parameters(&mut self, parameters: SimulationParameters);

    /// Replace the spatial parameter overrides.
    fn set_parameter_spots(&mut self, spots: ParameterSpots);

    /// Replace the accelerator tuning constants.
    fn set_accelerator_config(&mut self, config: AcceleratorConfig);

    /// Replace the flow field configuration.
    fn set_flow_field(&mut self, config: FlowFieldConfig);

    /// Toggle selection of the entity nearest `pos` within `radius`.
    fn switch_selection(&mut self, pos: Vec2, radius: f32);

    /// Select all entities within an area.
    fn set_selection(&mut self, area: AreaSelection);

    /// Clear the selection.
    fn remove_selection(&mut self);

    /// Re-derive the selection after entity data changed.
    fn update_selection(&mut self);

    /// Shallow summary of the current selection.
    fn selection_summary(&self) -> SelectionSummary;

    /// Delete the selected entities. With `include_clusters`, deletion
    /// extends over connected cells.
    fn remove_selected(&mut self, include_clusters: bool) -> Result<(), EngineError>;

    /// Remove all entities.
    fn clear(&mut self) -> Result<(), EngineError>;

    /// Compute aggregate statistics over the current state.
    fn statistics(&self) -> SimStatistics;
}
