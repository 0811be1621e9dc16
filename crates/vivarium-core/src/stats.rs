//! Aggregate simulation statistics reported by the compute capability.

/// A batch of aggregate counters computed by the engine.
///
/// The worker loop pulls these into its lock-free monitor snapshot at a
/// bounded refresh rate; callers read them as advisory statistics, not
/// state used for correctness.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SimStatistics {
    /// Current timestep index.
    pub time_step: u64,
    /// Number of live cells.
    pub num_cells: u64,
    /// Number of free energy particles.
    pub num_particles: u64,
    /// Number of signal tokens.
    pub num_tokens: u64,
    /// Sum of internal energy over all entities.
    pub total_internal_energy: f64,
    /// Cells created since the session began.
    pub num_created_cells: u64,
    /// Successful attacks since the session began.
    pub num_successful_attacks: u64,
    /// Failed attacks since the session began.
    pub num_failed_attacks: u64,
    /// Muscle activations since the session began.
    pub num_muscle_activities: u64,
}
