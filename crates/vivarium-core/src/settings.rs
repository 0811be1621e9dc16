//! Tunable simulation settings.
//!
//! Each of these structs is the payload of one coalescing slot in the
//! engine crate's pending job store: callers submit a full replacement
//! value and the worker loop applies the most recent one at the next
//! drain. Field sets are intentionally small; the numerical model
//! behind them is out of scope for this workspace.

use crate::types::Vec2;

/// Global simulation parameters applied world-wide.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationParameters {
    /// Integration step size.
    pub time_step_size: f32,
    /// Base friction applied to all moving entities.
    pub friction: f32,
    /// Energy below which a cell dies.
    pub cell_min_energy: f32,
    /// Maximum binding distance between connected cells.
    pub cell_max_binding_distance: f32,
    /// Global radiation strength.
    pub radiation_factor: f32,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            time_step_size: 1.0,
            friction: 0.01,
            cell_min_energy: 50.0,
            cell_max_binding_distance: 2.6,
            radiation_factor: 0.0002,
        }
    }
}

/// A circular region with parameter overrides.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterSpot {
    /// Centre of the spot.
    pub center: Vec2,
    /// Radius of the fully-overridden core.
    pub core_radius: f32,
    /// Width of the blend zone around the core.
    pub fade_width: f32,
    /// Parameter values inside the spot.
    pub values: SimulationParameters,
}

/// Spatial parameter overrides: up to a small number of spots blended
/// over the global parameters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterSpots {
    /// Active spots, in priority order.
    pub spots: Vec<ParameterSpot>,
}

/// Tuning constants for the accelerator backend.
#[derive(Clone, Debug, PartialEq)]
pub struct AcceleratorConfig {
    /// Number of compute blocks per kernel launch.
    pub num_blocks: u32,
    /// Threads per block.
    pub num_threads_per_block: u32,
}

impl Default for AcceleratorConfig {
    fn default() -> Self {
        Self {
            num_blocks: 64,
            num_threads_per_block: 64,
        }
    }
}

/// Configuration of the background flow field.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlowFieldConfig {
    /// Whether the flow field influences entity motion.
    pub active: bool,
    /// Flow centres: position and angular strength.
    pub centers: Vec<(Vec2, f32)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let p = SimulationParameters::default();
        assert!(p.time_step_size > 0.0);
        assert!(p.friction >= 0.0);

        let a = AcceleratorConfig::default();
        assert!(a.num_blocks > 0);
        assert!(a.num_threads_per_block > 0);

        let f = FlowFieldConfig::default();
        assert!(!f.active);
        assert!(f.centers.is_empty());
    }
}
