//! Core types and traits for the Vivarium simulation engine.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the fundamental abstractions shared across the Vivarium workspace:
//! geometry and entity transfer types, tunable settings, error types,
//! and the [`ComputeEngine`] capability trait that the worker loop
//! drives.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod engine;
pub mod error;
pub mod settings;
pub mod stats;
pub mod types;

pub use engine::ComputeEngine;
pub use error::{AccessError, EngineError};
pub use settings::{AcceleratorConfig, FlowFieldConfig, ParameterSpot, ParameterSpots, SimulationParameters};
pub use stats::SimStatistics;
pub use types::{
    AreaSelection, Cell, EntityChange, EntityCounts, ForceJob, Particle, SelectionSummary,
    TransferBuffer, Vec2, WorldData, WorldRect,
};
