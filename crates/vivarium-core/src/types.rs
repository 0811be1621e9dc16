//! Geometry, entity transfer, and selection types.
//!
//! Entity payloads here are deliberately minimal: the worker core moves
//! them across the caller/engine boundary but never interprets them.
//! The [`TransferBuffer`] is the reusable staging area handed out by the
//! engine crate's buffer pool and filled or consumed by a
//! [`ComputeEngine`](crate::ComputeEngine) call.

// ── Geometry ───────────────────────────────────────────────────────

/// A 2D position or direction in world coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec2 {
    /// Horizontal component.
    pub x: f32,
    /// Vertical component.
    pub y: f32,
}

impl Vec2 {
    /// Construct from components.
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle in world coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WorldRect {
    /// Upper-left corner.
    pub top_left: Vec2,
    /// Lower-right corner.
    pub bottom_right: Vec2,
}

// ── Entity transfer types ──────────────────────────────────────────

/// Number of entities of each kind, used to size transfer buffers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EntityCounts {
    /// Structured cells.
    pub cells: usize,
    /// Free energy particles.
    pub particles: usize,
    /// Signal tokens carried by cells.
    pub tokens: usize,
}

impl EntityCounts {
    /// Component-wise maximum of two counts.
    pub fn max(self, other: Self) -> Self {
        Self {
            cells: self.cells.max(other.cells),
            particles: self.particles.max(other.particles),
            tokens: self.tokens.max(other.tokens),
        }
    }

    /// True if every component of `self` is at least as large as `other`.
    pub fn covers(self, other: Self) -> bool {
        self.cells >= other.cells && self.particles >= other.particles && self.tokens >= other.tokens
    }
}

/// A structured cell as moved across the transfer boundary.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Cell {
    /// Stable entity id.
    pub id: u64,
    /// World position.
    pub pos: Vec2,
    /// Velocity.
    pub vel: Vec2,
    /// Internal energy.
    pub energy: f32,
    /// Number of signal tokens currently held.
    pub token_count: u32,
}

/// A free energy particle as moved across the transfer boundary.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Particle {
    /// Stable entity id.
    pub id: u64,
    /// World position.
    pub pos: Vec2,
    /// Velocity.
    pub vel: Vec2,
    /// Carried energy.
    pub energy: f32,
}

/// An owned batch of entity data returned to or supplied by a caller.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorldData {
    /// Cells in the batch.
    pub cells: Vec<Cell>,
    /// Particles in the batch.
    pub particles: Vec<Particle>,
}

impl WorldData {
    /// Entity counts for buffer sizing.
    pub fn counts(&self) -> EntityCounts {
        EntityCounts {
            cells: self.cells.len(),
            particles: self.particles.len(),
            tokens: self.cells.iter().map(|c| c.token_count as usize).sum(),
        }
    }
}

/// Reusable staging buffers for moving entity data across the
/// caller/engine boundary.
///
/// Buffers are acquired from the pool sized to current entity counts,
/// scoped to a single guarded operation, and released afterwards. The
/// backing vectors keep their capacity across reuse.
#[derive(Debug, Default)]
pub struct TransferBuffer {
    /// Staged cells.
    pub cells: Vec<Cell>,
    /// Staged particles.
    pub particles: Vec<Particle>,
}

impl TransferBuffer {
    /// Create an empty buffer with capacity for `counts` entities.
    pub fn with_capacity(counts: EntityCounts) -> Self {
        Self {
            cells: Vec::with_capacity(counts.cells),
            particles: Vec::with_capacity(counts.particles),
        }
    }

    /// Grow the backing storage so that `counts` entities fit without
    /// reallocation. Never shrinks.
    pub fn ensure_capacity(&mut self, counts: EntityCounts) {
        if self.cells.capacity() < counts.cells {
            self.cells.reserve(counts.cells - self.cells.len());
        }
        if self.particles.capacity() < counts.particles {
            self.particles.reserve(counts.particles - self.particles.len());
        }
    }

    /// Current capacity, component-wise.
    pub fn capacity(&self) -> EntityCounts {
        EntityCounts {
            cells: self.cells.capacity(),
            particles: self.particles.capacity(),
            tokens: 0,
        }
    }

    /// Clear staged contents, keeping capacity.
    pub fn clear(&mut self) {
        self.cells.clear();
        self.particles.clear();
    }
}

// ── Point effects and edits ────────────────────────────────────────

/// A queued point-effect request: apply `force` along the segment from
/// `start` to `end`, affecting entities within `radius`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ForceJob {
    /// Segment start.
    pub start: Vec2,
    /// Segment end.
    pub end: Vec2,
    /// Force vector to apply.
    pub force: Vec2,
    /// Effect radius around the segment.
    pub radius: f32,
}

/// A single-entity edit applied under guarded access.
#[derive(Clone, Debug, PartialEq)]
pub enum EntityChange {
    /// Replace a cell's transfer payload.
    Cell(Cell),
    /// Replace a particle's transfer payload.
    Particle(Particle),
}

// ── Selection ──────────────────────────────────────────────────────

/// A rectangular area selection.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AreaSelection {
    /// One corner of the selection rectangle.
    pub start: Vec2,
    /// The opposite corner.
    pub end: Vec2,
}

/// Shallow summary of the current selection.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SelectionSummary {
    /// Number of selected cells.
    pub num_cells: usize,
    /// Number of selected particles.
    pub num_particles: usize,
    /// Centre of mass of the selection.
    pub center: Vec2,
}
