//! Reusable transfer-buffer pool.
//!
//! Guarded data operations stage entity payloads in a
//! [`TransferBuffer`] acquired here and sized to current entity counts.
//! Buffers are scoped to a single guarded operation and released
//! afterwards; the backing vectors keep their capacity so steady-state
//! operation does not reallocate.

use smallvec::SmallVec;

use vivarium_core::{EntityCounts, TransferBuffer};

/// A small free list of transfer buffers.
#[derive(Debug, Default)]
pub(crate) struct BufferPool {
    free: SmallVec<[TransferBuffer; 4]>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a buffer with capacity for at least `counts` entities,
    /// growing a pooled one if undersized. The buffer comes back empty.
    pub fn acquire(&mut self, counts: EntityCounts) -> TransferBuffer {
        match self.free.pop() {
            Some(mut buffer) => {
                buffer.clear();
                buffer.ensure_capacity(counts);
                buffer
            }
            None => TransferBuffer::with_capacity(counts),
        }
    }

    /// Return a buffer to the free list.
    pub fn release(&mut self, buffer: TransferBuffer) {
        self.free.push(buffer);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vivarium_core::Cell;

    const COUNTS: EntityCounts = EntityCounts {
        cells: 8,
        particles: 8,
        tokens: 0,
    };

    #[test]
    fn acquire_release_reuses_storage() {
        let mut pool = BufferPool::new();
        let mut buffer = pool.acquire(COUNTS);
        buffer.cells.push(Cell::default());
        let capacity = buffer.capacity();
        pool.release(buffer);
        assert_eq!(pool.len(), 1);

        let reused = pool.acquire(COUNTS);
        assert!(reused.cells.is_empty(), "reused buffer must come back empty");
        assert!(reused.capacity().covers(capacity));
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn undersized_buffer_is_grown() {
        let mut pool = BufferPool::new();
        let buffer = pool.acquire(EntityCounts {
            cells: 1,
            particles: 1,
            tokens: 0,
        });
        pool.release(buffer);

        let grown = pool.acquire(EntityCounts {
            cells: 64,
            particles: 64,
            tokens: 0,
        });
        assert!(grown.capacity().cells >= 64);
        assert!(grown.capacity().particles >= 64);
    }
}
