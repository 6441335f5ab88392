//! # Chunk Object Pool
//!
//! Fixed-capacity set of reusable render slots. One slot is handed out per
//! placed chunk and reclaimed when the chunk is evicted.

use crate::coord::ChunkCoord;
use crate::error::{PoolError, PoolResult};

/// A pool of render slots, each owning one engine handle.
///
/// Slots are identified by the chunk they currently show, not by the
/// handle: `release` matches on the assigned coordinate. The capacity is
/// fixed at construction and normally equals `1 + 8 × (max_lod + 1)`,
/// exactly one ring set.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. It is owned by the scheduler and mutated
/// only from the tick thread.
///
/// # Example
///
/// ```rust,ignore
/// let mut pool = ChunkObjectPool::with_capacity(9, |i| format!("slot-{i}"));
///
/// let slot = pool.acquire(ChunkCoord::new(0, 0))?;
/// pool.release(ChunkCoord::new(0, 0))?;
/// ```
pub struct ChunkObjectPool<H> {
    /// The slots.
    slots: Box<[PoolSlot<H>]>,
    /// Number of occupied slots.
    occupied_count: usize,
}

/// Index of a slot in the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotId(usize);

impl SlotId {
    /// Returns the slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// One reusable render object.
#[derive(Debug)]
struct PoolSlot<H> {
    /// Engine handle, created once and recycled forever.
    handle: H,
    /// Chunk currently shown by this slot; `None` means free.
    occupant: Option<ChunkCoord>,
}

impl<H> ChunkObjectPool<H> {
    /// Creates a pool from pre-instantiated handles.
    ///
    /// # Panics
    ///
    /// Panics if `handles` is empty.
    #[must_use]
    pub fn new(handles: impl IntoIterator<Item = H>) -> Self {
        let slots: Vec<PoolSlot<H>> = handles
            .into_iter()
            .map(|handle| PoolSlot { handle, occupant: None })
            .collect();

        assert!(!slots.is_empty(), "Capacity must be greater than zero");

        Self {
            slots: slots.into_boxed_slice(),
            occupied_count: 0,
        }
    }

    /// Creates a pool of `capacity` slots, instantiating each handle with
    /// `instantiate(slot_index)`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize, instantiate: impl FnMut(usize) -> H) -> Self {
        Self::new((0..capacity).map(instantiate))
    }

    /// Returns the total capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the number of occupied slots.
    #[inline]
    #[must_use]
    pub const fn occupied_count(&self) -> usize {
        self.occupied_count
    }

    /// Returns the number of free slots.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.capacity() - self.occupied_count
    }

    /// True when no slot is free.
    #[inline]
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.free_count() == 0
    }

    /// Hands out a slot for `coord`.
    ///
    /// Scans for the first free slot. If `coord` already holds a slot, that
    /// slot is returned again so one chunk never shows twice.
    ///
    /// # Errors
    ///
    /// [`PoolError::Exhausted`] when every slot is occupied.
    pub fn acquire(&mut self, coord: ChunkCoord) -> PoolResult<SlotId> {
        if let Some(existing) = self.slot_of(coord) {
            return Ok(existing);
        }

        let index = self
            .slots
            .iter()
            .position(|slot| slot.occupant.is_none())
            .ok_or(PoolError::Exhausted {
                capacity: self.capacity(),
            })?;

        self.slots[index].occupant = Some(coord);
        self.occupied_count += 1;

        Ok(SlotId(index))
    }

    /// Frees the slot currently showing `coord`.
    ///
    /// # Errors
    ///
    /// [`PoolError::StaleMatch`] when no slot is assigned to `coord`.
    pub fn release(&mut self, coord: ChunkCoord) -> PoolResult<SlotId> {
        let slot = self.slot_of(coord).ok_or(PoolError::StaleMatch { coord })?;

        self.slots[slot.0].occupant = None;
        self.occupied_count -= 1;

        Ok(slot)
    }

    /// Finds the slot assigned to `coord`.
    #[must_use]
    pub fn slot_of(&self, coord: ChunkCoord) -> Option<SlotId> {
        self.slots
            .iter()
            .position(|slot| slot.occupant == Some(coord))
            .map(SlotId)
    }

    /// Gets the engine handle of a slot.
    #[inline]
    #[must_use]
    pub fn handle(&self, slot: SlotId) -> Option<&H> {
        self.slots.get(slot.0).map(|s| &s.handle)
    }

    /// Gets the chunk a slot is showing.
    #[inline]
    #[must_use]
    pub fn occupant(&self, slot: SlotId) -> Option<ChunkCoord> {
        self.slots.get(slot.0).and_then(|s| s.occupant)
    }

    /// Iterates over occupied slots.
    pub fn occupied(&self) -> impl Iterator<Item = (SlotId, ChunkCoord, &H)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.occupant.map(|coord| (SlotId(index), coord, &slot.handle)))
    }

    /// Iterates over every handle, free or not.
    pub fn handles(&self) -> impl Iterator<Item = &H> {
        self.slots.iter().map(|slot| &slot.handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring_pool(max_lod: usize) -> ChunkObjectPool<usize> {
        ChunkObjectPool::with_capacity(1 + 8 * (max_lod + 1), |i| i)
    }

    #[test]
    fn test_pool_acquire_release() {
        let mut pool = ring_pool(0);
        assert_eq!(pool.capacity(), 9);

        let slot = pool.acquire(ChunkCoord::new(2, 3)).unwrap();
        assert_eq!(pool.occupant(slot), Some(ChunkCoord::new(2, 3)));
        assert_eq!(pool.occupied_count(), 1);

        let freed = pool.release(ChunkCoord::new(2, 3)).unwrap();
        assert_eq!(freed, slot);
        assert_eq!(pool.occupied_count(), 0);
        assert_eq!(pool.occupant(slot), None);
    }

    #[test]
    fn test_pool_full_then_release() {
        let mut pool = ring_pool(4);
        let capacity = pool.capacity();
        assert_eq!(capacity, 41);

        for i in 0..capacity {
            pool.acquire(ChunkCoord::new(i as i32, 0)).unwrap();
        }
        assert!(pool.is_exhausted());
        assert_eq!(
            pool.acquire(ChunkCoord::new(-1, -1)),
            Err(PoolError::Exhausted { capacity })
        );

        pool.release(ChunkCoord::new(7, 0)).unwrap();
        let slot = pool.acquire(ChunkCoord::new(-1, -1)).unwrap();
        assert_eq!(slot.index(), 7); // First free slot reused
    }

    #[test]
    fn test_pool_release_unknown_is_stale() {
        let mut pool = ring_pool(0);
        pool.acquire(ChunkCoord::new(0, 0)).unwrap();

        assert_eq!(
            pool.release(ChunkCoord::new(5, 5)),
            Err(PoolError::StaleMatch { coord: ChunkCoord::new(5, 5) })
        );
        assert_eq!(pool.occupied_count(), 1);
    }

    #[test]
    fn test_pool_same_coord_reuses_slot() {
        let mut pool = ring_pool(0);
        let a = pool.acquire(ChunkCoord::new(1, 1)).unwrap();
        let b = pool.acquire(ChunkCoord::new(1, 1)).unwrap();
        assert_eq!(a, b);
        assert_eq!(pool.occupied_count(), 1);
    }

    #[test]
    fn test_pool_occupied_iteration() {
        let mut pool = ring_pool(0);
        pool.acquire(ChunkCoord::new(0, 0)).unwrap();
        pool.acquire(ChunkCoord::new(1, 0)).unwrap();

        let coords: Vec<_> = pool.occupied().map(|(_, coord, _)| coord).collect();
        assert_eq!(coords, vec![ChunkCoord::new(0, 0), ChunkCoord::new(1, 0)]);
        assert_eq!(pool.handles().count(), 9);
    }
}
