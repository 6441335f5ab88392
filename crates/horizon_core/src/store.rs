//! # Chunk Store
//!
//! Sparse, unbounded grid of chunk nodes keyed by integer coordinates.
//!
//! Nodes live in a slot arena indexed by a hash map, so a lookup is O(1)
//! no matter how far the coordinate is from the origin. Directional links
//! between neighbours are implicit: the neighbour of `c` to the north is
//! whatever node sits at `c + (1, 0)`. Symmetry therefore holds by
//! construction.
//!
//! ```text
//!              east (+y)
//!                 │
//!  south (-x) ── node ── north (+x)
//!                 │
//!              west (-y)
//! ```
//!
//! Nodes are materialised on first `locate` and only disappear through
//! an explicit `evict_where`.

use std::collections::HashMap;

use crate::coord::ChunkCoord;

/// One of the four grid directions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// +x
    North,
    /// -x
    South,
    /// +y
    East,
    /// -y
    West,
}

impl Direction {
    /// All four directions.
    pub const ALL: [Self; 4] = [Self::North, Self::South, Self::East, Self::West];

    /// Unit offset of this direction.
    #[inline]
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (1, 0),
            Self::South => (-1, 0),
            Self::East => (0, 1),
            Self::West => (0, -1),
        }
    }

    /// The direction pointing back.
    #[inline]
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::South => Self::North,
            Self::East => Self::West,
            Self::West => Self::East,
        }
    }
}

/// Stable handle to a node.
///
/// Carries the slot version so a handle to an evicted node never aliases
/// a newer node that reused the slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    version: u32,
}

struct Slot<T> {
    version: u32,
    entry: Option<(ChunkCoord, T)>,
}

/// Hash-indexed arena of chunk nodes.
pub struct ChunkStore<T> {
    /// Coordinate -> node.
    index: HashMap<ChunkCoord, NodeId>,
    /// Node storage.
    slots: Vec<Slot<T>>,
    /// Indices of vacated slots.
    free_list: Vec<u32>,
}

impl<T> Default for ChunkStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ChunkStore<T> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            index: HashMap::new(),
            slots: Vec::new(),
            free_list: Vec::new(),
        }
    }

    /// Number of materialised nodes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True when no node has been materialised.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Looks up a node without creating it.
    #[inline]
    #[must_use]
    pub fn find(&self, coord: ChunkCoord) -> Option<NodeId> {
        self.index.get(&coord).copied()
    }

    /// True when `coord` has a node.
    #[inline]
    #[must_use]
    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.index.contains_key(&coord)
    }

    /// Gets a node.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&T> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.version != id.version {
            return None;
        }
        slot.entry.as_ref().map(|(_, node)| node)
    }

    /// Gets a node mutably.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.version != id.version {
            return None;
        }
        slot.entry.as_mut().map(|(_, node)| node)
    }

    /// Gets the node at `coord`, if materialised.
    #[must_use]
    pub fn node(&self, coord: ChunkCoord) -> Option<&T> {
        self.find(coord).and_then(|id| self.get(id))
    }

    /// Gets the node at `coord` mutably, if materialised.
    pub fn node_mut(&mut self, coord: ChunkCoord) -> Option<&mut T> {
        let id = self.find(coord)?;
        self.get_mut(id)
    }

    /// Returns the coordinate a node lives at.
    #[must_use]
    pub fn coord_of(&self, id: NodeId) -> Option<ChunkCoord> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.version != id.version {
            return None;
        }
        slot.entry.as_ref().map(|(coord, _)| *coord)
    }

    /// The neighbour of `coord` in `direction`, if that node exists.
    #[must_use]
    pub fn neighbor(&self, coord: ChunkCoord, direction: Direction) -> Option<NodeId> {
        let (dx, dy) = direction.offset();
        self.find(coord.offset(dx, dy))
    }

    /// Removes every node for which `evict` returns true.
    ///
    /// Returns the number of nodes removed.
    pub fn evict_where(&mut self, mut evict: impl FnMut(ChunkCoord, &T) -> bool) -> usize {
        let mut removed = 0;

        for (index, slot) in self.slots.iter_mut().enumerate() {
            let doomed = matches!(&slot.entry, Some((coord, node)) if evict(*coord, node));
            if !doomed {
                continue;
            }

            if let Some((coord, _)) = slot.entry.take() {
                self.index.remove(&coord);
            }
            slot.version = slot.version.wrapping_add(1);
            self.free_list.push(index as u32);
            removed += 1;
        }

        removed
    }

    /// Iterates over all nodes.
    pub fn iter(&self) -> impl Iterator<Item = (ChunkCoord, &T)> {
        self.slots
            .iter()
            .filter_map(|slot| slot.entry.as_ref().map(|(coord, node)| (*coord, node)))
    }
}

impl<T: Default> ChunkStore<T> {
    /// Returns the node at `coord`, materialising it on first visit.
    ///
    /// Idempotent: repeated calls return the same handle.
    pub fn locate(&mut self, coord: ChunkCoord) -> NodeId {
        if let Some(id) = self.find(coord) {
            return id;
        }

        let id = if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some((coord, T::default()));
            NodeId {
                index,
                version: slot.version,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                version: 0,
                entry: Some((coord, T::default())),
            });
            NodeId { index, version: 0 }
        };

        self.index.insert(coord, id);
        id
    }

    /// Materialises `coord` and returns its node mutably.
    pub fn locate_mut(&mut self, coord: ChunkCoord) -> &mut T {
        let id = self.locate(coord);
        let slot = &mut self.slots[id.index as usize];
        match &mut slot.entry {
            Some((_, node)) => node,
            None => unreachable!("located node has no entry"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Debug, PartialEq)]
    struct Node {
        lod: u32,
    }

    #[test]
    fn test_locate_is_idempotent() {
        let mut store: ChunkStore<Node> = ChunkStore::new();

        let walk = [(0, 0), (1, 0), (2, 0), (2, 1), (2, -5), (-3, 4), (-40, -40)];
        let first: Vec<_> = walk.iter().map(|&c| store.locate(c.into())).collect();
        let second: Vec<_> = walk.iter().map(|&c| store.locate(c.into())).collect();

        assert_eq!(first, second);
        assert_eq!(store.len(), walk.len());
    }

    #[test]
    fn test_links_are_symmetric() {
        let mut store: ChunkStore<Node> = ChunkStore::new();
        for x in -3..=3 {
            for y in -3..=3 {
                store.locate(ChunkCoord::new(x, y));
            }
        }

        for x in -3..=3 {
            for y in -3..=3 {
                let coord = ChunkCoord::new(x, y);
                let here = store.find(coord).unwrap();
                for direction in Direction::ALL {
                    if let Some(there) = store.neighbor(coord, direction) {
                        let there_coord = store.coord_of(there).unwrap();
                        assert_eq!(store.neighbor(there_coord, direction.opposite()), Some(here));
                    }
                }
            }
        }

        // Edge of the explored area has no link outward.
        assert_eq!(store.neighbor(ChunkCoord::new(3, 0), Direction::North), None);
    }

    #[test]
    fn test_node_data_persists() {
        let mut store: ChunkStore<Node> = ChunkStore::new();
        store.locate_mut(ChunkCoord::new(5, 5)).lod = 3;

        assert_eq!(store.node(ChunkCoord::new(5, 5)), Some(&Node { lod: 3 }));
        assert_eq!(store.locate_mut(ChunkCoord::new(5, 5)).lod, 3);
    }

    #[test]
    fn test_evict_invalidates_handles() {
        let mut store: ChunkStore<Node> = ChunkStore::new();
        let near = store.locate(ChunkCoord::new(0, 0));
        let far = store.locate(ChunkCoord::new(100, 0));

        let removed = store.evict_where(|coord, _| coord.chebyshev_distance(ChunkCoord::ORIGIN) > 10);
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 1);
        assert!(store.get(far).is_none());
        assert!(store.get(near).is_some());

        // The freed slot is reused with a new version.
        let reborn = store.locate(ChunkCoord::new(-100, 0));
        assert_ne!(reborn, far);
        assert!(store.get(far).is_none());
        assert_eq!(store.coord_of(reborn), Some(ChunkCoord::new(-100, 0)));
    }
}
