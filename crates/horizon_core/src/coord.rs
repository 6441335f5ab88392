//! # Chunk Coordinates and LOD Footprints
//!
//! The world is an infinite grid of square chunks addressed by a pair of
//! signed integers. A chunk at LOD level `L` covers `3^L × 3^L` base
//! chunks, so every ring of the LOD layout is exactly three times wider
//! than the ring inside it.
//!
//! ## Axes
//!
//! `ChunkCoord::x` follows world X, `ChunkCoord::y` follows world Z.
//! World Y is height and never appears in chunk addressing.

use std::fmt;
use std::ops::{Add, Mul, Sub};

/// Base world extent of a level-0 chunk, in world units.
pub const DEFAULT_CHUNK_SIZE: f32 = 100.0;

/// Highest LOD level whose footprint still fits comfortably in `i32` math.
pub const MAX_LOD_LEVEL: u32 = 12;

/// Chunk coordinate (identifies a chunk in the world grid).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    /// X coordinate (in chunks, along world X).
    pub x: i32,
    /// Y coordinate (in chunks, along world Z).
    pub y: i32,
}

impl ChunkCoord {
    /// The chunk containing the world origin.
    pub const ORIGIN: Self = Self { x: 0, y: 0 };

    /// Creates a new chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Converts a world position to the chunk containing it.
    ///
    /// Uses floor division, so `-0.5` lands in chunk `-1`.
    #[inline]
    #[must_use]
    pub fn from_world_position(position: [f32; 3], chunk_size: f32) -> Self {
        Self {
            x: (position[0] / chunk_size).floor() as i32,
            y: (position[2] / chunk_size).floor() as i32,
        }
    }

    /// Returns the world position of the chunk's origin corner (height 0).
    #[inline]
    #[must_use]
    pub fn world_origin(self, chunk_size: f32) -> [f32; 3] {
        [self.x as f32 * chunk_size, 0.0, self.y as f32 * chunk_size]
    }

    /// Returns this coordinate shifted by `(dx, dy)`, saturating at the
    /// edge of chunk space.
    #[inline]
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }

    /// Chebyshev (chessboard) distance between two chunks.
    #[inline]
    #[must_use]
    pub fn chebyshev_distance(self, other: Self) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    /// Manhattan distance between two chunks.
    #[inline]
    #[must_use]
    pub fn manhattan_distance(self, other: Self) -> u32 {
        self.x.abs_diff(other.x).saturating_add(self.y.abs_diff(other.y))
    }
}

// Chunk space ends at the `i32` range; arithmetic clamps there.

impl Add for ChunkCoord {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.offset(rhs.x, rhs.y)
    }
}

impl Sub for ChunkCoord {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x.saturating_sub(rhs.x), self.y.saturating_sub(rhs.y))
    }
}

impl Mul<i32> for ChunkCoord {
    type Output = Self;

    fn mul(self, rhs: i32) -> Self {
        Self::new(self.x.saturating_mul(rhs), self.y.saturating_mul(rhs))
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Chunk {}, {}", self.x, self.y)
    }
}

impl From<(i32, i32)> for ChunkCoord {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

/// Footprint of a chunk at some LOD level, in base chunks per axis.
///
/// Drives both the sampled world extent and UV tiling of the mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LodScale {
    /// Footprint along chunk X.
    pub x: u32,
    /// Footprint along chunk Y.
    pub y: u32,
}

impl LodScale {
    /// Scale of a full-detail chunk.
    pub const FINEST: Self = Self { x: 1, y: 1 };

    /// Creates a uniform scale.
    #[inline]
    #[must_use]
    pub const fn uniform(size: u32) -> Self {
        Self { x: size, y: size }
    }

    /// True for the `(1, 1)` scale, the only one that gets collision.
    #[inline]
    #[must_use]
    pub const fn is_finest(self) -> bool {
        self.x == 1 && self.y == 1
    }
}

/// Level of detail. Level `L` has footprint `3^L`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LodLevel(u32);

impl LodLevel {
    /// Full detail.
    pub const FINEST: Self = Self(0);

    /// Creates a level, saturating at [`MAX_LOD_LEVEL`].
    #[inline]
    #[must_use]
    pub const fn new(level: u32) -> Self {
        if level > MAX_LOD_LEVEL {
            Self(MAX_LOD_LEVEL)
        } else {
            Self(level)
        }
    }

    /// Creates a level from a signed value, clamping negatives to 0.
    #[inline]
    #[must_use]
    pub const fn from_signed(level: i32) -> Self {
        if level < 0 {
            Self(0)
        } else {
            Self::new(level as u32)
        }
    }

    /// Returns the raw level.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Footprint in base chunks per axis (`3^L`).
    #[inline]
    #[must_use]
    pub const fn footprint(self) -> u32 {
        3u32.pow(self.0)
    }

    /// The footprint as a [`LodScale`].
    #[inline]
    #[must_use]
    pub const fn scale(self) -> LodScale {
        LodScale::uniform(self.footprint())
    }
}

/// Size of a chunk at an LOD level, in base chunks: `3^L`, with
/// negative levels clamped to 0.
#[inline]
#[must_use]
pub const fn size_of_chunk_at_lod(level: i32) -> i32 {
    LodLevel::from_signed(level).footprint() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_world_position_floors() {
        assert_eq!(ChunkCoord::from_world_position([0.0, 5.0, 0.0], 100.0), ChunkCoord::new(0, 0));
        assert_eq!(ChunkCoord::from_world_position([99.9, 0.0, 99.9], 100.0), ChunkCoord::new(0, 0));
        assert_eq!(ChunkCoord::from_world_position([100.0, 0.0, 250.0], 100.0), ChunkCoord::new(1, 2));
        assert_eq!(ChunkCoord::from_world_position([-0.5, 0.0, -100.0], 100.0), ChunkCoord::new(-1, -1));
        assert_eq!(ChunkCoord::from_world_position([-100.5, 0.0, 0.0], 100.0), ChunkCoord::new(-2, 0));
    }

    #[test]
    fn test_world_origin() {
        assert_eq!(ChunkCoord::new(3, -2).world_origin(100.0), [300.0, 0.0, -200.0]);
    }

    #[test]
    fn test_size_of_chunk_at_lod() {
        assert_eq!(size_of_chunk_at_lod(0), 1);
        assert_eq!(size_of_chunk_at_lod(1), 3);
        assert_eq!(size_of_chunk_at_lod(2), 9);
        assert_eq!(size_of_chunk_at_lod(4), 81);
        assert_eq!(size_of_chunk_at_lod(-1), 1);
        assert_eq!(size_of_chunk_at_lod(i32::MIN), 1);
    }

    #[test]
    fn test_lod_scale() {
        assert!(LodLevel::FINEST.scale().is_finest());
        assert_eq!(LodLevel::new(2).scale(), LodScale::uniform(9));
        assert!(!LodLevel::new(1).scale().is_finest());
        assert_eq!(LodLevel::new(99).value(), MAX_LOD_LEVEL);
    }

    #[test]
    fn test_distances() {
        let a = ChunkCoord::new(1, -1);
        let b = ChunkCoord::new(-2, 3);
        assert_eq!(a.chebyshev_distance(b), 4);
        assert_eq!(a.manhattan_distance(b), 7);
        assert_eq!(a.chebyshev_distance(a), 0);
    }

    #[test]
    fn test_arithmetic_saturates_at_edge_of_chunk_space() {
        let edge = ChunkCoord::from_world_position([1.0e15, 0.0, -1.0e15], 100.0);
        assert_eq!(edge, ChunkCoord::new(i32::MAX, i32::MIN));

        assert_eq!(edge.offset(5, -5), edge);
        assert_eq!(edge + ChunkCoord::new(1, -1), edge);
        assert_eq!(edge - ChunkCoord::new(-1, 1), edge);
        assert_eq!(edge * 3, edge);
        assert_eq!(edge.manhattan_distance(ChunkCoord::new(i32::MIN, i32::MAX)), u32::MAX);
        assert_eq!(ChunkCoord::new(2, -3) * 3 + ChunkCoord::new(-1, -1), ChunkCoord::new(5, -10));
    }

    #[test]
    fn test_display_matches_slot_label() {
        assert_eq!(ChunkCoord::new(4, -7).to_string(), "Chunk 4, -7");
    }
}
