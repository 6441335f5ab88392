//! # HORIZON Procedural Generation
//!
//! Deterministic terrain for an infinite, chunked world.
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: Same seed always produces the same terrain
//! 2. **Chunked**: Every chunk is a 255×255 heightmap, whatever its LOD
//! 3. **Background**: Heightmaps, meshes and collision build on workers
//! 4. **Cancellable**: Every long loop checks its token per row
//!
//! ## Pipeline
//!
//! ```text
//! NoiseField ──► HeightmapGenerator ──► MeshBuilder ──► MeshArtifact
//!                    (HeightmapJob)        │              geometry_done
//!                                          └─ (1,1) only  collision_done
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use horizon_procedural::{ErodedFractalField, HeightmapGenerator, WorldSeed};
//!
//! let field = Arc::new(ErodedFractalField::new(WorldSeed::new(12345)));
//! let generator = HeightmapGenerator::new(field, 100.0, 5000.0);
//! let mut job = generator.generate(&workers, coord, LodScale::FINEST, token);
//!
//! // Once per tick
//! if job.next() == Some(true) {
//!     let outcome = job.take_outcome();
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod collision;
pub mod heightmap;
pub mod mesh;
pub mod noise;

pub use collision::CollisionShape;
pub use heightmap::{
    Heightmap, HeightmapGenerator, HeightmapJob, HeightmapOutcome, DEFAULT_RESOLUTION_ADJUSTMENT,
    HEIGHTMAP_RESOLUTION,
};
pub use mesh::{Aabb, MeshArtifact, MeshBuilder, MeshGeometry};
pub use noise::{
    ConstantField, ErodedFractalField, ErosionParams, NoiseField, SimplexNoise, WorldSeed, MAX_OCTAVES,
};
