//! # Mesh Building
//!
//! Converts a heightmap into a triangle mesh, then (for full-detail
//! chunks only) bakes a collision shape from it.
//!
//! ## Two Phases, Two Flags
//!
//! ```text
//! build() ──► worker: geometry ──► geometry_done
//!                   │
//!                   ├─ scale (1,1) ──► worker: collision bake ──► collision_done
//!                   │
//!                   └─ coarser ────► collision_done set at build() time
//! ```
//!
//! The flags are written here and only read elsewhere. A chunk may be
//! placed once both are set. A phase that dies without finishing (its job
//! panicked or was dropped unrun) marks the artifact failed instead.
//!
//! ## Grid Layout
//!
//! Vertex `(x, z)` lives at index `x × 255 + z`. Each grid quad becomes
//! two triangles:
//!
//! ```text
//!  i+1 ─── i+256        i = a × 255 + b
//!   │ ╲     │
//!   │   ╲   │           (i, i+1, i+255)
//!   │     ╲ │           (i+1, i+256, i+255)
//!   i ──── i+255
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use parking_lot::RwLock;

use horizon_core::{CancellationToken, LodScale, WorkerPool};

use crate::collision::CollisionShape;
use crate::heightmap::{Heightmap, HEIGHTMAP_RESOLUTION};

/// Vertices per chunk mesh.
pub const VERTEX_COUNT: usize = HEIGHTMAP_RESOLUTION * HEIGHTMAP_RESOLUTION;

/// Indices per chunk mesh.
pub const INDEX_COUNT: usize = (HEIGHTMAP_RESOLUTION - 1) * (HEIGHTMAP_RESOLUTION - 1) * 6;

/// Axis-aligned bounding box.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Aabb {
    /// Minimum corner.
    pub min: [f32; 3],
    /// Maximum corner.
    pub max: [f32; 3],
}

impl Aabb {
    /// An inverted box that any point will grow.
    pub const EMPTY: Self = Self {
        min: [f32::MAX; 3],
        max: [f32::MIN; 3],
    };

    /// Grows the box to contain `p`.
    #[inline]
    pub fn include(&mut self, p: [f32; 3]) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(p[axis]);
            self.max[axis] = self.max[axis].max(p[axis]);
        }
    }

    /// Box centre.
    #[inline]
    #[must_use]
    pub fn center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }

    /// Box extent per axis.
    #[inline]
    #[must_use]
    pub fn size(&self) -> [f32; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }
}

/// Renderable chunk geometry.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshGeometry {
    /// Vertex positions, chunk-local.
    pub positions: Vec<[f32; 3]>,
    /// Unit vertex normals.
    pub normals: Vec<[f32; 3]>,
    /// Texture coordinates; tiling grows with LOD scale.
    pub uvs: Vec<[f32; 2]>,
    /// Triangle list.
    pub indices: Vec<u32>,
    /// Bounds of `positions`.
    pub bounds: Aabb,
}

impl MeshGeometry {
    /// Triangulates a heightmap.
    ///
    /// `size` is the world extent of the chunk (base size × LOD scale).
    /// Returns `None` if `token` is cancelled part way.
    #[must_use]
    pub fn from_heightmap(
        heightmap: &Heightmap,
        size: [f32; 2],
        scale: LodScale,
        height_scale: f32,
        token: &CancellationToken,
    ) -> Option<Self> {
        const RES: usize = HEIGHTMAP_RESOLUTION;
        let last = (RES - 1) as f32;

        let mut positions = Vec::with_capacity(VERTEX_COUNT);
        let mut bounds = Aabb::EMPTY;

        for x in 0..RES {
            if token.is_cancelled() {
                return None;
            }
            for z in 0..RES {
                let p = [
                    x as f32 * size[0] / last,
                    heightmap.get(x, z) * height_scale,
                    z as f32 * size[1] / last,
                ];
                bounds.include(p);
                positions.push(p);
            }
        }

        let mut indices = Vec::with_capacity(INDEX_COUNT);
        for a in 0..RES - 1 {
            if token.is_cancelled() {
                return None;
            }
            for b in 0..RES - 1 {
                let i = (a * RES + b) as u32;
                let row = RES as u32;
                indices.extend_from_slice(&[i, i + 1, i + row, i + 1, i + 1 + row, i + row]);
            }
        }

        let normals = compute_normals(&positions, &indices);

        let mut uvs = Vec::with_capacity(VERTEX_COUNT);
        for x in 0..RES {
            for z in 0..RES {
                uvs.push([
                    x as f32 / last * scale.x as f32,
                    z as f32 / last * scale.y as f32,
                ]);
            }
        }

        Some(Self {
            positions,
            normals,
            uvs,
            indices,
            bounds,
        })
    }

    /// Number of triangles.
    #[inline]
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Position buffer as bytes, ready for upload.
    #[must_use]
    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    /// Index buffer as bytes, ready for upload.
    #[must_use]
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Smallest and largest UV on each axis.
    #[must_use]
    pub fn uv_range(&self) -> ([f32; 2], [f32; 2]) {
        self.uvs.iter().fold(
            ([f32::MAX; 2], [f32::MIN; 2]),
            |(lo, hi), uv| {
                (
                    [lo[0].min(uv[0]), lo[1].min(uv[1])],
                    [hi[0].max(uv[0]), hi[1].max(uv[1])],
                )
            },
        )
    }
}

/// Area-weighted vertex normals.
fn compute_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut normals = vec![[0.0f32; 3]; positions.len()];

    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let e1 = sub(positions[b], positions[a]);
        let e2 = sub(positions[c], positions[a]);
        let n = cross(e1, e2);
        for v in [a, b, c] {
            for axis in 0..3 {
                normals[v][axis] += n[axis];
            }
        }
    }

    for n in &mut normals {
        let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        *n = if len > f32::EPSILON {
            [n[0] / len, n[1] / len, n[2] / len]
        } else {
            [0.0, 1.0, 0.0]
        };
    }

    normals
}

#[inline]
fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Shared state between the builder's workers and the artifact's readers.
struct ArtifactState {
    scale: LodScale,
    token: CancellationToken,
    geometry: RwLock<Option<Arc<MeshGeometry>>>,
    collision: RwLock<Option<Arc<CollisionShape>>>,
    geometry_done: AtomicBool,
    collision_done: AtomicBool,
    failed: AtomicBool,
}

/// A mesh that is being, or has been, built.
///
/// Clones observe the same build. The completion flags are set by
/// [`MeshBuilder`] only.
#[derive(Clone)]
pub struct MeshArtifact {
    inner: Arc<ArtifactState>,
}

impl MeshArtifact {
    fn new(scale: LodScale, token: CancellationToken) -> Self {
        Self {
            inner: Arc::new(ArtifactState {
                scale,
                token,
                geometry: RwLock::new(None),
                collision: RwLock::new(None),
                geometry_done: AtomicBool::new(false),
                collision_done: AtomicBool::new(false),
                failed: AtomicBool::new(false),
            }),
        }
    }

    /// LOD scale the mesh was built for.
    #[inline]
    #[must_use]
    pub fn scale(&self) -> LodScale {
        self.inner.scale
    }

    /// True once positions, normals, UVs and bounds are final.
    #[inline]
    #[must_use]
    pub fn is_geometry_done(&self) -> bool {
        self.inner.geometry_done.load(Ordering::Acquire)
    }

    /// True once collision is baked, or was never needed.
    #[inline]
    #[must_use]
    pub fn is_collision_done(&self) -> bool {
        self.inner.collision_done.load(Ordering::Acquire)
    }

    /// True when both flags are set.
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.is_geometry_done() && self.is_collision_done()
    }

    /// True once the build's token was cancelled.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// True if a build phase died without finishing. The flags will
    /// never complete.
    #[inline]
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.inner.failed.load(Ordering::Acquire)
    }

    /// The geometry, once built and until released.
    #[must_use]
    pub fn geometry(&self) -> Option<Arc<MeshGeometry>> {
        self.inner.geometry.read().clone()
    }

    /// The collision shape, for full-detail chunks once baked.
    #[must_use]
    pub fn collision(&self) -> Option<Arc<CollisionShape>> {
        self.inner.collision.read().clone()
    }

    /// Cancels any remaining work and drops the buffers.
    ///
    /// Buffers already handed to a renderer stay alive through their `Arc`.
    pub fn release(&self) {
        self.inner.token.cancel();
        *self.inner.geometry.write() = None;
        *self.inner.collision.write() = None;
    }

    fn publish_geometry(&self, geometry: Arc<MeshGeometry>) {
        *self.inner.geometry.write() = Some(geometry);
        self.inner.geometry_done.store(true, Ordering::Release);
    }

    fn publish_collision(&self, shape: Option<Arc<CollisionShape>>) {
        *self.inner.collision.write() = shape;
        self.inner.collision_done.store(true, Ordering::Release);
    }
}

impl std::fmt::Debug for MeshArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshArtifact")
            .field("scale", &self.scale())
            .field("geometry_done", &self.is_geometry_done())
            .field("collision_done", &self.is_collision_done())
            .field("cancelled", &self.is_cancelled())
            .field("failed", &self.is_failed())
            .finish()
    }
}

/// Owned by one build phase. Marks the artifact failed if dropped before
/// the phase finishes.
struct PhaseGuard {
    artifact: MeshArtifact,
    finished: bool,
}

impl PhaseGuard {
    fn new(artifact: MeshArtifact) -> Self {
        Self {
            artifact,
            finished: false,
        }
    }

    /// Ends the phase and hands back the artifact.
    fn finish(mut self) -> MeshArtifact {
        self.finished = true;
        self.artifact.clone()
    }
}

impl Drop for PhaseGuard {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(scale = ?self.artifact.scale(), "mesh phase died without finishing");
            self.artifact.inner.failed.store(true, Ordering::Release);
        }
    }
}

/// Runs both mesh phases on a worker pool.
#[derive(Clone, Debug)]
pub struct MeshBuilder {
    workers: WorkerPool,
}

impl MeshBuilder {
    /// Creates a builder that schedules onto `workers`.
    #[must_use]
    pub fn new(workers: WorkerPool) -> Self {
        Self { workers }
    }

    /// Starts building a mesh. Returns immediately.
    ///
    /// `size` is the world extent of the chunk. For any `scale` other than
    /// `(1, 1)` the collision flag is already set when this returns.
    #[must_use]
    pub fn build(
        &self,
        heightmap: Arc<Heightmap>,
        size: [f32; 2],
        scale: LodScale,
        height_scale: f32,
        token: CancellationToken,
    ) -> MeshArtifact {
        let artifact = MeshArtifact::new(scale, token.clone());
        let bake_collision = scale.is_finest();

        if !bake_collision {
            artifact.publish_collision(None);
        }

        let geometry_phase = PhaseGuard::new(artifact.clone());
        let workers = self.workers.clone();

        // Results and failures flow through the artifact; the handle is not needed.
        let _ = self.workers.spawn(move || {
            let Some(geometry) = MeshGeometry::from_heightmap(&heightmap, size, scale, height_scale, &token) else {
                tracing::debug!("mesh build cancelled");
                geometry_phase.finish();
                return;
            };
            drop(heightmap);

            let geometry = Arc::new(geometry);
            let output = geometry_phase.finish();
            output.publish_geometry(Arc::clone(&geometry));

            if bake_collision {
                let collision_phase = PhaseGuard::new(output);
                let _ = workers.spawn(move || {
                    let shape = CollisionShape::bake(&geometry, &token);
                    let output = collision_phase.finish();
                    match shape {
                        Some(shape) => output.publish_collision(Some(Arc::new(shape))),
                        None => tracing::debug!("collision bake cancelled"),
                    }
                });
            }
        });

        artifact
    }
}
