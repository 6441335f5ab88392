//! # Collision Baking
//!
//! Turns finished chunk geometry into a shape that answers vertical
//! queries quickly. Triangles are bucketed into a uniform XZ grid; a
//! query only tests the triangles of one cell.
//!
//! ```text
//!   z ▲  ┌───┬───┬───┐
//!     │  │ ▲▼│▲▼ │ ▲▼│   each cell lists every triangle whose
//!     │  ├───┼───┼───┤   XZ bounding box overlaps it
//!     │  │▲▼ │ ▲▼│▲▼ │
//!     │  └───┴───┴───┘
//!     └──────────────► x
//! ```

use horizon_core::CancellationToken;

use crate::mesh::{Aabb, MeshGeometry};

/// Cells per axis of the lookup grid.
pub const COLLISION_GRID_CELLS: usize = 32;

/// Tolerance for points lying on a triangle edge.
const EDGE_EPSILON: f32 = 1e-5;

/// Baked collision data for one chunk.
#[derive(Clone, Debug)]
pub struct CollisionShape {
    vertices: Vec<[f32; 3]>,
    triangles: Vec<[u32; 3]>,
    bounds: Aabb,
    cell_size: [f32; 2],
    cells: Vec<Vec<u32>>,
}

impl CollisionShape {
    /// Bakes a shape from geometry.
    ///
    /// Checks `token` between batches of triangles and returns `None`
    /// once it is cancelled.
    #[must_use]
    pub fn bake(geometry: &MeshGeometry, token: &CancellationToken) -> Option<Self> {
        let bounds = geometry.bounds;
        let extent = bounds.size();
        let cell_size = [
            (extent[0] / COLLISION_GRID_CELLS as f32).max(f32::EPSILON),
            (extent[2] / COLLISION_GRID_CELLS as f32).max(f32::EPSILON),
        ];

        let triangles: Vec<[u32; 3]> = geometry
            .indices
            .chunks_exact(3)
            .map(|tri| [tri[0], tri[1], tri[2]])
            .collect();

        let mut cells = vec![Vec::new(); COLLISION_GRID_CELLS * COLLISION_GRID_CELLS];

        for (batch_index, batch) in triangles.chunks(4096).enumerate() {
            if token.is_cancelled() {
                return None;
            }

            for (offset, tri) in batch.iter().enumerate() {
                let id = (batch_index * 4096 + offset) as u32;
                let [a, b, c] = tri.map(|i| geometry.positions[i as usize]);

                let min_x = a[0].min(b[0]).min(c[0]);
                let max_x = a[0].max(b[0]).max(c[0]);
                let min_z = a[2].min(b[2]).min(c[2]);
                let max_z = a[2].max(b[2]).max(c[2]);

                let (cx0, cz0) = Self::cell_coords(&bounds, cell_size, min_x, min_z);
                let (cx1, cz1) = Self::cell_coords(&bounds, cell_size, max_x, max_z);

                for cx in cx0..=cx1 {
                    for cz in cz0..=cz1 {
                        cells[cx * COLLISION_GRID_CELLS + cz].push(id);
                    }
                }
            }
        }

        Some(Self {
            vertices: geometry.positions.clone(),
            triangles,
            bounds,
            cell_size,
            cells,
        })
    }

    fn cell_coords(bounds: &Aabb, cell_size: [f32; 2], x: f32, z: f32) -> (usize, usize) {
        let last = COLLISION_GRID_CELLS - 1;
        let cx = ((x - bounds.min[0]) / cell_size[0]).floor().max(0.0) as usize;
        let cz = ((z - bounds.min[2]) / cell_size[1]).floor().max(0.0) as usize;
        (cx.min(last), cz.min(last))
    }

    /// Number of triangles.
    #[inline]
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Bounding box in chunk-local space.
    #[inline]
    #[must_use]
    pub const fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Surface height at chunk-local `(x, z)`, or `None` off the surface.
    #[must_use]
    pub fn height_at(&self, x: f32, z: f32) -> Option<f32> {
        let b = &self.bounds;
        if x < b.min[0] || x > b.max[0] || z < b.min[2] || z > b.max[2] {
            return None;
        }

        let (cx, cz) = Self::cell_coords(b, self.cell_size, x, z);

        self.cells[cx * COLLISION_GRID_CELLS + cz].iter().find_map(|&id| {
            let [a, b, c] = self.triangles[id as usize].map(|i| self.vertices[i as usize]);
            barycentric_height([x, z], a, b, c)
        })
    }
}

/// Height of triangle `abc` above XZ point `p`, if `p` lies inside it.
fn barycentric_height(p: [f32; 2], a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> Option<f32> {
    let v0 = [b[0] - a[0], b[2] - a[2]];
    let v1 = [c[0] - a[0], c[2] - a[2]];
    let v2 = [p[0] - a[0], p[1] - a[2]];

    let den = v0[0] * v1[1] - v1[0] * v0[1];
    if den.abs() < f32::EPSILON {
        return None;
    }

    let u = (v2[0] * v1[1] - v1[0] * v2[1]) / den;
    let v = (v0[0] * v2[1] - v2[0] * v0[1]) / den;
    let w = 1.0 - u - v;

    if u < -EDGE_EPSILON || v < -EDGE_EPSILON || w < -EDGE_EPSILON {
        return None;
    }

    Some(a[1] * w + b[1] * u + c[1] * v)
}
