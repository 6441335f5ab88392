//! # Terrain Noise
//!
//! Deterministic height fields for chunk generation.
//!
//! ## Layers
//!
//! ```text
//! SimplexNoise        seeded coherent noise, [-1, 1]
//!      │  remap to [0, 1]
//!      ▼
//! ErodedFractalField  10 octaves, each weighted by local slope
//!      │  sqrt
//!      ▼
//! height in [0, ~1.4]
//! ```
//!
//! ## Determinism Guarantee
//!
//! Given the same `WorldSeed`, every field here produces **exactly** the
//! same values on any platform, any time. No field caches anything.

use std::f64::consts::FRAC_1_SQRT_2;

/// Most octaves a configured field may stack. Amplitude halves per
/// octave, so deeper octaves change heights by less than `f32` precision.
pub const MAX_OCTAVES: u32 = 24;

/// Seed of one generated world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorldSeed(u64);

impl WorldSeed {
    /// Wraps a raw seed.
    #[inline]
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// The raw seed.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Seed of the independent stream `stream` of this world.
    ///
    /// Distinct streams of one seed always give distinct seeds.
    #[inline]
    #[must_use]
    pub const fn derive(self, stream: u64) -> Self {
        Self(splitmix64(self.0 ^ splitmix64(stream)))
    }
}

/// One step of the `SplitMix64` mixer. A bijection on `u64`.
const fn splitmix64(state: u64) -> u64 {
    let mut z = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Unit gradients at 45 degree steps.
const GRADIENTS: [[f64; 2]; 8] = [
    [1.0, 0.0],
    [-1.0, 0.0],
    [0.0, 1.0],
    [0.0, -1.0],
    [FRAC_1_SQRT_2, FRAC_1_SQRT_2],
    [-FRAC_1_SQRT_2, FRAC_1_SQRT_2],
    [FRAC_1_SQRT_2, -FRAC_1_SQRT_2],
    [-FRAC_1_SQRT_2, -FRAC_1_SQRT_2],
];

/// Seeded hash of integer lattice points.
struct Lattice {
    /// A shuffled `0..=255`, stored twice so `i + perm[j]` never wraps.
    perm: [u8; 512],
}

impl Lattice {
    fn shuffled(seed: WorldSeed) -> Self {
        let mut table: [u8; 256] = std::array::from_fn(|i| i as u8);
        let mut state = seed.value();
        for i in (1..table.len()).rev() {
            state = splitmix64(state);
            let j = (state % (i as u64 + 1)) as usize;
            table.swap(i, j);
        }

        let mut perm = [0u8; 512];
        perm[..256].copy_from_slice(&table);
        perm[256..].copy_from_slice(&table);
        Self { perm }
    }

    /// Gradient of lattice point `(i, j)`. Any `i64` wraps onto the table.
    #[inline]
    fn gradient(&self, i: i64, j: i64) -> [f64; 2] {
        let row = usize::from(self.perm[(j & 255) as usize]);
        let hash = self.perm[(i & 255) as usize + row];
        GRADIENTS[usize::from(hash & 7)]
    }
}

/// Seeded 2D simplex noise in `[-1, 1]`.
///
/// Lattice indices are `i64` with wrapping offsets, so any finite input,
/// however large, yields a finite sample.
pub struct SimplexNoise {
    lattice: Lattice,
}

impl SimplexNoise {
    /// `(sqrt(3) - 1) / 2`
    const SKEW: f64 = 0.366_025_403_784_438_6;
    /// `(3 - sqrt(3)) / 6`
    const UNSKEW: f64 = 0.211_324_865_405_187_1;
    /// Brings the summed corner kernels to roughly `[-1, 1]`.
    const AMPLITUDE: f64 = 99.0;

    /// Creates noise for `seed`.
    #[must_use]
    pub fn new(seed: WorldSeed) -> Self {
        Self {
            lattice: Lattice::shuffled(seed),
        }
    }

    /// Noise at `(x, y)`.
    #[must_use]
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let skew = (x + y) * Self::SKEW;
        let cell_x = (x + skew).floor();
        let cell_y = (y + skew).floor();
        let unskew = (cell_x + cell_y) * Self::UNSKEW;

        let x0 = x - (cell_x - unskew);
        let y0 = y - (cell_y - unskew);
        let (step_x, step_y) = if x0 > y0 { (1_i32, 0_i32) } else { (0, 1) };

        // Float to int casts saturate; the wrapping adds below keep the
        // corner indices defined at the saturated ends.
        let (i, j) = (cell_x as i64, cell_y as i64);

        let corners = [
            (0, 0, x0, y0),
            (
                step_x,
                step_y,
                x0 - f64::from(step_x) + Self::UNSKEW,
                y0 - f64::from(step_y) + Self::UNSKEW,
            ),
            (1, 1, x0 - 1.0 + 2.0 * Self::UNSKEW, y0 - 1.0 + 2.0 * Self::UNSKEW),
        ];

        let sum: f64 = corners
            .iter()
            .map(|&(di, dj, dx, dy)| {
                let gradient = self
                    .lattice
                    .gradient(i.wrapping_add(i64::from(di)), j.wrapping_add(i64::from(dj)));
                corner_kernel(dx, dy, gradient)
            })
            .sum();

        (Self::AMPLITUDE * sum).clamp(-1.0, 1.0)
    }
}

/// Radial falloff times the gradient ramp of one simplex corner.
#[inline]
fn corner_kernel(dx: f64, dy: f64, gradient: [f64; 2]) -> f64 {
    let t = 0.5 - dx * dx - dy * dy;
    if t <= 0.0 {
        return 0.0;
    }
    let t2 = t * t;
    t2 * t2 * (gradient[0] * dx + gradient[1] * dy)
}

/// A pure 2D height function.
///
/// Implementations must be deterministic and free of interior state:
/// the heightmap generator samples them from worker threads.
pub trait NoiseField: Send + Sync {
    /// Height at world sample position `(x, y)`.
    fn sample(&self, x: f64, y: f64) -> f32;
}

/// Tuning for [`ErodedFractalField`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ErosionParams {
    /// Number of octaves. Each halves amplitude and doubles frequency.
    pub octaves: u32,
    /// Central difference step for the slope estimate.
    pub gradient_step: f64,
    /// How strongly slope suppresses an octave.
    pub erosion_strength: f64,
}

impl Default for ErosionParams {
    fn default() -> Self {
        Self {
            octaves: 10,
            gradient_step: 0.01,
            erosion_strength: 0.1,
        }
    }
}

/// Fractal noise damped by slope, then square-rooted.
///
/// Per octave the slope of the base noise is estimated by central
/// difference and turned into an erosion weight `1 / (1 + |grad| × k)`.
/// The plain fractal sum is multiplied by the average weight:
///
/// ```text
/// height = sqrt( Σ base(p × 2^i) / 2^i  ×  Σ w_i / octaves )
/// ```
pub struct ErodedFractalField {
    simplex: SimplexNoise,
    params: ErosionParams,
}

impl ErodedFractalField {
    /// Seed purpose for the terrain height stream.
    const HEIGHT_STREAM: u64 = 0x4845_4947_4854;

    /// Creates a field with default tuning.
    #[must_use]
    pub fn new(seed: WorldSeed) -> Self {
        Self::with_params(seed, ErosionParams::default())
    }

    /// Creates a field with explicit tuning.
    #[must_use]
    pub fn with_params(seed: WorldSeed, params: ErosionParams) -> Self {
        Self {
            simplex: SimplexNoise::new(seed.derive(Self::HEIGHT_STREAM)),
            params,
        }
    }

    /// The tuning in use.
    #[inline]
    #[must_use]
    pub const fn params(&self) -> ErosionParams {
        self.params
    }

    /// Base noise remapped to [0, 1].
    #[inline]
    fn base(&self, x: f64, y: f64) -> f64 {
        (self.simplex.sample(x, y) + 1.0) * 0.5
    }

    /// The eroded fractal sum before the square root.
    #[must_use]
    pub fn fractal(&self, x: f64, y: f64) -> f64 {
        let ErosionParams {
            octaves,
            gradient_step: step,
            erosion_strength,
        } = self.params;

        if octaves == 0 {
            return 0.0;
        }

        let mut height = 0.0;
        let mut erosion = 0.0;
        let mut detail = 1.0;
        let mut impact = 1.0;

        for _ in 0..octaves {
            let offset = step * detail;
            let dx = (self.base(x + offset, y) - self.base(x - offset, y)) / (2.0 * step);
            let dy = (self.base(x, y + offset) - self.base(x, y - offset)) / (2.0 * step);
            let gradient = (dx * dx + dy * dy).sqrt();
            erosion += 1.0 / (1.0 + gradient * erosion_strength);

            height += self.base(x * detail, y * detail) * impact;

            detail *= 2.0;
            impact *= 0.5;
        }

        height * (erosion / f64::from(octaves))
    }
}

impl NoiseField for ErodedFractalField {
    fn sample(&self, x: f64, y: f64) -> f32 {
        self.fractal(x, y).max(0.0).sqrt() as f32
    }
}

/// A field that returns the same height everywhere.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstantField(pub f32);

impl NoiseField for ConstantField {
    fn sample(&self, _x: f64, _y: f64) -> f32 {
        self.0
    }
}
