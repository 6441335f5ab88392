//! # Streaming Configuration
//!
//! Loaded once at startup, from TOML or built in code. Every field has a
//! default, so an empty file is a valid configuration.
//!
//! ```toml
//! max_lod = 4
//! replan_interval_secs = 1.0
//! chunk_size = 100.0
//! height_scale = 1000.0
//!
//! [noise]
//! seed = 12345
//! octaves = 10
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use horizon_core::MAX_LOD_LEVEL;
use horizon_procedural::{ErosionParams, WorldSeed, DEFAULT_RESOLUTION_ADJUSTMENT, MAX_OCTAVES};

use crate::error::{StreamingError, StreamingResult};

/// Default world seed. Kept below `i64::MAX` so it survives TOML.
pub const DEFAULT_SEED: u64 = 0x0C0F_FEE0_5EED;

/// Terrain noise tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// World seed.
    pub seed: u64,
    /// Fractal octaves.
    pub octaves: u32,
    /// Central difference step for the erosion slope estimate.
    pub gradient_step: f64,
    /// Slope damping strength.
    pub erosion_strength: f64,
    /// Divisor applied to world positions before sampling.
    pub resolution_adjustment: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        let erosion = ErosionParams::default();
        Self {
            seed: DEFAULT_SEED,
            octaves: erosion.octaves,
            gradient_step: erosion.gradient_step,
            erosion_strength: erosion.erosion_strength,
            resolution_adjustment: DEFAULT_RESOLUTION_ADJUSTMENT,
        }
    }
}

impl NoiseConfig {
    /// The seed as a [`WorldSeed`].
    #[must_use]
    pub const fn world_seed(&self) -> WorldSeed {
        WorldSeed::new(self.seed)
    }

    /// The erosion tuning.
    #[must_use]
    pub const fn erosion(&self) -> ErosionParams {
        ErosionParams {
            octaves: self.octaves,
            gradient_step: self.gradient_step,
            erosion_strength: self.erosion_strength,
        }
    }
}

/// Streaming configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Outermost ring level. Pool capacity follows from it.
    pub max_lod: u32,
    /// Seconds between re-plans.
    pub replan_interval_secs: f64,
    /// World extent of a level-0 chunk.
    pub chunk_size: f32,
    /// Vertical scale applied to heightmap samples.
    pub height_scale: f32,
    /// Worker threads; 0 picks from available parallelism.
    pub worker_threads: usize,
    /// Generation tasks started per tick; absent drains the queue.
    pub max_generation_per_tick: Option<usize>,
    /// Chebyshev radius (in chunks) beyond which idle nodes are pruned;
    /// absent uses twice the ring extent.
    pub node_retention_radius: Option<u32>,
    /// Noise tuning.
    pub noise: NoiseConfig,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            max_lod: 4,
            replan_interval_secs: 1.0,
            chunk_size: horizon_core::DEFAULT_CHUNK_SIZE,
            height_scale: 1000.0,
            worker_threads: 0,
            max_generation_per_tick: None,
            node_retention_radius: None,
            noise: NoiseConfig::default(),
        }
    }
}

impl StreamingConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`StreamingError::ConfigParse`] or [`StreamingError::InvalidConfig`].
    pub fn from_toml_str(text: &str) -> StreamingResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`StreamingError::Io`] if the file cannot be read, otherwise as
    /// [`StreamingConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> StreamingResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!(path = %path.as_ref().display(), max_lod = config.max_lod, "loaded streaming config");
        Ok(config)
    }

    /// Checks every value is usable.
    ///
    /// # Errors
    ///
    /// [`StreamingError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> StreamingResult<()> {
        if self.max_lod > MAX_LOD_LEVEL {
            return Err(StreamingError::InvalidConfig(format!(
                "max_lod {} exceeds {MAX_LOD_LEVEL}",
                self.max_lod
            )));
        }
        if !(self.replan_interval_secs.is_finite() && self.replan_interval_secs > 0.0) {
            return Err(StreamingError::InvalidConfig(format!(
                "replan_interval_secs must be positive, got {}",
                self.replan_interval_secs
            )));
        }
        if !(self.chunk_size.is_finite() && self.chunk_size > 0.0) {
            return Err(StreamingError::InvalidConfig(format!(
                "chunk_size must be positive, got {}",
                self.chunk_size
            )));
        }
        if !self.height_scale.is_finite() {
            return Err(StreamingError::InvalidConfig("height_scale must be finite".into()));
        }
        if self.max_generation_per_tick == Some(0) {
            return Err(StreamingError::InvalidConfig(
                "max_generation_per_tick must be at least 1".into(),
            ));
        }
        if self.noise.octaves > MAX_OCTAVES {
            return Err(StreamingError::InvalidConfig(format!(
                "noise.octaves {} exceeds {MAX_OCTAVES}",
                self.noise.octaves
            )));
        }
        if !(self.noise.gradient_step.is_finite() && self.noise.gradient_step > 0.0) {
            return Err(StreamingError::InvalidConfig(format!(
                "noise.gradient_step must be positive, got {}",
                self.noise.gradient_step
            )));
        }
        if !(self.noise.resolution_adjustment.is_finite() && self.noise.resolution_adjustment > 0.0) {
            return Err(StreamingError::InvalidConfig(format!(
                "noise.resolution_adjustment must be positive, got {}",
                self.noise.resolution_adjustment
            )));
        }
        Ok(())
    }

    /// Pool slots needed for one full ring set: `1 + 8 × (max_lod + 1)`.
    #[inline]
    #[must_use]
    pub const fn pool_capacity(&self) -> usize {
        1 + 8 * (self.max_lod as usize + 1)
    }

    /// Re-plan interval as a [`Duration`].
    #[must_use]
    pub fn replan_interval(&self) -> Duration {
        Duration::from_secs_f64(self.replan_interval_secs)
    }

    /// Half-width, in chunks, of the area covered by the outermost ring.
    #[must_use]
    pub const fn ring_extent(&self) -> u32 {
        // Ring L reaches (3^(L+1) - 1) / 2 chunks from the centre.
        (3u32.saturating_pow(self.max_lod + 1) - 1) / 2
    }

    /// Pruning radius in chunks.
    #[must_use]
    pub fn retention_radius(&self) -> u32 {
        self.node_retention_radius
            .unwrap_or_else(|| self.ring_extent().saturating_mul(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StreamingConfig::default();
        assert_eq!(config.max_lod, 4);
        assert_eq!(config.pool_capacity(), 41);
        assert_eq!(config.replan_interval(), Duration::from_secs(1));
        assert_eq!(config.chunk_size, 100.0);
        assert_eq!(config.height_scale, 1000.0);
        assert_eq!(config.noise.octaves, 10);
        assert_eq!(config.noise.resolution_adjustment, 5000.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(StreamingConfig::from_toml_str("").unwrap(), StreamingConfig::default());
    }

    #[test]
    fn test_partial_toml() {
        let config = StreamingConfig::from_toml_str(
            r#"
            max_lod = 2
            max_generation_per_tick = 3

            [noise]
            seed = 77
            "#,
        )
        .unwrap();

        assert_eq!(config.max_lod, 2);
        assert_eq!(config.pool_capacity(), 25);
        assert_eq!(config.max_generation_per_tick, Some(3));
        assert_eq!(config.noise.seed, 77);
        assert_eq!(config.noise.octaves, 10);
        assert_eq!(config.replan_interval_secs, 1.0);
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut config = StreamingConfig::default();
        config.node_retention_radius = Some(90);
        let text = toml::to_string(&config).unwrap();
        assert_eq!(StreamingConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_rejects_bad_values() {
        for text in [
            "max_lod = 13",
            "replan_interval_secs = 0.0",
            "chunk_size = -1.0",
            "max_generation_per_tick = 0",
            "[noise]\ngradient_step = 0.0",
            "[noise]\noctaves = 25",
            "[noise]\noctaves = 40",
        ] {
            assert!(
                matches!(StreamingConfig::from_toml_str(text), Err(StreamingError::InvalidConfig(_))),
                "accepted {text:?}"
            );
        }
    }

    #[test]
    fn test_deepest_octave_count_accepted() {
        let config = StreamingConfig::from_toml_str(&format!("[noise]\noctaves = {MAX_OCTAVES}")).unwrap();
        assert_eq!(config.noise.erosion().octaves, 24);
    }

    #[test]
    fn test_rejects_malformed_toml() {
        assert!(matches!(
            StreamingConfig::from_toml_str("max_lod = \"four\""),
            Err(StreamingError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            StreamingConfig::load("/nonexistent/horizon.toml"),
            Err(StreamingError::Io(_))
        ));
    }

    #[test]
    fn test_ring_extent_and_retention() {
        let mut config = StreamingConfig::default();
        config.max_lod = 0;
        assert_eq!(config.ring_extent(), 1);
        config.max_lod = 1;
        assert_eq!(config.ring_extent(), 4);
        config.max_lod = 4;
        assert_eq!(config.ring_extent(), 121);
        assert_eq!(config.retention_radius(), 242);
        config.node_retention_radius = Some(10);
        assert_eq!(config.retention_radius(), 10);
    }
}
