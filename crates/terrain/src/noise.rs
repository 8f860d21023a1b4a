//! Fractal coherent-noise field generation.
//!
//! Accumulates Perlin octaves at geometrically increasing frequency and
//! geometrically decreasing amplitude into a deterministic, seed-reproducible
//! scalar field. Sampling is centered on the grid and shifted by an external
//! sample center, so adjacent chunks read out of one continuous field.

use bevy::prelude::*;
use fastnoise_lite::{FastNoiseLite, NoiseType};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Floor applied to non-positive noise scales. Scale divides the sample
/// coordinates, so zero must never reach the sampling loop.
pub const MIN_NOISE_SCALE: f32 = 1e-4;

/// Per-octave random offsets are drawn from this half-open range.
const OCTAVE_OFFSET_RANGE: i32 = 100_000;

/// Global normalization divides by the theoretical maximum amplitude sum,
/// scaled back by this factor: realized octave sums almost never approach the
/// theoretical bound, and dividing by the full sum would waste most of the
/// output range.
const GLOBAL_NORMALIZATION_HEADROOM: f32 = 0.9;

/// How a generated noise grid is remapped into the nominal [0, 1] range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NormalizeMode {
    /// Remap by the realized min/max of this grid alone. Uses the full
    /// [0, 1] range but independently normalized grids do not tile.
    Local,
    /// Remap by the maximum possible amplitude sum. Slightly compressed
    /// range, but independently generated grids stay continuous.
    #[default]
    Global,
}

/// Parameters of the fractal noise field.
///
/// Values are not rejected: [`NoiseSettings::sanitized`] clamps anything
/// degenerate before generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseSettings {
    /// Spatial scale of the lowest octave, in height-map samples per noise unit.
    pub scale: f32,
    pub octaves: u32,
    /// Amplitude falloff per octave, in [0, 1].
    pub persistence: f32,
    /// Frequency growth per octave, >= 1.
    pub lacunarity: f32,
    pub seed: u64,
    /// User-facing scroll offset, applied on top of the per-chunk sample center.
    pub offset: Vec2,
    pub normalize_mode: NormalizeMode,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            scale: 50.0,
            octaves: 6,
            persistence: 0.5,
            lacunarity: 2.0,
            seed: 0,
            offset: Vec2::ZERO,
            normalize_mode: NormalizeMode::Global,
        }
    }
}

impl NoiseSettings {
    /// Returns a copy with every degenerate value clamped to the nearest safe
    /// one. Generation always goes through this, so invalid settings soften
    /// into valid ones instead of failing mid-stream.
    pub fn sanitized(&self) -> Self {
        Self {
            scale: if self.scale <= 0.0 {
                MIN_NOISE_SCALE
            } else {
                self.scale
            },
            octaves: self.octaves.max(1),
            persistence: self.persistence.clamp(0.0, 1.0),
            lacunarity: self.lacunarity.max(1.0),
            ..self.clone()
        }
    }
}

/// Generate a `size` x `size` grid of noise values, row major.
///
/// Deterministic: the same (settings, sample_center) pair always produces the
/// same grid, across calls and across processes. `sample_center` is expressed
/// in height-map samples; two grids whose centers differ by exactly `n`
/// samples overlap in `size - n` columns with matching values.
pub fn generate_noise_map(size: usize, settings: &NoiseSettings, sample_center: Vec2) -> Vec<f32> {
    let settings = settings.sanitized();

    // One random 2D offset per octave, derived from the seed, decorrelates
    // the octaves; the user offset and the chunk's sample center ride along.
    // Offsets and sample coordinates are summed in f64: the random offsets
    // reach +/-100k, where the f32 lattice spacing (~0.008) is already coarse
    // enough to make shared samples of adjacent chunks drift apart.
    let mut rng = ChaCha8Rng::seed_from_u64(settings.seed);
    let mut octave_offsets = Vec::with_capacity(settings.octaves as usize);
    let mut max_possible_height = 0.0f32;
    let mut amplitude = 1.0f32;
    for _ in 0..settings.octaves {
        let offset_x = rng.gen_range(-OCTAVE_OFFSET_RANGE..OCTAVE_OFFSET_RANGE) as f64
            + settings.offset.x as f64
            + sample_center.x as f64;
        let offset_y = rng.gen_range(-OCTAVE_OFFSET_RANGE..OCTAVE_OFFSET_RANGE) as f64
            + settings.offset.y as f64
            + sample_center.y as f64;
        octave_offsets.push((offset_x, offset_y));
        max_possible_height += amplitude;
        amplitude *= settings.persistence;
    }

    let mut perlin = FastNoiseLite::with_seed(settings.seed as i32);
    perlin.set_noise_type(Some(NoiseType::Perlin));
    perlin.set_frequency(Some(1.0));

    let scale = settings.scale as f64;
    let half = size as f64 / 2.0;

    let mut values = vec![0.0f32; size * size];
    let mut min_value = f32::MAX;
    let mut max_value = f32::MIN;

    for y in 0..size {
        for x in 0..size {
            let mut amplitude = 1.0f32;
            let mut frequency = 1.0f64;
            let mut height = 0.0f32;

            for &(offset_x, offset_y) in &octave_offsets {
                let sample_x = ((x as f64 - half + offset_x) / scale * frequency) as f32;
                let sample_y = ((y as f64 - half + offset_y) / scale * frequency) as f32;

                // Perlin returns [-1, 1], so octaves can cancel each other.
                height += perlin.get_noise_2d(sample_x, sample_y) * amplitude;

                amplitude *= settings.persistence;
                frequency *= settings.lacunarity as f64;
            }

            min_value = min_value.min(height);
            max_value = max_value.max(height);
            values[y * size + x] = height;
        }
    }

    match settings.normalize_mode {
        NormalizeMode::Local => {
            let range = max_value - min_value;
            for value in &mut values {
                *value = if range > f32::EPSILON {
                    (*value - min_value) / range
                } else {
                    0.0
                };
            }
        }
        NormalizeMode::Global => {
            // No upper clamp: a grid that genuinely reaches the theoretical
            // amplitude sum may slightly exceed 1.
            for value in &mut values {
                *value =
                    (GLOBAL_NORMALIZATION_HEADROOM * (*value + 1.0) / max_possible_height).max(0.0);
            }
        }
    }

    values
}
