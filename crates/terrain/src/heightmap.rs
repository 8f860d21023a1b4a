//! Height-map assembly: noise, falloff mask, and height response.
//!
//! Wraps the raw noise field with the map-level concerns: an optional island
//! falloff, a response curve shaping how normalized noise turns into world
//! height, and the realized value range used downstream.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::falloff::FalloffMap;
use crate::noise::{generate_noise_map, NoiseSettings};

/// Height response curve: evenly spaced control points over t in [0, 1],
/// sampled with linear interpolation.
///
/// Stands in for an artist-authored curve asset; a single control point is a
/// constant response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeightCurve {
    points: Vec<f32>,
}

impl HeightCurve {
    /// Constant response of 1: height is the noise value times the multiplier.
    pub fn identity() -> Self {
        Self { points: vec![1.0] }
    }

    /// Curve through evenly spaced control points. An empty list degrades to
    /// the identity response.
    pub fn from_points(points: Vec<f32>) -> Self {
        if points.is_empty() {
            Self::identity()
        } else {
            Self { points }
        }
    }

    /// Sample the curve at `t` (clamped to [0, 1]).
    pub fn evaluate(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        let n = self.points.len();
        if n == 1 {
            return self.points[0];
        }
        let scaled = t * (n - 1) as f32;
        let lo = (scaled as usize).min(n - 2);
        let frac = scaled - lo as f32;
        self.points[lo] + (self.points[lo + 1] - self.points[lo]) * frac
    }
}

impl Default for HeightCurve {
    fn default() -> Self {
        Self::identity()
    }
}

/// Everything needed to produce one chunk's height map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeightMapSettings {
    pub noise: NoiseSettings,
    /// World-space height of a fully saturated sample.
    pub height_multiplier: f32,
    pub height_curve: HeightCurve,
    pub use_falloff: bool,
}

impl Default for HeightMapSettings {
    fn default() -> Self {
        Self {
            noise: NoiseSettings::default(),
            height_multiplier: 40.0,
            height_curve: HeightCurve::default(),
            use_falloff: false,
        }
    }
}

/// A generated grid of world-space heights, row major, plus the realized
/// value range. Immutable once built; chunks share it read-only with however
/// many LOD mesh builds need it concurrently.
#[derive(Debug, Clone)]
pub struct HeightMap {
    pub size: usize,
    pub values: Vec<f32>,
    pub min_value: f32,
    pub max_value: f32,
}

impl HeightMap {
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.values[y * self.size + x]
    }
}

/// Build the height map for a `size` x `size` grid centered on
/// `sample_center` (in height-map samples).
///
/// Pipeline: noise field -> optional falloff subtraction (clamped back to
/// [0, 1]) -> height response (`value * curve(value) * height_multiplier`).
pub fn generate_height_map(
    size: usize,
    settings: &HeightMapSettings,
    sample_center: Vec2,
    falloff: Option<&FalloffMap>,
) -> HeightMap {
    let mut values = generate_noise_map(size, &settings.noise, sample_center);

    if let Some(falloff) = falloff {
        debug_assert_eq!(falloff.size, size);
        for (value, attenuation) in values.iter_mut().zip(&falloff.values) {
            *value = (*value - attenuation).clamp(0.0, 1.0);
        }
    }

    let mut min_value = f32::MAX;
    let mut max_value = f32::MIN;
    for value in &mut values {
        *value *= settings.height_curve.evaluate(*value) * settings.height_multiplier;
        min_value = min_value.min(*value);
        max_value = max_value.max(*value);
    }

    HeightMap {
        size,
        values,
        min_value,
        max_value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::falloff::generate_falloff_map;
    use crate::noise::NormalizeMode;

    fn flat_response_settings() -> HeightMapSettings {
        HeightMapSettings {
            noise: NoiseSettings {
                octaves: 3,
                normalize_mode: NormalizeMode::Global,
                ..NoiseSettings::default()
            },
            height_multiplier: 1.0,
            height_curve: HeightCurve::identity(),
            use_falloff: false,
        }
    }

    #[test]
    fn test_height_curve_interpolates_between_points() {
        let curve = HeightCurve::from_points(vec![0.0, 0.5, 1.0]);
        assert_eq!(curve.evaluate(0.0), 0.0);
        assert_eq!(curve.evaluate(0.5), 0.5);
        assert_eq!(curve.evaluate(1.0), 1.0);
        assert_eq!(curve.evaluate(0.25), 0.25);
        // Out-of-range samples clamp.
        assert_eq!(curve.evaluate(-2.0), 0.0);
        assert_eq!(curve.evaluate(3.0), 1.0);
    }

    #[test]
    fn test_empty_curve_degrades_to_identity() {
        let curve = HeightCurve::from_points(Vec::new());
        assert_eq!(curve.evaluate(0.3), 1.0);
    }

    #[test]
    fn test_realized_range_is_tracked() {
        let map = generate_height_map(33, &flat_response_settings(), Vec2::ZERO, None);
        let min = map.values.iter().copied().fold(f32::MAX, f32::min);
        let max = map.values.iter().copied().fold(f32::MIN, f32::max);
        assert_eq!(map.min_value, min);
        assert_eq!(map.max_value, max);
        assert!(min < max);
    }

    #[test]
    fn test_multiplier_scales_heights() {
        let base = generate_height_map(17, &flat_response_settings(), Vec2::ZERO, None);
        let scaled = generate_height_map(
            17,
            &HeightMapSettings {
                height_multiplier: 40.0,
                ..flat_response_settings()
            },
            Vec2::ZERO,
            None,
        );
        for (a, b) in base.values.iter().zip(&scaled.values) {
            assert!((a * 40.0 - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_falloff_zeroes_the_border() {
        let size = 33;
        let falloff = generate_falloff_map(size);
        let map = generate_height_map(size, &flat_response_settings(), Vec2::ZERO, Some(&falloff));
        // The falloff mask is 1 at the very corner, so the height collapses
        // to zero there no matter what the noise produced.
        assert_eq!(map.get(0, 0), 0.0);
        assert!(map.min_value >= 0.0);
    }

    #[test]
    fn test_adjacent_sample_centers_share_boundary_samples() {
        // Two chunks whose sample centers differ by exactly n samples overlap
        // in `size - n` columns; under global normalization those columns
        // must match. This is the seam-continuity contract.
        let size = 53;
        let span = 50.0; // one chunk of world distance, in samples
        let settings = flat_response_settings();

        let left = generate_height_map(size, &settings, Vec2::ZERO, None);
        let right = generate_height_map(size, &settings, Vec2::new(span, 0.0), None);

        for y in 0..size {
            for (x_left, x_right) in (50..53).zip(0..3) {
                let a = left.get(x_left, y);
                let b = right.get(x_right, y);
                assert!(
                    (a - b).abs() < 1e-3,
                    "seam mismatch at y={y}: {a} vs {b}"
                );
            }
        }
    }
}
