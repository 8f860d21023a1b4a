//! Edge falloff masks for island-style maps.
//!
//! A falloff map attenuates height toward zero near the logical edge of a
//! grid. It is a pure function of the grid size, so generated maps are cached
//! and shared between every chunk of the same size.

use std::collections::HashMap;
use std::sync::Arc;

use bevy::prelude::*;

/// Steepness of the falloff response curve.
const CURVE_STEEPNESS: f32 = 3.0;
/// Pushes the inflection point of the curve toward the map edge.
const CURVE_OFFSET: f32 = 2.2;

/// Radial edge-attenuation grid in [0, 1]: 0 at the center, 1 at the edge.
#[derive(Debug, Clone)]
pub struct FalloffMap {
    pub size: usize,
    pub values: Vec<f32>,
}

impl FalloffMap {
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.values[y * self.size + x]
    }
}

/// Generate the falloff grid for a `size` x `size` map.
pub fn generate_falloff_map(size: usize) -> FalloffMap {
    let mut values = vec![0.0f32; size * size];
    for y in 0..size {
        for x in 0..size {
            // Normalized distance from the center per axis, in [-1, 1]; the
            // mask follows whichever axis is closer to the edge.
            let sample_x = x as f32 / size as f32 * 2.0 - 1.0;
            let sample_y = y as f32 / size as f32 * 2.0 - 1.0;
            let t = sample_x.abs().max(sample_y.abs());
            values[y * size + x] = evaluate(t);
        }
    }
    FalloffMap { size, values }
}

/// Smoothstep-like response: ~0 over the interior plateau, rising steeply to
/// 1 at the edge.
fn evaluate(t: f32) -> f32 {
    let a = CURVE_STEEPNESS;
    let b = CURVE_OFFSET;
    let rising = t.powf(a);
    rising / (rising + (b - b * t).powf(a))
}

/// Memoizes falloff maps by size.
///
/// Chunks request their map through this cache at spawn time; the map itself
/// is shared read-only with background height-map jobs.
#[derive(Resource, Default)]
pub struct FalloffCache {
    maps: HashMap<usize, Arc<FalloffMap>>,
}

impl FalloffCache {
    pub fn get_or_generate(&mut self, size: usize) -> Arc<FalloffMap> {
        self.maps
            .entry(size)
            .or_insert_with(|| Arc::new(generate_falloff_map(size)))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_is_open_and_corners_are_closed() {
        let map = generate_falloff_map(48);
        assert_eq!(map.get(24, 24), 0.0);
        assert_eq!(map.get(0, 0), 1.0);
        assert!(map.get(47, 47) > 0.9);
    }

    #[test]
    fn test_falloff_grows_toward_the_edge() {
        let map = generate_falloff_map(64);
        let row: Vec<f32> = (0..32).rev().map(|x| map.get(x, 32)).collect();
        for pair in row.windows(2) {
            assert!(pair[0] <= pair[1], "falloff must not decrease toward the edge");
        }
    }

    #[test]
    fn test_cache_shares_one_map_per_size() {
        let mut cache = FalloffCache::default();
        let a = cache.get_or_generate(53);
        let b = cache.get_or_generate(53);
        let other = cache.get_or_generate(77);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &other));
        assert_eq!(other.size, 77);
    }
}
