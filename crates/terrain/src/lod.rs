//! Level-of-detail bands.
//!
//! The detail-level table partitions viewer distance into disjoint bands,
//! ordered by ascending threshold. Beyond the last threshold a chunk is
//! invisible.

use serde::{Deserialize, Serialize};

/// One LOD band: chunks within `visible_dist_threshold` of the viewer (and
/// outside every finer band) render at `lod`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LodInfo {
    /// Decimation level fed to the mesh builder; 0 is full detail.
    pub lod: u32,
    pub visible_dist_threshold: f32,
}

impl LodInfo {
    pub fn sqr_visible_dist_threshold(&self) -> f32 {
        self.visible_dist_threshold * self.visible_dist_threshold
    }
}

/// Pick the band for a viewer `distance` (nearest-edge metric).
///
/// Returns `None` when the distance exceeds the last band: the chunk is out
/// of view. Bands are checked in ascending order and the first match wins,
/// so selection is monotonic in distance.
pub fn select_lod_index(detail_levels: &[LodInfo], distance: f32) -> Option<usize> {
    let max_view_dist = detail_levels.last()?.visible_dist_threshold;
    if distance > max_view_dist {
        return None;
    }

    let mut index = 0;
    for (i, level) in detail_levels[..detail_levels.len() - 1].iter().enumerate() {
        if distance > level.visible_dist_threshold {
            index = i + 1;
        } else {
            break;
        }
    }
    Some(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Vec<LodInfo> {
        vec![
            LodInfo {
                lod: 0,
                visible_dist_threshold: 100.0,
            },
            LodInfo {
                lod: 1,
                visible_dist_threshold: 200.0,
            },
            LodInfo {
                lod: 2,
                visible_dist_threshold: 400.0,
            },
        ]
    }

    #[test]
    fn test_band_selection_scenarios() {
        let levels = table();
        assert_eq!(select_lod_index(&levels, 0.0), Some(0));
        assert_eq!(select_lod_index(&levels, 150.0), Some(1));
        assert_eq!(select_lod_index(&levels, 450.0), None);
        // Band edges belong to the finer side.
        assert_eq!(select_lod_index(&levels, 100.0), Some(0));
        assert_eq!(select_lod_index(&levels, 400.0), Some(2));
    }

    #[test]
    fn test_selection_is_monotonic_in_distance() {
        let levels = table();
        let mut previous = 0;
        for step in 0..=800 {
            let distance = step as f32 * 0.5;
            let Some(index) = select_lod_index(&levels, distance) else {
                // Once out of range, it stays out of range.
                assert!(distance > 400.0);
                continue;
            };
            assert!(index >= previous, "LOD regressed at distance {distance}");
            previous = index;
        }
    }

    #[test]
    fn test_single_band_table() {
        let levels = vec![LodInfo {
            lod: 0,
            visible_dist_threshold: 50.0,
        }];
        assert_eq!(select_lod_index(&levels, 10.0), Some(0));
        assert_eq!(select_lod_index(&levels, 60.0), None);
    }

    #[test]
    fn test_empty_table_is_never_visible() {
        assert_eq!(select_lod_index(&[], 0.0), None);
    }
}
