//! Per-chunk state.
//!
//! A terrain chunk is an entity on the streaming grid. Its height map arrives
//! asynchronously once, after which per-LOD meshes are built on demand and
//! cached for the chunk's lifetime. The collider, once attached, is never
//! replaced: re-evaluating it near the proximity threshold would churn the
//! physics mesh for no visual gain.

use std::fmt;
use std::sync::Arc;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::TerrainSettings;
use crate::heightmap::HeightMap;
use crate::mesh::MeshData;

/// Integer coordinate on the chunk grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Grid coordinate containing a world-space (x, z) position.
    pub fn from_world(position: Vec2, chunk_world_size: f32) -> Self {
        Self {
            x: (position.x / chunk_world_size).round() as i32,
            y: (position.y / chunk_world_size).round() as i32,
        }
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Axis-aligned square footprint of a chunk in the world XZ plane.
#[derive(Debug, Clone, Copy)]
pub struct ChunkBounds {
    pub center: Vec2,
    pub half_extent: f32,
}

impl ChunkBounds {
    /// Squared distance from `point` to the nearest edge of the box; zero
    /// inside. Visibility and LOD thresholds use this metric rather than
    /// center distance, which matters measurably near chunk borders.
    pub fn sqr_distance(&self, point: Vec2) -> f32 {
        let delta = (point - self.center).abs() - Vec2::splat(self.half_extent);
        delta.max(Vec2::ZERO).length_squared()
    }
}

/// Cache slot for one LOD level's mesh.
///
/// `requested` is sticky: a slot is asked for at most once over the chunk's
/// lifetime, and the built mesh is kept forever.
#[derive(Debug, Clone, Default)]
pub struct LodMeshSlot {
    pub requested: bool,
    pub mesh: Option<Arc<MeshData>>,
}

/// Streaming state for one grid cell.
#[derive(Component)]
pub struct TerrainChunk {
    pub coord: ChunkCoord,
    /// Center of this chunk's height-map sampling window, in samples.
    pub sample_center: Vec2,
    pub bounds: ChunkBounds,
    /// Set exactly once, by the height-map task callback.
    pub height_map: Option<Arc<HeightMap>>,
    /// One slot per configured detail level.
    pub lod_meshes: Vec<LodMeshSlot>,
    /// LOD index of the mesh currently applied for rendering; `None` until
    /// the first mesh lands.
    pub previous_lod_index: Option<usize>,
    pub visible: bool,
    pub has_collider: bool,
}

impl TerrainChunk {
    pub fn new(coord: ChunkCoord, settings: &TerrainSettings) -> Self {
        let world_size = settings.mesh.mesh_world_size();
        let position = Vec2::new(coord.x as f32, coord.y as f32) * world_size;
        Self {
            coord,
            sample_center: position / settings.mesh.mesh_scale,
            bounds: ChunkBounds {
                center: position,
                half_extent: world_size / 2.0,
            },
            height_map: None,
            lod_meshes: vec![LodMeshSlot::default(); settings.detail_levels.len()],
            previous_lod_index: None,
            visible: false,
            has_collider: false,
        }
    }

    /// World-space (x, z) center of the chunk.
    pub fn world_position(&self) -> Vec2 {
        self.bounds.center
    }
}

/// Mesh currently applied for rendering. Inserted (or overwritten) whenever
/// the chunk swaps to a different cached LOD; the renderer reacts to the
/// component change.
#[derive(Component, Clone)]
pub struct ActiveMesh {
    pub lod_index: usize,
    pub mesh: Arc<MeshData>,
}

/// Collision mesh for the physics collaborator. Inserted at most once per
/// chunk.
#[derive(Component, Clone)]
pub struct ChunkCollider {
    pub mesh: Arc<MeshData>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqr_distance_is_zero_inside_the_bounds() {
        let bounds = ChunkBounds {
            center: Vec2::new(100.0, 0.0),
            half_extent: 50.0,
        };
        assert_eq!(bounds.sqr_distance(Vec2::new(100.0, 0.0)), 0.0);
        assert_eq!(bounds.sqr_distance(Vec2::new(149.0, 49.0)), 0.0);
    }

    #[test]
    fn test_sqr_distance_measures_to_the_nearest_edge() {
        let bounds = ChunkBounds {
            center: Vec2::ZERO,
            half_extent: 50.0,
        };
        // Straight out along one axis.
        assert_eq!(bounds.sqr_distance(Vec2::new(80.0, 0.0)), 900.0);
        // Diagonal from the corner.
        let d = bounds.sqr_distance(Vec2::new(53.0, 54.0));
        assert!((d - (9.0 + 16.0)).abs() < 1e-4);
    }

    #[test]
    fn test_chunk_coord_from_world_rounds_to_nearest_cell() {
        assert_eq!(
            ChunkCoord::from_world(Vec2::new(49.0, -49.0), 100.0),
            ChunkCoord::new(0, 0)
        );
        assert_eq!(
            ChunkCoord::from_world(Vec2::new(51.0, 149.0), 100.0),
            ChunkCoord::new(1, 1)
        );
    }
}
