//! Endless procedural terrain: fractal noise, LOD meshing, chunk streaming.
//!
//! The pipeline, leaf first: `noise` produces deterministic scalar fields,
//! `heightmap` shapes them into world heights (falloff mask + response
//! curve), `mesh` triangulates a height map at a LOD level with seam-safe
//! stitching, and `streaming` keeps the grid of chunks around the viewer
//! alive, dispatching generation through `work_queue` so the frame never
//! blocks. Rendering and physics consume the resulting components
//! (`ActiveMesh`, `ChunkCollider`) and events; this crate does not touch
//! mesh assets or materials itself.

use bevy::prelude::*;

pub mod chunk;
pub mod config;
pub mod falloff;
pub mod heightmap;
pub mod lod;
pub mod mesh;
pub mod noise;
pub mod streaming;
pub mod work_queue;


use config::TerrainSettings;
use falloff::FalloffCache;
use streaming::{
    ChunkColliderReady, ChunkRegistry, ChunkVisibilityChanged, HeightMapTasks, MeshTasks,
    ViewerTracker,
};

/// Streams terrain chunks around the entity tagged
/// [`streaming::TerrainViewer`].
///
/// Supply a [`TerrainSettings`] resource before adding the plugin to
/// override the defaults; invalid settings abort at startup.
pub struct TerrainPlugin;

impl Plugin for TerrainPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<TerrainSettings>()
            .init_resource::<ViewerTracker>()
            .init_resource::<ChunkRegistry>()
            .init_resource::<FalloffCache>()
            .init_resource::<HeightMapTasks>()
            .init_resource::<MeshTasks>()
            .add_event::<ChunkVisibilityChanged>()
            .add_event::<ChunkColliderReady>()
            .add_systems(Startup, config::validate_settings)
            .add_systems(
                Update,
                (
                    streaming::poll_viewer,
                    streaming::apply_completed_height_maps,
                    streaming::apply_completed_meshes,
                    streaming::update_collision_meshes,
                    streaming::update_visible_chunks,
                )
                    .chain(),
            );
    }
}
