//! Presentation layer: turns streamed terrain state into Bevy render state
//! and owns the fly camera that doubles as the streaming viewer.

use bevy::prelude::*;

pub mod camera;
pub mod terrain_render;

pub struct RenderingPlugin;

impl Plugin for RenderingPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Startup,
            (camera::setup_camera, terrain_render::setup_terrain_material),
        )
        .add_systems(
            Update,
            (
                camera::fly_camera,
                terrain_render::apply_active_meshes,
                terrain_render::apply_visibility_changes,
            ),
        );
    }
}
