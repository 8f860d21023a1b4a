//! Chunk mesh and visibility application.
//!
//! The terrain crate decides *what* each chunk shows; these systems push
//! that into mesh assets and the visibility hierarchy. A chunk entity gets
//! its render components the first time a mesh is applied; later LOD swaps
//! overwrite the same mesh asset in place.

use bevy::prelude::*;
use bevy::render::mesh::{Indices, PrimitiveTopology};
use bevy::render::render_asset::RenderAssetUsages;

use terrain::chunk::{ActiveMesh, TerrainChunk};
use terrain::mesh::MeshData;
use terrain::streaming::ChunkVisibilityChanged;

/// Shared material for every terrain chunk.
#[derive(Resource)]
pub struct TerrainMaterial(pub Handle<StandardMaterial>);

pub fn setup_terrain_material(
    mut commands: Commands,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let handle = materials.add(StandardMaterial {
        base_color: Color::srgb(0.35, 0.44, 0.27),
        perceptual_roughness: 0.9,
        ..default()
    });
    commands.insert_resource(TerrainMaterial(handle));
}

/// Convert generated buffers into a renderable mesh.
pub fn build_terrain_mesh(data: &MeshData) -> Mesh {
    let positions: Vec<[f32; 3]> = data.positions().iter().map(|p| p.to_array()).collect();
    let normals: Vec<[f32; 3]> = data.normals().iter().map(|n| n.to_array()).collect();
    let uvs: Vec<[f32; 2]> = data.uvs().iter().map(|uv| uv.to_array()).collect();

    Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::RENDER_WORLD | RenderAssetUsages::MAIN_WORLD,
    )
    .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, positions)
    .with_inserted_attribute(Mesh::ATTRIBUTE_NORMAL, normals)
    .with_inserted_attribute(Mesh::ATTRIBUTE_UV_0, uvs)
    .with_inserted_indices(Indices::U32(data.indices().to_vec()))
}

pub fn apply_active_meshes(
    mut commands: Commands,
    material: Res<TerrainMaterial>,
    mut meshes: ResMut<Assets<Mesh>>,
    changed: Query<(Entity, &TerrainChunk, &ActiveMesh, Option<&Mesh3d>), Changed<ActiveMesh>>,
) {
    for (entity, chunk, active, mesh_handle) in &changed {
        let mesh = build_terrain_mesh(&active.mesh);
        match mesh_handle {
            Some(handle) => {
                meshes.insert(&handle.0, mesh);
            }
            None => {
                commands.entity(entity).insert((
                    Mesh3d(meshes.add(mesh)),
                    MeshMaterial3d(material.0.clone()),
                    if chunk.visible {
                        Visibility::Inherited
                    } else {
                        Visibility::Hidden
                    },
                ));
            }
        }
    }
}

pub fn apply_visibility_changes(
    mut events: EventReader<ChunkVisibilityChanged>,
    mut chunks: Query<&mut Visibility, With<TerrainChunk>>,
) {
    for event in events.read() {
        if let Ok(mut visibility) = chunks.get_mut(event.entity) {
            *visibility = if event.visible {
                Visibility::Inherited
            } else {
                Visibility::Hidden
            };
        }
    }
}
