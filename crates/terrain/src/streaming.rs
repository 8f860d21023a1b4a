//! Chunk streaming around a moving viewer.
//!
//! Once per tick: poll the viewer position, drain completed background work,
//! refresh collision meshes if the viewer moved at all, and recompute the
//! visible-chunk set once the viewer has moved far enough to matter. Chunks
//! are created the first time their coordinate enters the view radius and
//! are never destroyed; a chunk that drifts out of range simply stops
//! receiving updates until the viewer comes back.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bevy::prelude::*;

use crate::chunk::{ActiveMesh, ChunkCollider, ChunkCoord, TerrainChunk};
use crate::config::{
    TerrainSettings, COLLIDER_GENERATION_DISTANCE_THRESHOLD,
    SQR_VIEWER_MOVE_THRESHOLD_FOR_CHUNK_UPDATE,
};
use crate::falloff::FalloffCache;
use crate::heightmap::{generate_height_map, HeightMap};
use crate::lod::select_lod_index;
use crate::mesh::{generate_terrain_mesh, MeshData};
use crate::work_queue::WorkQueue;

/// Marker for the entity whose translation drives streaming (usually the
/// camera rig).
#[derive(Component)]
pub struct TerrainViewer;

/// Viewer position as sampled at the top of the current tick.
#[derive(Resource, Default)]
pub struct ViewerTracker {
    pub position: Vec2,
    last_chunk_update_position: Vec2,
    moved_this_tick: bool,
    has_viewer: bool,
    initialized: bool,
}

/// Sparse grid of spawned chunks plus the event-maintained visible list.
///
/// The visible list is updated from chunk visibility transitions, never by
/// rescanning the whole map.
#[derive(Resource, Default)]
pub struct ChunkRegistry {
    chunks: HashMap<ChunkCoord, Entity>,
    visible: Vec<Entity>,
}

impl ChunkRegistry {
    pub fn chunk_at(&self, coord: ChunkCoord) -> Option<Entity> {
        self.chunks.get(&coord).copied()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn visible(&self) -> &[Entity] {
        &self.visible
    }

    fn insert(&mut self, coord: ChunkCoord, entity: Entity) {
        self.chunks.insert(coord, entity);
    }

    fn set_visible(&mut self, entity: Entity, visible: bool) {
        if visible {
            if !self.visible.contains(&entity) {
                self.visible.push(entity);
            }
        } else {
            self.visible.retain(|&e| e != entity);
        }
    }
}

/// In-flight height-map jobs, keyed by chunk coordinate.
#[derive(Resource, Default)]
pub struct HeightMapTasks(pub WorkQueue<ChunkCoord, HeightMap>);

/// In-flight mesh jobs, keyed by (chunk coordinate, LOD index).
#[derive(Resource, Default)]
pub struct MeshTasks(pub WorkQueue<(ChunkCoord, usize), MeshData>);

/// A chunk entered or left the view range.
#[derive(Event, Debug, Clone, Copy)]
pub struct ChunkVisibilityChanged {
    pub entity: Entity,
    pub coord: ChunkCoord,
    pub visible: bool,
}

/// A chunk's collision mesh is attached and final.
#[derive(Event, Debug, Clone, Copy)]
pub struct ChunkColliderReady {
    pub entity: Entity,
    pub coord: ChunkCoord,
}

pub fn poll_viewer(
    viewer: Query<&Transform, With<TerrainViewer>>,
    mut tracker: ResMut<ViewerTracker>,
) {
    let Ok(transform) = viewer.get_single() else {
        tracker.moved_this_tick = false;
        return;
    };
    let position = Vec2::new(transform.translation.x, transform.translation.z);
    tracker.moved_this_tick = !tracker.has_viewer || position != tracker.position;
    tracker.position = position;
    tracker.has_viewer = true;
}

/// Drain finished height maps and run the receiving chunks' update logic, as
/// if a normal tick had just observed them.
#[allow(clippy::too_many_arguments)]
pub fn apply_completed_height_maps(
    mut commands: Commands,
    settings: Res<TerrainSettings>,
    tracker: Res<ViewerTracker>,
    mut registry: ResMut<ChunkRegistry>,
    mut height_map_tasks: ResMut<HeightMapTasks>,
    mut mesh_tasks: ResMut<MeshTasks>,
    mut chunks: Query<&mut TerrainChunk>,
    mut visibility_events: EventWriter<ChunkVisibilityChanged>,
) {
    for (coord, height_map) in height_map_tasks.0.drain() {
        let Some(entity) = registry.chunk_at(coord) else {
            continue;
        };
        let Ok(mut chunk) = chunks.get_mut(entity) else {
            continue;
        };
        debug_assert!(chunk.height_map.is_none(), "height map delivered twice");
        chunk.height_map = Some(Arc::new(height_map));
        update_chunk(
            &mut commands,
            entity,
            &mut chunk,
            &settings,
            tracker.position,
            &mut registry,
            &mut mesh_tasks,
            &mut visibility_events,
        );
    }
}

/// Drain finished LOD meshes into their chunks' cache slots and re-run the
/// chunk update so a waiting LOD swap applies immediately.
#[allow(clippy::too_many_arguments)]
pub fn apply_completed_meshes(
    mut commands: Commands,
    settings: Res<TerrainSettings>,
    tracker: Res<ViewerTracker>,
    mut registry: ResMut<ChunkRegistry>,
    mut mesh_tasks: ResMut<MeshTasks>,
    mut chunks: Query<&mut TerrainChunk>,
    mut visibility_events: EventWriter<ChunkVisibilityChanged>,
    mut collider_events: EventWriter<ChunkColliderReady>,
) {
    for ((coord, lod_index), mesh) in mesh_tasks.0.drain() {
        let Some(entity) = registry.chunk_at(coord) else {
            continue;
        };
        let Ok(mut chunk) = chunks.get_mut(entity) else {
            continue;
        };
        chunk.lod_meshes[lod_index].mesh = Some(Arc::new(mesh));

        update_chunk(
            &mut commands,
            entity,
            &mut chunk,
            &settings,
            tracker.position,
            &mut registry,
            &mut mesh_tasks,
            &mut visibility_events,
        );
        if lod_index == settings.collider_lod_index {
            update_collider(
                &mut commands,
                entity,
                &mut chunk,
                &settings,
                tracker.position,
                &mut mesh_tasks,
                &mut collider_events,
            );
        }
    }
}

/// Collider maintenance for visible chunks, whenever the viewer moved.
pub fn update_collision_meshes(
    mut commands: Commands,
    settings: Res<TerrainSettings>,
    tracker: Res<ViewerTracker>,
    registry: Res<ChunkRegistry>,
    mut mesh_tasks: ResMut<MeshTasks>,
    mut chunks: Query<&mut TerrainChunk>,
    mut collider_events: EventWriter<ChunkColliderReady>,
) {
    if !tracker.moved_this_tick {
        return;
    }
    for entity in registry.visible().to_vec() {
        if let Ok(mut chunk) = chunks.get_mut(entity) {
            update_collider(
                &mut commands,
                entity,
                &mut chunk,
                &settings,
                tracker.position,
                &mut mesh_tasks,
                &mut collider_events,
            );
        }
    }
}

/// Recompute which chunks must exist and refresh every chunk in range.
///
/// Runs on the first tick with a viewer and afterwards only when the viewer
/// has moved beyond the update threshold. Previously visible chunks are
/// updated first so ones that just left the radius still get the tick that
/// hides them.
#[allow(clippy::too_many_arguments)]
pub fn update_visible_chunks(
    mut commands: Commands,
    settings: Res<TerrainSettings>,
    mut tracker: ResMut<ViewerTracker>,
    mut registry: ResMut<ChunkRegistry>,
    mut height_map_tasks: ResMut<HeightMapTasks>,
    mut mesh_tasks: ResMut<MeshTasks>,
    mut falloff_cache: ResMut<FalloffCache>,
    mut chunks: Query<&mut TerrainChunk>,
    mut visibility_events: EventWriter<ChunkVisibilityChanged>,
) {
    if !tracker.has_viewer {
        return;
    }
    let moved_sqr = (tracker.position - tracker.last_chunk_update_position).length_squared();
    if tracker.initialized && moved_sqr <= SQR_VIEWER_MOVE_THRESHOLD_FOR_CHUNK_UPDATE {
        return;
    }
    tracker.initialized = true;
    tracker.last_chunk_update_position = tracker.position;

    let mut already_updated: HashSet<ChunkCoord> = HashSet::new();
    for entity in registry.visible().to_vec() {
        if let Ok(mut chunk) = chunks.get_mut(entity) {
            already_updated.insert(chunk.coord);
            update_chunk(
                &mut commands,
                entity,
                &mut chunk,
                &settings,
                tracker.position,
                &mut registry,
                &mut mesh_tasks,
                &mut visibility_events,
            );
        }
    }

    let world_size = settings.mesh.mesh_world_size();
    let view_radius = settings.chunks_visible_in_view_dist();
    let current = ChunkCoord::from_world(tracker.position, world_size);

    for y_offset in -view_radius..=view_radius {
        for x_offset in -view_radius..=view_radius {
            let coord = ChunkCoord::new(current.x + x_offset, current.y + y_offset);
            if already_updated.contains(&coord) {
                continue;
            }
            if let Some(entity) = registry.chunk_at(coord) {
                if let Ok(mut chunk) = chunks.get_mut(entity) {
                    update_chunk(
                        &mut commands,
                        entity,
                        &mut chunk,
                        &settings,
                        tracker.position,
                        &mut registry,
                        &mut mesh_tasks,
                        &mut visibility_events,
                    );
                }
            } else {
                spawn_chunk(
                    &mut commands,
                    coord,
                    &settings,
                    &mut registry,
                    &mut height_map_tasks,
                    &mut falloff_cache,
                );
            }
        }
    }
}

fn spawn_chunk(
    commands: &mut Commands,
    coord: ChunkCoord,
    settings: &TerrainSettings,
    registry: &mut ChunkRegistry,
    height_map_tasks: &mut HeightMapTasks,
    falloff_cache: &mut FalloffCache,
) {
    let chunk = TerrainChunk::new(coord, settings);
    let position = chunk.world_position();
    let sample_center = chunk.sample_center;

    let entity = commands
        .spawn((chunk, Transform::from_xyz(position.x, 0.0, position.y)))
        .id();
    registry.insert(coord, entity);

    let size = settings.mesh.num_verts_per_line();
    let height_map_settings = settings.height_map.clone();
    let falloff = settings
        .height_map
        .use_falloff
        .then(|| falloff_cache.get_or_generate(size));

    let accepted = height_map_tasks.0.submit(coord, move || {
        generate_height_map(size, &height_map_settings, sample_center, falloff.as_deref())
    });
    debug_assert!(accepted, "chunk {coord} spawned twice");
    debug!("spawned terrain chunk {coord} at ({}, {})", position.x, position.y);
}

/// The per-tick chunk state machine: select the LOD band for the current
/// viewer distance, swap to it if its mesh is cached (requesting the build
/// otherwise), and report visibility transitions.
#[allow(clippy::too_many_arguments)]
fn update_chunk(
    commands: &mut Commands,
    entity: Entity,
    chunk: &mut TerrainChunk,
    settings: &TerrainSettings,
    viewer_position: Vec2,
    registry: &mut ChunkRegistry,
    mesh_tasks: &mut MeshTasks,
    visibility_events: &mut EventWriter<ChunkVisibilityChanged>,
) {
    // Nothing to decide until the height data exists.
    let Some(height_map) = chunk.height_map.clone() else {
        return;
    };

    let distance = chunk.bounds.sqr_distance(viewer_position).sqrt();
    let selected = select_lod_index(&settings.detail_levels, distance);

    if let Some(lod_index) = selected {
        if chunk.previous_lod_index != Some(lod_index) {
            let slot = &mut chunk.lod_meshes[lod_index];
            if let Some(mesh) = slot.mesh.clone() {
                chunk.previous_lod_index = Some(lod_index);
                commands.entity(entity).insert(ActiveMesh { lod_index, mesh });
            } else if !slot.requested {
                slot.requested = true;
                request_mesh(mesh_tasks, chunk.coord, lod_index, settings, height_map);
            }
        }
    }

    let visible = selected.is_some();
    if chunk.visible != visible {
        chunk.visible = visible;
        registry.set_visible(entity, visible);
        visibility_events.send(ChunkVisibilityChanged {
            entity,
            coord: chunk.coord,
            visible,
        });
    }
}

/// Collider maintenance: request the collider-LOD mesh inside its band, and
/// attach it exactly once when the viewer is close enough. Sticky by design;
/// see `TerrainChunk`.
fn update_collider(
    commands: &mut Commands,
    entity: Entity,
    chunk: &mut TerrainChunk,
    settings: &TerrainSettings,
    viewer_position: Vec2,
    mesh_tasks: &mut MeshTasks,
    collider_events: &mut EventWriter<ChunkColliderReady>,
) {
    if chunk.has_collider {
        return;
    }
    let Some(height_map) = chunk.height_map.clone() else {
        return;
    };

    let sqr_distance = chunk.bounds.sqr_distance(viewer_position);
    let collider_lod_index = settings.collider_lod_index;

    if sqr_distance < settings.detail_levels[collider_lod_index].sqr_visible_dist_threshold() {
        let slot = &mut chunk.lod_meshes[collider_lod_index];
        if !slot.requested {
            slot.requested = true;
            request_mesh(
                mesh_tasks,
                chunk.coord,
                collider_lod_index,
                settings,
                height_map,
            );
        }
    }

    if sqr_distance
        < COLLIDER_GENERATION_DISTANCE_THRESHOLD * COLLIDER_GENERATION_DISTANCE_THRESHOLD
    {
        if let Some(mesh) = chunk.lod_meshes[collider_lod_index].mesh.clone() {
            chunk.has_collider = true;
            commands.entity(entity).insert(ChunkCollider { mesh });
            collider_events.send(ChunkColliderReady {
                entity,
                coord: chunk.coord,
            });
            debug!("collider attached for chunk {}", chunk.coord);
        }
    }
}

fn request_mesh(
    mesh_tasks: &mut MeshTasks,
    coord: ChunkCoord,
    lod_index: usize,
    settings: &TerrainSettings,
    height_map: Arc<HeightMap>,
) {
    let lod = settings.detail_levels[lod_index].lod;
    let mesh_settings = settings.mesh;
    let accepted = mesh_tasks.0.submit((coord, lod_index), move || {
        generate_terrain_mesh(&height_map, &mesh_settings, lod)
    });
    if !accepted {
        // The slot's `requested` flag should make this unreachable.
        warn!("duplicate mesh request suppressed for chunk {coord} LOD {lod}");
    }
}
