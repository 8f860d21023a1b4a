//! Terrain configuration and startup validation.
//!
//! All of this is static configuration supplied before streaming starts.
//! Structural errors (a broken LOD table, out-of-range indices) are rejected
//! here, at startup; numeric noise-parameter issues are clamped at
//! generation time instead (see `NoiseSettings::sanitized`).

use std::fmt;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::heightmap::HeightMapSettings;
use crate::lod::LodInfo;
use crate::mesh::{
    skip_increment, MeshSettings, NUM_SUPPORTED_FLAT_SHADED_CHUNK_SIZES, NUM_SUPPORTED_LODS,
    SUPPORTED_CHUNK_SIZES,
};

/// Distance (world units) the viewer must move before the visible-chunk set
/// is recomputed. Collision maintenance is cheaper and runs on any movement.
pub const VIEWER_MOVE_THRESHOLD_FOR_CHUNK_UPDATE: f32 = 25.0;
pub const SQR_VIEWER_MOVE_THRESHOLD_FOR_CHUNK_UPDATE: f32 =
    VIEWER_MOVE_THRESHOLD_FOR_CHUNK_UPDATE * VIEWER_MOVE_THRESHOLD_FOR_CHUNK_UPDATE;

/// Viewer proximity (world units, nearest edge) at which a chunk's cached
/// collider-LOD mesh is handed to the physics collaborator.
pub const COLLIDER_GENERATION_DISTANCE_THRESHOLD: f32 = 5.0;

/// Aggregate terrain configuration.
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
pub struct TerrainSettings {
    pub height_map: HeightMapSettings,
    pub mesh: MeshSettings,
    /// LOD bands, ascending by threshold. The last threshold is the view
    /// distance.
    pub detail_levels: Vec<LodInfo>,
    /// Index into `detail_levels` of the band whose mesh backs the collider.
    pub collider_lod_index: usize,
}

impl Default for TerrainSettings {
    fn default() -> Self {
        Self {
            height_map: HeightMapSettings::default(),
            mesh: MeshSettings::default(),
            detail_levels: vec![
                LodInfo {
                    lod: 0,
                    visible_dist_threshold: 150.0,
                },
                LodInfo {
                    lod: 1,
                    visible_dist_threshold: 300.0,
                },
                LodInfo {
                    lod: 2,
                    visible_dist_threshold: 450.0,
                },
                LodInfo {
                    lod: 4,
                    visible_dist_threshold: 600.0,
                },
            ],
            collider_lod_index: 1,
        }
    }
}

impl TerrainSettings {
    /// View distance: the coarsest band's threshold.
    pub fn max_view_dist(&self) -> f32 {
        self.detail_levels
            .last()
            .map(|level| level.visible_dist_threshold)
            .unwrap_or(0.0)
    }

    /// Neighborhood radius, in chunks, that must exist around the viewer.
    pub fn chunks_visible_in_view_dist(&self) -> i32 {
        (self.max_view_dist() / self.mesh.mesh_world_size()).round() as i32
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.mesh.chunk_size_index >= SUPPORTED_CHUNK_SIZES.len() {
            return Err(SettingsError::ChunkSizeIndexOutOfRange {
                index: self.mesh.chunk_size_index,
            });
        }
        if self.mesh.use_flat_shading
            && self.mesh.chunk_size_index >= NUM_SUPPORTED_FLAT_SHADED_CHUNK_SIZES
        {
            return Err(SettingsError::FlatShadedChunkSizeTooLarge {
                index: self.mesh.chunk_size_index,
            });
        }
        if self.detail_levels.is_empty() {
            return Err(SettingsError::EmptyDetailLevels);
        }

        let mut previous_threshold = 0.0;
        for (index, level) in self.detail_levels.iter().enumerate() {
            if level.visible_dist_threshold <= previous_threshold {
                return Err(SettingsError::UnorderedDetailLevels { index });
            }
            previous_threshold = level.visible_dist_threshold;

            if level.lod >= NUM_SUPPORTED_LODS {
                return Err(SettingsError::UnsupportedLod {
                    index,
                    lod: level.lod,
                });
            }
            // The decimated interior must land exactly on the seam rings.
            let skip = skip_increment(level.lod);
            if self.mesh.chunk_size() as usize % skip != 0 {
                return Err(SettingsError::MisalignedLod {
                    lod: level.lod,
                    skip,
                    chunk_size: self.mesh.chunk_size(),
                });
            }
        }

        if self.collider_lod_index >= self.detail_levels.len() {
            return Err(SettingsError::ColliderLodOutOfRange {
                index: self.collider_lod_index,
                len: self.detail_levels.len(),
            });
        }
        Ok(())
    }
}

/// Structural configuration error, fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    ChunkSizeIndexOutOfRange { index: usize },
    FlatShadedChunkSizeTooLarge { index: usize },
    EmptyDetailLevels,
    UnorderedDetailLevels { index: usize },
    UnsupportedLod { index: usize, lod: u32 },
    MisalignedLod { lod: u32, skip: usize, chunk_size: u32 },
    ColliderLodOutOfRange { index: usize, len: usize },
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChunkSizeIndexOutOfRange { index } => write!(
                f,
                "chunk size index {index} is out of range (supported: 0..{})",
                SUPPORTED_CHUNK_SIZES.len()
            ),
            Self::FlatShadedChunkSizeTooLarge { index } => write!(
                f,
                "chunk size index {index} is too large for flat shading (supported: 0..{NUM_SUPPORTED_FLAT_SHADED_CHUNK_SIZES})"
            ),
            Self::EmptyDetailLevels => write!(f, "the detail-level table is empty"),
            Self::UnorderedDetailLevels { index } => write!(
                f,
                "detail level {index} does not strictly increase the visible-distance threshold"
            ),
            Self::UnsupportedLod { index, lod } => write!(
                f,
                "detail level {index} uses LOD {lod}, outside the supported 0..{NUM_SUPPORTED_LODS}"
            ),
            Self::MisalignedLod {
                lod,
                skip,
                chunk_size,
            } => write!(
                f,
                "LOD {lod} (skip {skip}) does not divide chunk size {chunk_size}; seams would not align"
            ),
            Self::ColliderLodOutOfRange { index, len } => write!(
                f,
                "collider LOD index {index} is outside the detail-level table (len {len})"
            ),
        }
    }
}

impl std::error::Error for SettingsError {}

/// Startup system: configuration errors abort before any chunk is streamed.
pub fn validate_settings(settings: Res<TerrainSettings>) {
    match settings.validate() {
        Ok(()) => info!(
            "terrain: chunk size {} ({} verts/line, {:.0} world units), {} detail levels, view distance {:.0}",
            settings.mesh.chunk_size(),
            settings.mesh.num_verts_per_line(),
            settings.mesh.mesh_world_size(),
            settings.detail_levels.len(),
            settings.max_view_dist(),
        ),
        Err(error) => panic!("invalid terrain settings: {error}"),
    }
}
