//! Terrain mesh generation with seam-consistent LOD decimation.
//!
//! A height map covers the renderable chunk plus two extra rings: an
//! out-of-mesh border whose vertices only feed edge-normal calculation, and a
//! full-resolution mesh-edge ring that every LOD shares so neighboring chunks
//! never crack. Between the edge ring and the decimated interior sits a ring
//! of edge-connection vertices whose heights are interpolated along the
//! skipped axis, pinning them onto the coarse triangle edges.
//!
//! Grid cells are classified per vertex:
//! - out-of-mesh: outermost ring, excluded from the renderable index buffer
//! - mesh edge: second ring, full resolution at every LOD
//! - edge connection: third ring, interpolated seam vertices
//! - main: interior, stepped by the LOD's skip increment

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::heightmap::HeightMap;

/// Renderable chunk sizes. All are multiples of 24, so the decimated interior
/// aligns with the seam rings for every skip increment up to 8 (120 and 240
/// additionally align for skips 10 and 12).
pub const SUPPORTED_CHUNK_SIZES: [u32; 9] = [48, 72, 96, 120, 144, 168, 192, 216, 240];

/// Flat shading duplicates every vertex per triangle; only the smaller chunk
/// sizes keep that affordable.
pub const NUM_SUPPORTED_FLAT_SHADED_CHUNK_SIZES: usize = 3;

/// LOD 0..=6, skip increments 1, 2, 4, 6, 8, 10, 12.
pub const NUM_SUPPORTED_LODS: u32 = 7;

/// Sampling stride across the height field for a given LOD level.
pub fn skip_increment(lod: u32) -> usize {
    if lod == 0 {
        1
    } else {
        2 * lod as usize
    }
}

/// Static mesh shape configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MeshSettings {
    /// World units per height-map sample.
    pub mesh_scale: f32,
    pub use_flat_shading: bool,
    /// Index into [`SUPPORTED_CHUNK_SIZES`].
    pub chunk_size_index: usize,
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            mesh_scale: 2.0,
            use_flat_shading: false,
            chunk_size_index: 0,
        }
    }
}

impl MeshSettings {
    pub fn chunk_size(&self) -> u32 {
        SUPPORTED_CHUNK_SIZES[self.chunk_size_index]
    }

    /// Samples per height-map line: the renderable size plus the out-of-mesh
    /// border, the mesh-edge ring, and the edge-connection ring.
    pub fn num_verts_per_line(&self) -> usize {
        self.chunk_size() as usize + 5
    }

    /// World-space edge length of the renderable chunk.
    pub fn mesh_world_size(&self) -> f32 {
        (self.num_verts_per_line() as f32 - 3.0) * self.mesh_scale
    }
}

/// Vertex and index buffers for one chunk at one LOD.
///
/// The out-of-mesh vertices and their (signed-index) triangles exist only so
/// edge normals average across chunk borders; they are never part of the
/// renderable buffers exposed by the accessors.
#[derive(Debug)]
pub struct MeshData {
    vertices: Vec<Vec3>,
    uvs: Vec<Vec2>,
    triangles: Vec<u32>,
    out_of_mesh_vertices: Vec<Vec3>,
    out_of_mesh_triangles: Vec<i32>,
    baked_normals: Vec<Vec3>,
    use_flat_shading: bool,
}

impl MeshData {
    fn new(num_verts_per_line: usize, skip: usize, use_flat_shading: bool) -> Self {
        let n = num_verts_per_line;
        let num_mesh_edge_vertices = (n - 2) * 4 - 4;
        let num_edge_connection_vertices = (skip - 1) * (n - 5) / skip * 4;
        let num_main_vertices_per_line = (n - 5) / skip + 1;
        let num_main_vertices = num_main_vertices_per_line * num_main_vertices_per_line;
        let vertex_count =
            num_mesh_edge_vertices + num_edge_connection_vertices + num_main_vertices;

        Self {
            vertices: vec![Vec3::ZERO; vertex_count],
            uvs: vec![Vec2::ZERO; vertex_count],
            triangles: Vec::with_capacity(vertex_count * 6),
            out_of_mesh_vertices: vec![Vec3::ZERO; n * 4 - 4],
            out_of_mesh_triangles: Vec::with_capacity(24 * n),
            baked_normals: Vec::new(),
            use_flat_shading,
        }
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.baked_normals
    }

    pub fn uvs(&self) -> &[Vec2] {
        &self.uvs
    }

    pub fn indices(&self) -> &[u32] {
        &self.triangles
    }

    pub fn use_flat_shading(&self) -> bool {
        self.use_flat_shading
    }

    /// Ids >= 0 index the renderable vertices; ids < 0 index the out-of-mesh
    /// border list as `-id - 1`.
    fn add_vertex(&mut self, position: Vec3, uv: Vec2, id: i32) {
        if id < 0 {
            self.out_of_mesh_vertices[(-id - 1) as usize] = position;
        } else {
            self.vertices[id as usize] = position;
            self.uvs[id as usize] = uv;
        }
    }

    fn add_triangle(&mut self, a: i32, b: i32, c: i32) {
        if a < 0 || b < 0 || c < 0 {
            self.out_of_mesh_triangles.extend([a, b, c]);
        } else {
            self.triangles.extend([a as u32, b as u32, c as u32]);
        }
    }

    fn vertex_by_id(&self, id: i32) -> Vec3 {
        if id < 0 {
            self.out_of_mesh_vertices[(-id - 1) as usize]
        } else {
            self.vertices[id as usize]
        }
    }

    fn calculate_normals(&self) -> Vec<Vec3> {
        let mut normals = vec![Vec3::ZERO; self.vertices.len()];

        for triangle in self.triangles.chunks_exact(3) {
            let (a, b, c) = (
                triangle[0] as usize,
                triangle[1] as usize,
                triangle[2] as usize,
            );
            let normal = face_normal(self.vertices[a], self.vertices[b], self.vertices[c]);
            normals[a] += normal;
            normals[b] += normal;
            normals[c] += normal;
        }

        // Border triangles pull the edge vertices' normals toward what the
        // neighboring chunk sees, keeping lighting continuous across seams.
        for triangle in self.out_of_mesh_triangles.chunks_exact(3) {
            let normal = face_normal(
                self.vertex_by_id(triangle[0]),
                self.vertex_by_id(triangle[1]),
                self.vertex_by_id(triangle[2]),
            );
            for &id in triangle {
                if id >= 0 {
                    normals[id as usize] += normal;
                }
            }
        }

        for normal in &mut normals {
            *normal = normal.normalize_or(Vec3::Y);
        }
        normals
    }

    fn apply_flat_shading(&mut self) {
        let mut flat_vertices = Vec::with_capacity(self.triangles.len());
        let mut flat_uvs = Vec::with_capacity(self.triangles.len());
        let mut flat_normals = Vec::with_capacity(self.triangles.len());

        for triangle in self.triangles.chunks_exact(3) {
            let (a, b, c) = (
                triangle[0] as usize,
                triangle[1] as usize,
                triangle[2] as usize,
            );
            let normal = face_normal(self.vertices[a], self.vertices[b], self.vertices[c]);
            for index in [a, b, c] {
                flat_vertices.push(self.vertices[index]);
                flat_uvs.push(self.uvs[index]);
                flat_normals.push(normal);
            }
        }

        self.triangles = (0..flat_vertices.len() as u32).collect();
        self.vertices = flat_vertices;
        self.uvs = flat_uvs;
        self.baked_normals = flat_normals;
    }

    fn finalize(&mut self) {
        if self.use_flat_shading {
            self.apply_flat_shading();
        } else {
            self.baked_normals = self.calculate_normals();
        }
    }
}

fn face_normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    let normal = (b - a).cross(c - a);
    if normal.length_squared() < 1e-12 {
        Vec3::Y
    } else {
        normal.normalize()
    }
}

/// Build the chunk mesh for `lod` from a height map of
/// `settings.num_verts_per_line()` samples per line.
pub fn generate_terrain_mesh(height_map: &HeightMap, settings: &MeshSettings, lod: u32) -> MeshData {
    let skip = skip_increment(lod) as i32;
    let n = settings.num_verts_per_line() as i32;
    debug_assert_eq!(
        height_map.size as i32, n,
        "height map size must match the mesh settings"
    );

    let world_size = settings.mesh_world_size();
    let top_left = Vec2::splat(-world_size / 2.0);

    let mut mesh = MeshData::new(n as usize, skip as usize, settings.use_flat_shading);

    let is_skipped = |x: i32, y: i32| {
        x > 2 && x < n - 3 && y > 2 && y < n - 3 && ((x - 2) % skip != 0 || (y - 2) % skip != 0)
    };

    // First pass assigns vertex ids in scan order so triangle emission can
    // reference neighbors before visiting them.
    let mut vertex_ids = vec![0i32; (n * n) as usize];
    let mut mesh_vertex_index = 0i32;
    let mut out_of_mesh_vertex_index = -1i32;
    for y in 0..n {
        for x in 0..n {
            let is_out_of_mesh = y == 0 || y == n - 1 || x == 0 || x == n - 1;
            if is_out_of_mesh {
                vertex_ids[(y * n + x) as usize] = out_of_mesh_vertex_index;
                out_of_mesh_vertex_index -= 1;
            } else if !is_skipped(x, y) {
                vertex_ids[(y * n + x) as usize] = mesh_vertex_index;
                mesh_vertex_index += 1;
            }
        }
    }
    debug_assert_eq!(mesh_vertex_index as usize, mesh.vertices.len());

    for y in 0..n {
        for x in 0..n {
            if is_skipped(x, y) {
                continue;
            }

            let is_out_of_mesh = y == 0 || y == n - 1 || x == 0 || x == n - 1;
            let is_mesh_edge = !is_out_of_mesh && (y == 1 || y == n - 2 || x == 1 || x == n - 2);
            let is_main =
                !is_out_of_mesh && !is_mesh_edge && (x - 2) % skip == 0 && (y - 2) % skip == 0;
            let is_edge_connection = !is_out_of_mesh
                && !is_mesh_edge
                && !is_main
                && (y == 2 || y == n - 3 || x == 2 || x == n - 3);

            let percent = Vec2::new((x - 1) as f32, (y - 1) as f32) / (n - 3) as f32;
            let position_2d = top_left + percent * world_size;

            let mut height = height_map.get(x as usize, y as usize);
            if is_edge_connection {
                // Pin the seam vertex onto the segment between the two
                // nearest full-resolution samples along the skipped axis,
                // proportional to its distance between them.
                let is_vertical = x == 2 || x == n - 3;
                let dst_to_main_a = if is_vertical {
                    (y - 2) % skip
                } else {
                    (x - 2) % skip
                };
                let dst_to_main_b = skip - dst_to_main_a;
                let t = dst_to_main_a as f32 / skip as f32;
                let (ax, ay) = if is_vertical {
                    (x, y - dst_to_main_a)
                } else {
                    (x - dst_to_main_a, y)
                };
                let (bx, by) = if is_vertical {
                    (x, y + dst_to_main_b)
                } else {
                    (x + dst_to_main_b, y)
                };
                let height_a = height_map.get(ax as usize, ay as usize);
                let height_b = height_map.get(bx as usize, by as usize);
                height = height_a * (1.0 - t) + height_b * t;
            }

            mesh.add_vertex(
                Vec3::new(position_2d.x, height, position_2d.y),
                percent,
                vertex_ids[(y * n + x) as usize],
            );

            // Edge-connection vertices on the leading seam columns (x == 2,
            // y == 2) do not own a quad: the adjacent main vertex spans it.
            let creates_triangle =
                x < n - 1 && y < n - 1 && (!is_edge_connection || (x != 2 && y != 2));
            if creates_triangle {
                let current_skip = if is_main && x != n - 3 && y != n - 3 {
                    skip
                } else {
                    1
                };
                let a = vertex_ids[(y * n + x) as usize];
                let b = vertex_ids[(y * n + x + current_skip) as usize];
                let c = vertex_ids[((y + current_skip) * n + x) as usize];
                let d = vertex_ids[((y + current_skip) * n + x + current_skip) as usize];
                mesh.add_triangle(a, c, d);
                mesh.add_triangle(d, b, a);
            }
        }
    }

    mesh.finalize();
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heightmap::{generate_height_map, HeightMapSettings};

    fn settings(use_flat_shading: bool) -> MeshSettings {
        MeshSettings {
            mesh_scale: 2.0,
            use_flat_shading,
            chunk_size_index: 0,
        }
    }

    fn uniform_height_map(size: usize, height: f32) -> HeightMap {
        HeightMap {
            size,
            values: vec![height; size * size],
            min_value: height,
            max_value: height,
        }
    }

    fn noise_height_map(size: usize) -> HeightMap {
        generate_height_map(
            size,
            &HeightMapSettings {
                height_multiplier: 25.0,
                ..HeightMapSettings::default()
            },
            Vec2::ZERO,
            None,
        )
    }

    #[test]
    fn test_supported_sizes_align_with_all_base_skips() {
        for size in SUPPORTED_CHUNK_SIZES {
            for lod in 1..5 {
                assert_eq!(size as usize % skip_increment(lod), 0);
            }
        }
    }

    #[test]
    fn test_flat_height_map_produces_planar_mesh() {
        for use_flat_shading in [false, true] {
            let settings = settings(use_flat_shading);
            let map = uniform_height_map(settings.num_verts_per_line(), 7.5);
            for lod in [0, 2, 4] {
                let mesh = generate_terrain_mesh(&map, &settings, lod);
                assert!(!mesh.positions().is_empty());
                assert!(mesh.positions().iter().all(|p| p.y == 7.5));
                assert!(mesh
                    .normals()
                    .iter()
                    .all(|n| (*n - Vec3::Y).length() < 1e-6));
            }
        }
    }

    #[test]
    fn test_vertex_accounting_at_lod_two() {
        let settings = settings(false);
        let n = settings.num_verts_per_line(); // 53
        let map = uniform_height_map(n, 0.0);
        let mesh = generate_terrain_mesh(&map, &settings, 2); // skip 4

        let mesh_edge = (n - 2) * 4 - 4;
        let edge_connection = 3 * (n - 5) / 4 * 4;
        let main_per_line = (n - 5) / 4 + 1;
        let expected = mesh_edge + edge_connection + main_per_line * main_per_line;

        assert_eq!(mesh.positions().len(), expected);
        assert_eq!(mesh.indices().len() % 3, 0);
        let max_index = mesh.indices().iter().copied().max().unwrap() as usize;
        assert!(max_index < mesh.positions().len());
    }

    #[test]
    fn test_renderable_vertices_stay_inside_the_chunk() {
        let settings = settings(false);
        let map = noise_height_map(settings.num_verts_per_line());
        let half = settings.mesh_world_size() / 2.0;
        let mesh = generate_terrain_mesh(&map, &settings, 1);
        // The out-of-mesh border ring sits outside [-half, half]; it must
        // never leak into the renderable vertex list.
        assert!(mesh
            .positions()
            .iter()
            .all(|p| p.x.abs() <= half + 1e-4 && p.z.abs() <= half + 1e-4));
    }

    #[test]
    fn test_lod_meshes_share_the_boundary_ring() {
        let settings = settings(false);
        let map = noise_height_map(settings.num_verts_per_line());
        let half = settings.mesh_world_size() / 2.0;

        let ring = |mesh: &MeshData| {
            let mut ring: Vec<Vec3> = mesh
                .positions()
                .iter()
                .copied()
                .filter(|p| (p.x.abs() - half).abs() < 1e-4 || (p.z.abs() - half).abs() < 1e-4)
                .collect();
            ring.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.z.total_cmp(&b.z)));
            ring
        };

        let fine = generate_terrain_mesh(&map, &settings, 0);
        let coarse = generate_terrain_mesh(&map, &settings, 2);
        let fine_ring = ring(&fine);
        let coarse_ring = ring(&coarse);

        assert!(!fine_ring.is_empty());
        assert_eq!(fine_ring.len(), coarse_ring.len());
        for (a, b) in fine_ring.iter().zip(&coarse_ring) {
            assert!((*a - *b).length() < 1e-5, "boundary mismatch: {a} vs {b}");
        }
    }

    #[test]
    fn test_edge_connection_vertex_interpolates_between_main_samples() {
        let settings = settings(false);
        let n = settings.num_verts_per_line();
        // Height depends on the row only, quadratically, so a seam vertex
        // between rows y-1 and y+1 cannot simply reuse its own sample.
        let values: Vec<f32> = (0..n * n)
            .map(|i| {
                let y = (i / n) as f32;
                y * y
            })
            .collect();
        let map = HeightMap {
            size: n,
            values,
            min_value: 0.0,
            max_value: ((n - 1) * (n - 1)) as f32,
        };

        let mesh = generate_terrain_mesh(&map, &settings, 1); // skip 2
        let world = settings.mesh_world_size();
        let half = world / 2.0;
        // Grid (2, 3): edge-connection vertex on the x == 2 seam column.
        let expected_x = -half + settings.mesh_scale;
        let expected_z = -half + 2.0 * settings.mesh_scale;
        let vertex = mesh
            .positions()
            .iter()
            .find(|p| (p.x - expected_x).abs() < 1e-4 && (p.z - expected_z).abs() < 1e-4)
            .expect("seam vertex not found");
        // Interpolated midpoint of rows 2 and 4: (4 + 16) / 2, not 3*3.
        assert_eq!(vertex.y, 10.0);
    }

    #[test]
    fn test_flat_shading_duplicates_vertices_per_triangle() {
        let settings = settings(true);
        let map = noise_height_map(settings.num_verts_per_line());
        let mesh = generate_terrain_mesh(&map, &settings, 1);
        assert_eq!(mesh.positions().len(), mesh.indices().len());
        assert_eq!(mesh.normals().len(), mesh.positions().len());
        assert!(mesh
            .indices()
            .iter()
            .enumerate()
            .all(|(i, &index)| index as usize == i));
    }

    #[test]
    fn test_smooth_normals_face_upward_on_gentle_terrain() {
        let settings = settings(false);
        let map = noise_height_map(settings.num_verts_per_line());
        let mesh = generate_terrain_mesh(&map, &settings, 0);
        // Heights vary slowly relative to the 2-unit sample spacing, so
        // every averaged normal must stay in the upper hemisphere.
        assert!(mesh.normals().iter().all(|n| n.y > 0.0));
        assert!(mesh
            .normals()
            .iter()
            .all(|n| (n.length() - 1.0).abs() < 1e-4));
    }
}
