//! Mesh data consumed by the renderer
//!
//! A [`Mesh`] is one flat vertex/index pair. Importers produce a list of
//! [`SubMesh`]es whose indices are local to each submesh; flattening
//! concatenates the vertices and shifts every submesh's indices by the
//! number of vertices that precede it.

use crate::assets::AssetError;

/// Interleaved vertex as laid out in the vertex buffer
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// Position in model space
    pub position: [f32; 3],
    /// RGBA color multiplied with the texture sample
    pub color: [f32; 4],
    /// Texture coordinates
    pub tex_coord: [f32; 2],
    /// Normal vector
    pub normal: [f32; 3],
}

unsafe impl bytemuck::Pod for Vertex {}
unsafe impl bytemuck::Zeroable for Vertex {}

impl Vertex {
    /// Create a new vertex
    pub fn new(position: [f32; 3], color: [f32; 4], tex_coord: [f32; 2], normal: [f32; 3]) -> Self {
        Self {
            position,
            color,
            tex_coord,
            normal,
        }
    }
}

/// One imported piece of geometry with indices local to its own vertices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubMesh {
    /// Vertices of this submesh
    pub vertices: Vec<Vertex>,
    /// Triangle list indices into `vertices`
    pub indices: Vec<u32>,
}

/// Flattened, validated mesh ready for upload
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

impl Mesh {
    /// Build a mesh from already-flat arrays
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Result<Self, AssetError> {
        let mesh = Self { vertices, indices };
        mesh.validate()?;
        Ok(mesh)
    }

    /// Merge submeshes into one vertex/index pair
    pub fn from_submeshes(submeshes: &[SubMesh]) -> Result<Self, AssetError> {
        let vertex_total: usize = submeshes.iter().map(|sub| sub.vertices.len()).sum();
        let index_total: usize = submeshes.iter().map(|sub| sub.indices.len()).sum();

        let mut vertices = Vec::with_capacity(vertex_total);
        let mut indices = Vec::with_capacity(index_total);

        for (position, submesh) in submeshes.iter().enumerate() {
            let offset = u32::try_from(vertices.len())
                .map_err(|_| AssetError::InvalidData("mesh exceeds u32 vertex range".to_string()))?;
            let local_count = submesh.vertices.len();

            for &index in &submesh.indices {
                if index as usize >= local_count {
                    return Err(AssetError::InvalidData(format!(
                        "submesh {} index {} out of range for {} vertices",
                        position, index, local_count
                    )));
                }
                let shifted = index
                    .checked_add(offset)
                    .ok_or_else(|| AssetError::InvalidData("mesh exceeds u32 index range".to_string()))?;
                indices.push(shifted);
            }
            vertices.extend_from_slice(&submesh.vertices);
        }

        Self::new(vertices, indices)
    }

    fn validate(&self) -> Result<(), AssetError> {
        if self.vertices.is_empty() || self.indices.is_empty() {
            return Err(AssetError::InvalidData("mesh has no geometry".to_string()));
        }
        if self.indices.len() % 3 != 0 {
            return Err(AssetError::InvalidData(format!(
                "index count {} is not a triangle list",
                self.indices.len()
            )));
        }
        let vertex_count = self.vertices.len();
        if let Some(&bad) = self.indices.iter().find(|&&index| index as usize >= vertex_count) {
            return Err(AssetError::InvalidData(format!(
                "index {} out of range for {} vertices",
                bad, vertex_count
            )));
        }
        Ok(())
    }

    /// Vertex array
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Index array
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Number of indices to draw
    pub fn index_count(&self) -> u32 {
        // validate() keeps indices addressable by u32 vertices
        u32::try_from(self.indices.len()).unwrap_or(u32::MAX)
    }

    /// Vertex data as bytes for upload
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Index data as bytes for upload
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(x: f32) -> Vertex {
        Vertex::new([x, 0.0, 0.0], [1.0; 4], [0.0, 0.0], [0.0, 0.0, 1.0])
    }

    fn triangle(base: f32) -> SubMesh {
        SubMesh {
            vertices: vec![vertex(base), vertex(base + 1.0), vertex(base + 2.0)],
            indices: vec![0, 1, 2],
        }
    }

    #[test]
    fn test_vertex_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 48);
    }

    #[test]
    fn test_flatten_offsets_each_submesh() {
        let mut second = triangle(10.0);
        second.vertices.push(vertex(13.0));
        second.indices.extend_from_slice(&[2, 1, 3]);
        let third = triangle(20.0);

        let mesh = Mesh::from_submeshes(&[triangle(0.0), second, third]).unwrap();

        assert_eq!(mesh.vertices().len(), 10);
        assert_eq!(mesh.indices(), &[0, 1, 2, 3, 4, 5, 5, 4, 6, 7, 8, 9]);
        assert_eq!(mesh.vertices()[7].position[0], 20.0);
        assert_eq!(mesh.index_count(), 12);
    }

    #[test]
    fn test_flattened_indices_stay_in_range() {
        let submeshes: Vec<SubMesh> = (0..5).map(|i| triangle(i as f32)).collect();
        let mesh = Mesh::from_submeshes(&submeshes).unwrap();
        let count = mesh.vertices().len() as u32;
        assert!(mesh.indices().iter().all(|&index| index < count));
    }

    #[test]
    fn test_empty_mesh_rejected() {
        assert!(matches!(Mesh::from_submeshes(&[]), Err(AssetError::InvalidData(_))));
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let result = Mesh::new(vec![vertex(0.0), vertex(1.0), vertex(2.0)], vec![0, 1, 3]);
        assert!(matches!(result, Err(AssetError::InvalidData(_))));
    }

    #[test]
    fn test_submesh_index_past_its_own_vertices_rejected() {
        let mut second = triangle(10.0);
        second.indices = vec![0, 1, u32::MAX - 1];

        let result = Mesh::from_submeshes(&[triangle(0.0), second]);
        assert!(matches!(result, Err(AssetError::InvalidData(_))));
    }

    #[test]
    fn test_submesh_index_into_neighbour_rejected() {
        let mut second = triangle(10.0);
        second.indices = vec![0, 1, 3];

        let result = Mesh::from_submeshes(&[triangle(0.0), second, triangle(20.0)]);
        assert!(matches!(result, Err(AssetError::InvalidData(_))));
    }

    #[test]
    fn test_byte_views_match_sizes() {
        let mesh = Mesh::from_submeshes(&[triangle(0.0)]).unwrap();
        assert_eq!(mesh.vertex_bytes().len(), 3 * 48);
        assert_eq!(mesh.index_bytes().len(), 3 * 4);
    }
}
