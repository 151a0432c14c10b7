//! OBJ model import via `tobj`
//!
//! Faces are triangulated and re-indexed to a single index stream. V is
//! flipped because OBJ puts the texture origin bottom-left while Vulkan
//! samples from the top-left. Winding is kept as authored (counter-clockwise).

use std::path::Path;

use super::AssetError;
use crate::render::mesh::{Mesh, SubMesh, Vertex};

const DEFAULT_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// Load an OBJ file and flatten all of its models into one mesh
pub fn load_obj<P: AsRef<Path>>(path: P) -> Result<Mesh, AssetError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(AssetError::NotFound(path.display().to_string()));
    }

    let options = tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ..Default::default()
    };
    let (models, materials) = tobj::load_obj(path, &options)
        .map_err(|e| AssetError::LoadFailed(format!("{}: {}", path.display(), e)))?;

    // A missing .mtl only costs us the ambient fallback color
    let materials = materials.unwrap_or_else(|e| {
        log::warn!("Materials for {} unavailable: {}", path.display(), e);
        Vec::new()
    });

    let submeshes = submeshes_from_models(&models, &materials);
    let mesh = Mesh::from_submeshes(&submeshes)?;

    log::info!(
        "Loaded model {} ({} submeshes, {} vertices, {} indices)",
        path.display(),
        submeshes.len(),
        mesh.vertices().len(),
        mesh.indices().len()
    );
    Ok(mesh)
}

/// Convert imported models to submeshes with local indices
pub fn submeshes_from_models(models: &[tobj::Model], materials: &[tobj::Material]) -> Vec<SubMesh> {
    models
        .iter()
        .map(|model| {
            let fallback_color = model
                .mesh
                .material_id
                .and_then(|id| materials.get(id))
                .and_then(|material| material.ambient)
                .map_or(DEFAULT_COLOR, |[r, g, b]| [r, g, b, 1.0]);
            submesh_from_tobj(&model.mesh, fallback_color)
        })
        .collect()
}

fn submesh_from_tobj(mesh: &tobj::Mesh, fallback_color: [f32; 4]) -> SubMesh {
    let vertex_count = mesh.positions.len() / 3;

    let vertices = (0..vertex_count)
        .map(|i| {
            let position = [
                mesh.positions[3 * i],
                mesh.positions[3 * i + 1],
                mesh.positions[3 * i + 2],
            ];

            let color = if mesh.vertex_color.len() >= 3 * (i + 1) {
                [
                    mesh.vertex_color[3 * i],
                    mesh.vertex_color[3 * i + 1],
                    mesh.vertex_color[3 * i + 2],
                    1.0,
                ]
            } else {
                fallback_color
            };

            let tex_coord = if mesh.texcoords.len() >= 2 * (i + 1) {
                [mesh.texcoords[2 * i], 1.0 - mesh.texcoords[2 * i + 1]]
            } else {
                [0.0, 0.0]
            };

            let normal = if mesh.normals.len() >= 3 * (i + 1) {
                [
                    mesh.normals[3 * i],
                    mesh.normals[3 * i + 1],
                    mesh.normals[3 * i + 2],
                ]
            } else {
                [0.0, 0.0, 0.0]
            };

            Vertex::new(position, color, tex_coord, normal)
        })
        .collect();

    SubMesh {
        vertices,
        indices: mesh.indices.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn triangle_mesh() -> tobj::Mesh {
        tobj::Mesh {
            positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            indices: vec![0, 1, 2],
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_attributes_get_defaults() {
        let models = vec![tobj::Model::new(triangle_mesh(), "bare".to_string())];
        let submeshes = submeshes_from_models(&models, &[]);

        assert_eq!(submeshes.len(), 1);
        let vertex = submeshes[0].vertices[1];
        assert_eq!(vertex.position, [1.0, 0.0, 0.0]);
        assert_eq!(vertex.color, DEFAULT_COLOR);
        assert_eq!(vertex.tex_coord, [0.0, 0.0]);
        assert_eq!(vertex.normal, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_tex_coord_v_is_flipped() {
        let mut mesh = triangle_mesh();
        mesh.texcoords = vec![0.0, 0.0, 1.0, 0.25, 0.5, 1.0];
        let models = vec![tobj::Model::new(mesh, "uv".to_string())];

        let vertices = &submeshes_from_models(&models, &[])[0].vertices;
        assert_relative_eq!(vertices[0].tex_coord[1], 1.0);
        assert_relative_eq!(vertices[1].tex_coord[1], 0.75);
        assert_relative_eq!(vertices[2].tex_coord[1], 0.0);
        assert_relative_eq!(vertices[2].tex_coord[0], 0.5);
    }

    #[test]
    fn test_material_ambient_used_without_vertex_colors() {
        let mut mesh = triangle_mesh();
        mesh.material_id = Some(0);
        let material = tobj::Material {
            ambient: Some([0.2, 0.4, 0.6]),
            ..Default::default()
        };
        let models = vec![tobj::Model::new(mesh, "tinted".to_string())];

        let vertices = &submeshes_from_models(&models, &[material])[0].vertices;
        assert_eq!(vertices[0].color, [0.2, 0.4, 0.6, 1.0]);
    }

    #[test]
    fn test_vertex_colors_win_over_material() {
        let mut mesh = triangle_mesh();
        mesh.material_id = Some(0);
        mesh.vertex_color = vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
        let material = tobj::Material {
            ambient: Some([0.2, 0.4, 0.6]),
            ..Default::default()
        };
        let models = vec![tobj::Model::new(mesh, "painted".to_string())];

        let vertices = &submeshes_from_models(&models, &[material])[0].vertices;
        assert_eq!(vertices[1].color, [0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_two_models_flatten_with_offsets() {
        let models = vec![
            tobj::Model::new(triangle_mesh(), "a".to_string()),
            tobj::Model::new(triangle_mesh(), "b".to_string()),
        ];
        let mesh = Mesh::from_submeshes(&submeshes_from_models(&models, &[])).unwrap();
        assert_eq!(mesh.indices(), &[0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        assert!(matches!(load_obj("no/such/model.obj"), Err(AssetError::NotFound(_))));
    }

    #[test]
    fn test_bundled_cube_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../resources/models/cube.obj");
        let mesh = load_obj(path).unwrap();
        // Six quads, four unique corners each after single-index re-indexing
        assert_eq!(mesh.indices().len(), 36);
        assert_eq!(mesh.vertices().len(), 24);
    }
}
