//! Tessellated egui output flattened into one vertex/index pair
//!
//! Every egui mesh becomes one draw with its own scissor rectangle and a
//! vertex offset, so egui's mesh-local indices are uploaded unchanged.

use ash::vk;
use egui::epaint::Primitive;
use egui::{ClippedPrimitive, Rect, TextureId};

/// Interleaved GUI vertex as laid out in the overlay vertex buffer
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OverlayVertex {
    /// Position in points from the top-left corner
    pub position: [f32; 2],
    /// Font atlas coordinates
    pub tex_coord: [f32; 2],
    /// Premultiplied sRGBA color
    pub color: [u8; 4],
}

unsafe impl bytemuck::Pod for OverlayVertex {}
unsafe impl bytemuck::Zeroable for OverlayVertex {}

/// One clipped indexed draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayDraw {
    /// First index in the shared index buffer
    pub first_index: u32,
    /// Indices to draw
    pub index_count: u32,
    /// Added to every index of this draw
    pub vertex_offset: i32,
    /// Clip rectangle in framebuffer pixels
    pub scissor: vk::Rect2D,
}

/// Vertex, index and draw lists for one frame of GUI
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayGeometry {
    vertices: Vec<OverlayVertex>,
    indices: Vec<u32>,
    draws: Vec<OverlayDraw>,
}

impl OverlayGeometry {
    /// Flatten the font-textured meshes of `primitives`
    ///
    /// Meshes sampling user textures are skipped, as are meshes clipped to
    /// nothing inside `extent`.
    pub fn from_primitives(primitives: &[ClippedPrimitive], pixels_per_point: f32, extent: vk::Extent2D) -> Self {
        let mut geometry = Self::default();

        for clipped in primitives {
            let Primitive::Mesh(mesh) = &clipped.primitive else {
                continue;
            };
            if mesh.texture_id != TextureId::default() || mesh.indices.is_empty() {
                continue;
            }
            let Some(scissor) = clip_to_scissor(clipped.clip_rect, pixels_per_point, extent) else {
                continue;
            };
            let (Ok(first_index), Ok(index_count), Ok(vertex_offset)) = (
                u32::try_from(geometry.indices.len()),
                u32::try_from(mesh.indices.len()),
                i32::try_from(geometry.vertices.len()),
            ) else {
                break;
            };

            geometry.vertices.extend(mesh.vertices.iter().map(|vertex| OverlayVertex {
                position: [vertex.pos.x, vertex.pos.y],
                tex_coord: [vertex.uv.x, vertex.uv.y],
                color: vertex.color.to_array(),
            }));
            geometry.indices.extend_from_slice(&mesh.indices);
            geometry.draws.push(OverlayDraw {
                first_index,
                index_count,
                vertex_offset,
                scissor,
            });
        }

        geometry
    }

    /// Whether there is nothing to draw
    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    /// Draws in submission order
    pub fn draws(&self) -> &[OverlayDraw] {
        &self.draws
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

/// Clip rectangle in points to a scissor inside `extent`
///
/// Returns `None` when nothing of the rectangle is visible.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn clip_to_scissor(clip: Rect, pixels_per_point: f32, extent: vk::Extent2D) -> Option<vk::Rect2D> {
    let width = extent.width as f32;
    let height = extent.height as f32;

    let min_x = (clip.min.x * pixels_per_point).round().clamp(0.0, width);
    let min_y = (clip.min.y * pixels_per_point).round().clamp(0.0, height);
    let max_x = (clip.max.x * pixels_per_point).round().clamp(min_x, width);
    let max_y = (clip.max.y * pixels_per_point).round().clamp(min_y, height);

    let scissor_width = (max_x - min_x) as u32;
    let scissor_height = (max_y - min_y) as u32;
    if scissor_width == 0 || scissor_height == 0 {
        return None;
    }

    Some(vk::Rect2D {
        offset: vk::Offset2D {
            x: min_x as i32,
            y: min_y as i32,
        },
        extent: vk::Extent2D {
            width: scissor_width,
            height: scissor_height,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::epaint::Mesh;
    use egui::{pos2, Color32};

    const EXTENT: vk::Extent2D = vk::Extent2D { width: 800, height: 600 };

    fn quad(texture_id: TextureId, x: f32) -> Mesh {
        let mut mesh = Mesh::with_texture(texture_id);
        mesh.colored_vertex(pos2(x, 0.0), Color32::WHITE);
        mesh.colored_vertex(pos2(x + 10.0, 0.0), Color32::WHITE);
        mesh.colored_vertex(pos2(x + 10.0, 10.0), Color32::RED);
        mesh.colored_vertex(pos2(x, 10.0), Color32::RED);
        mesh.add_triangle(0, 1, 2);
        mesh.add_triangle(0, 2, 3);
        mesh
    }

    fn clipped(mesh: Mesh, clip_rect: Rect) -> ClippedPrimitive {
        ClippedPrimitive {
            clip_rect,
            primitive: Primitive::Mesh(mesh),
        }
    }

    #[test]
    fn test_vertex_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<OverlayVertex>(), 20);
    }

    #[test]
    fn test_meshes_become_offset_draws() {
        let everything = Rect::from_min_max(pos2(0.0, 0.0), pos2(800.0, 600.0));
        let primitives = [
            clipped(quad(TextureId::default(), 0.0), everything),
            clipped(quad(TextureId::default(), 20.0), everything),
        ];

        let geometry = OverlayGeometry::from_primitives(&primitives, 1.0, EXTENT);

        assert_eq!(geometry.draws().len(), 2);
        assert_eq!(geometry.draws()[1].first_index, 6);
        assert_eq!(geometry.draws()[1].vertex_offset, 4);
        assert_eq!(geometry.draws()[1].index_count, 6);
        assert_eq!(geometry.vertex_bytes().len(), 8 * 20);
        assert_eq!(geometry.index_bytes().len(), 12 * 4);
    }

    #[test]
    fn test_vertex_colors_keep_premultiplied_bytes() {
        let everything = Rect::from_min_max(pos2(0.0, 0.0), pos2(800.0, 600.0));
        let geometry =
            OverlayGeometry::from_primitives(&[clipped(quad(TextureId::default(), 0.0), everything)], 1.0, EXTENT);

        let vertices: &[OverlayVertex] = bytemuck::cast_slice(geometry.vertex_bytes());
        assert_eq!(vertices[2].color, Color32::RED.to_array());
        assert_eq!(vertices[1].position, [10.0, 0.0]);
    }

    #[test]
    fn test_user_textures_and_hidden_meshes_skipped() {
        let everything = Rect::from_min_max(pos2(0.0, 0.0), pos2(800.0, 600.0));
        let offscreen = Rect::from_min_max(pos2(900.0, 700.0), pos2(950.0, 750.0));
        let primitives = [
            clipped(quad(TextureId::User(7), 0.0), everything),
            clipped(quad(TextureId::default(), 0.0), offscreen),
        ];

        let geometry = OverlayGeometry::from_primitives(&primitives, 1.0, EXTENT);
        assert!(geometry.is_empty());
        assert!(geometry.vertex_bytes().is_empty());
    }

    #[test]
    fn test_scissor_scaled_and_clamped() {
        let clip = Rect::from_min_max(pos2(-5.0, 10.0), pos2(500.0, 400.0));
        let scissor = clip_to_scissor(clip, 2.0, EXTENT).unwrap();

        assert_eq!((scissor.offset.x, scissor.offset.y), (0, 20));
        assert_eq!(scissor.extent.width, 800);
        assert_eq!(scissor.extent.height, 580);
    }

    #[test]
    fn test_infinite_clip_covers_extent() {
        let scissor = clip_to_scissor(Rect::EVERYTHING, 1.0, EXTENT).unwrap();
        assert_eq!(scissor.extent, EXTENT);
    }
}
