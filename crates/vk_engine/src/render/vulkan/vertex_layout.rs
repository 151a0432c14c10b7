//! Vertex input descriptions for [`Vertex`] and [`OverlayVertex`]

use std::mem::{offset_of, size_of};

use ash::vk;

use crate::render::gui::geometry::OverlayVertex;
use crate::render::mesh::Vertex;

/// Vertex buffer binding slot
pub const VERTEX_BINDING: u32 = 0;

/// Vulkan vertex layout for the engine's Vertex type
pub struct VulkanVertexLayout;

impl VulkanVertexLayout {
    /// Per-vertex binding with the struct's stride
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: VERTEX_BINDING,
            stride: size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Position, color, texture coordinate and normal at locations 0 to 3
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 4] {
        [
            attribute(0, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, position)),
            attribute(1, vk::Format::R32G32B32A32_SFLOAT, offset_of!(Vertex, color)),
            attribute(2, vk::Format::R32G32_SFLOAT, offset_of!(Vertex, tex_coord)),
            attribute(3, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, normal)),
        ]
    }
}

/// Vertex layout of tessellated GUI geometry
pub struct OverlayVertexLayout;

impl OverlayVertexLayout {
    /// Per-vertex binding with the struct's stride
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: VERTEX_BINDING,
            stride: size_of::<OverlayVertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Position, texture coordinate and normalized byte color at locations 0 to 2
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
        [
            attribute(0, vk::Format::R32G32_SFLOAT, offset_of!(OverlayVertex, position)),
            attribute(1, vk::Format::R32G32_SFLOAT, offset_of!(OverlayVertex, tex_coord)),
            attribute(2, vk::Format::R8G8B8A8_UNORM, offset_of!(OverlayVertex, color)),
        ]
    }
}

fn attribute(location: u32, format: vk::Format, offset: usize) -> vk::VertexInputAttributeDescription {
    vk::VertexInputAttributeDescription {
        binding: VERTEX_BINDING,
        location,
        format,
        offset: offset as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stride_matches_vertex() {
        assert_eq!(VulkanVertexLayout::binding_description().stride, 48);
    }

    #[test]
    fn test_attribute_offsets_are_packed() {
        let offsets: Vec<u32> = VulkanVertexLayout::attribute_descriptions()
            .iter()
            .map(|attribute| attribute.offset)
            .collect();
        assert_eq!(offsets, vec![0, 12, 28, 36]);
    }

    #[test]
    fn test_locations_are_sequential() {
        for (expected, attribute) in VulkanVertexLayout::attribute_descriptions().iter().enumerate() {
            assert_eq!(attribute.location, expected as u32);
            assert_eq!(attribute.binding, VERTEX_BINDING);
        }
    }

    #[test]
    fn test_overlay_layout_is_packed() {
        assert_eq!(OverlayVertexLayout::binding_description().stride, 20);
        let offsets: Vec<u32> = OverlayVertexLayout::attribute_descriptions()
            .iter()
            .map(|attribute| attribute.offset)
            .collect();
        assert_eq!(offsets, vec![0, 8, 16]);
    }
}
