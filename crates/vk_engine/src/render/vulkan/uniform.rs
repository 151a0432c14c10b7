//! Per-frame uniform data: model, view and projection matrices

use ash::vk;

use super::buffer::Buffer;
use super::{VulkanContext, VulkanError, VulkanResult};
use crate::foundation::math::to_column_array;
use crate::render::camera::{Camera, ModelSpin};

/// Uniform block matching `binding = 0` in the vertex shader
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformBufferObject {
    /// Model transform, column-major
    pub model: [[f32; 4]; 4],
    /// View transform, column-major
    pub view: [[f32; 4]; 4],
    /// Projection, column-major
    pub proj: [[f32; 4]; 4],
}

unsafe impl bytemuck::Pod for UniformBufferObject {}
unsafe impl bytemuck::Zeroable for UniformBufferObject {}

impl UniformBufferObject {
    /// Matrices for `elapsed_seconds` into the run at the given viewport size
    #[allow(clippy::cast_precision_loss)]
    pub fn for_frame(camera: &Camera, spin: &ModelSpin, elapsed_seconds: f32, extent: vk::Extent2D) -> Self {
        let aspect = if extent.height == 0 {
            1.0
        } else {
            extent.width as f32 / extent.height as f32
        };

        Self {
            model: to_column_array(&spin.model_matrix(elapsed_seconds)),
            view: to_column_array(&camera.view_matrix()),
            proj: to_column_array(&camera.projection_matrix(aspect)),
        }
    }
}

/// One host-visible uniform buffer per frame slot
pub struct UniformBuffers {
    buffers: Vec<Buffer>,
}

impl UniformBuffers {
    /// Allocate `count` buffers sized for [`UniformBufferObject`]
    pub fn new(context: &VulkanContext, count: usize) -> VulkanResult<Self> {
        let size = std::mem::size_of::<UniformBufferObject>() as vk::DeviceSize;
        let buffers = (0..count)
            .map(|_| {
                Buffer::new(
                    context,
                    size,
                    vk::BufferUsageFlags::UNIFORM_BUFFER,
                    vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
                )
            })
            .collect::<VulkanResult<Vec<_>>>()?;

        Ok(Self { buffers })
    }

    /// Write `ubo` into the buffer of `slot`
    pub fn update(&self, slot: usize, ubo: &UniformBufferObject) -> VulkanResult<()> {
        self.get(slot)?.write_data(std::slice::from_ref(ubo))
    }

    /// Buffer handle of `slot`
    pub fn handle(&self, slot: usize) -> VulkanResult<vk::Buffer> {
        Ok(self.get(slot)?.handle())
    }

    /// Byte size of one uniform block
    pub fn range(&self) -> vk::DeviceSize {
        std::mem::size_of::<UniformBufferObject>() as vk::DeviceSize
    }

    fn get(&self, slot: usize) -> VulkanResult<&Buffer> {
        self.buffers.get(slot).ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("no uniform buffer for frame slot {}", slot),
        })
    }
}
