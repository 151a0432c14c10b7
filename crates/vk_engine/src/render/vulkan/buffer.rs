//! Buffers backed by dedicated device memory

use ash::{vk, Device};

use super::memory::DeviceMemory;
use super::{api, VulkanContext, VulkanError, VulkanResult};

/// Buffer wrapper with memory management
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: DeviceMemory,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Create a buffer of exactly `size` bytes with its own memory block
    pub fn new(
        context: &VulkanContext,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        if size == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: "zero-sized buffer".to_string(),
            });
        }

        let device = context.device();
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.create_buffer(&buffer_info, None) }.map_err(api("vkCreateBuffer"))?;

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let bound = DeviceMemory::allocate(
            device,
            &context.physical_device().memory_properties,
            requirements,
            properties,
        )
        .and_then(|memory| {
            unsafe { device.bind_buffer_memory(buffer, memory.handle(), 0) }
                .map_err(api("vkBindBufferMemory"))?;
            Ok(memory)
        });

        let memory = match bound {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        Ok(Self {
            device: device.clone(),
            buffer,
            memory,
            size,
        })
    }

    /// Write bytes at offset 0 via map/copy/unmap; buffer must be host-visible
    pub fn write_bytes(&self, data: &[u8]) -> VulkanResult<()> {
        if data.len() as vk::DeviceSize > self.size {
            return Err(VulkanError::InvalidOperation {
                reason: format!("{} bytes do not fit a {} byte buffer", data.len(), self.size),
            });
        }
        self.memory.write_bytes(0, data)
    }

    /// Write plain-old-data values
    pub fn write_data<T: bytemuck::Pod>(&self, data: &[T]) -> VulkanResult<()> {
        self.write_bytes(bytemuck::cast_slice(data))
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Get size
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        // Memory is freed afterwards when the `memory` field drops
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
        }
    }
}
