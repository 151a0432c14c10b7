//! Device memory selection and dedicated allocations
//!
//! Every buffer and image gets its own `vkAllocateMemory` block bound at
//! offset 0. There is no sub-allocation.

use ash::{vk, Device};

use super::{api, VulkanError, VulkanResult};

/// Lowest memory type index allowed by `type_filter` whose flags contain `required`
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    required: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    let count = memory_properties.memory_type_count.min(vk::MAX_MEMORY_TYPES as u32);

    (0..count)
        .find(|&index| {
            let allowed = type_filter & (1 << index) != 0;
            let flags = memory_properties.memory_types[index as usize].property_flags;
            allowed && flags.contains(required)
        })
        .ok_or(VulkanError::NoSuitableMemoryType { type_filter, required })
}

/// One dedicated device memory block
pub struct DeviceMemory {
    device: Device,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl DeviceMemory {
    /// Allocate memory satisfying `requirements` with the `required` properties
    pub fn allocate(
        device: &Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        requirements: vk::MemoryRequirements,
        required: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        let memory_type_index = find_memory_type(memory_properties, requirements.memory_type_bits, required)?;

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        let memory = unsafe { device.allocate_memory(&alloc_info, None) }.map_err(api("vkAllocateMemory"))?;

        Ok(Self {
            device: device.clone(),
            memory,
            size: requirements.size,
        })
    }

    /// Copy `data` to `offset` through a temporary host mapping
    ///
    /// The memory must be host-visible; host-coherent memory needs no flush.
    pub fn write_bytes(&self, offset: vk::DeviceSize, data: &[u8]) -> VulkanResult<()> {
        let len = data.len() as vk::DeviceSize;
        if offset + len > self.size {
            return Err(VulkanError::InvalidOperation {
                reason: format!("write of {} bytes at {} exceeds allocation of {}", len, offset, self.size),
            });
        }

        unsafe {
            let ptr = self
                .device
                .map_memory(self.memory, offset, len, vk::MemoryMapFlags::empty())
                .map_err(api("vkMapMemory"))?;
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.cast::<u8>(), data.len());
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }

    /// Memory handle
    pub fn handle(&self) -> vk::DeviceMemory {
        self.memory
    }

    /// Allocation size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for DeviceMemory {
    fn drop(&mut self) {
        unsafe {
            self.device.free_memory(self.memory, None);
        }
    }
}
