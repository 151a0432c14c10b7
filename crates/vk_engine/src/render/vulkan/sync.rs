//! Vulkan synchronization primitives and per-frame slots
//!
//! Semaphores order queue operations (acquire -> render -> present); fences
//! let the CPU wait until a slot's previous submission has finished before
//! its command buffer and uniform buffer are reused.

use ash::{vk, Device};

use super::commands::CommandPool;
use super::{api, VulkanResult};

/// GPU-GPU synchronization primitive with automatic resource management
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a new semaphore
    pub fn new(device: &Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();

        let semaphore =
            unsafe { device.create_semaphore(&create_info, None) }.map_err(api("vkCreateSemaphore"))?;

        Ok(Self {
            device: device.clone(),
            semaphore,
        })
    }

    /// Get the semaphore handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Fence wrapper with RAII cleanup
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a new fence, optionally already signaled
    pub fn new(device: &Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::builder().flags(flags);

        let fence = unsafe { device.create_fence(&create_info, None) }.map_err(api("vkCreateFence"))?;

        Ok(Self {
            device: device.clone(),
            fence,
        })
    }

    /// Block until the fence is signaled or `timeout` nanoseconds pass
    pub fn wait(&self, timeout: u64) -> VulkanResult<()> {
        unsafe { self.device.wait_for_fences(&[self.fence], true, timeout) }.map_err(api("vkWaitForFences"))
    }

    /// Reset fence
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe { self.device.reset_fences(&[self.fence]) }.map_err(api("vkResetFences"))
    }

    /// Get the fence handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

/// One frame-in-flight worth of recording and synchronization state
///
/// The command buffer is freed together with its pool.
pub struct FrameSlot {
    /// Signaled when the acquired swapchain image is ready
    pub image_acquired: Semaphore,
    /// Signaled when the slot's last submission completes
    pub in_flight: Fence,
    command_buffer: vk::CommandBuffer,
    _command_pool: CommandPool,
}

impl FrameSlot {
    /// Create a slot whose fence starts signaled so the first wait returns
    pub fn new(device: &Device, graphics_family: u32) -> VulkanResult<Self> {
        let command_pool = CommandPool::new(device, graphics_family)?;
        let command_buffer = command_pool
            .allocate_command_buffers(1)?
            .into_iter()
            .next()
            .ok_or_else(|| super::VulkanError::InitializationFailed("no command buffer allocated".to_string()))?;

        Ok(Self {
            image_acquired: Semaphore::new(device)?,
            in_flight: Fence::new(device, true)?,
            command_buffer,
            _command_pool: command_pool,
        })
    }

    /// Replace the image-acquired semaphore
    ///
    /// A suboptimal acquire leaves the old semaphore signaled with nothing
    /// waiting on it, so slots get fresh ones whenever the chain is rebuilt.
    pub fn renew_image_acquired(&mut self, device: &Device) -> VulkanResult<()> {
        self.image_acquired = Semaphore::new(device)?;
        Ok(())
    }

    /// Command buffer recorded for this slot
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }
}
