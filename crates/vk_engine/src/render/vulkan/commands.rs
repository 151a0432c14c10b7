//! Command pools and command buffer recording

use ash::{vk, Device};

use super::{api, VulkanResult};

/// Command pool wrapper with RAII cleanup
///
/// Buffers allocated from the pool may be reset individually.
pub struct CommandPool {
    device: Device,
    command_pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a new command pool
    pub fn new(device: &Device, queue_family_index: u32) -> VulkanResult<Self> {
        let pool_create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        let command_pool = unsafe { device.create_command_pool(&pool_create_info, None) }
            .map_err(api("vkCreateCommandPool"))?;

        Ok(Self {
            device: device.clone(),
            command_pool,
        })
    }

    /// Allocate primary command buffers
    pub fn allocate_command_buffers(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe { self.device.allocate_command_buffers(&alloc_info) }.map_err(api("vkAllocateCommandBuffers"))
    }

    /// Record with `record`, submit to `queue` and wait for the queue to drain
    pub fn submit_one_time<F>(&self, queue: vk::Queue, record: F) -> VulkanResult<()>
    where
        F: FnOnce(&CommandRecorder<'_>) -> VulkanResult<()>,
    {
        let command_buffers = self.allocate_command_buffers(1)?;
        let result = self.record_and_wait(queue, command_buffers[0], record);
        unsafe {
            self.device.free_command_buffers(self.command_pool, &command_buffers);
        }
        result
    }

    fn record_and_wait<F>(&self, queue: vk::Queue, command_buffer: vk::CommandBuffer, record: F) -> VulkanResult<()>
    where
        F: FnOnce(&CommandRecorder<'_>) -> VulkanResult<()>,
    {
        let recorder = CommandRecorder::new(&self.device, command_buffer);
        recorder.begin()?;
        record(&recorder)?;
        recorder.end()?;

        let buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&buffers).build();
        unsafe {
            self.device
                .queue_submit(queue, &[submit_info], vk::Fence::null())
                .map_err(api("vkQueueSubmit"))?;
            self.device.queue_wait_idle(queue).map_err(api("vkQueueWaitIdle"))
        }
    }

    /// Get the command pool handle
    pub fn handle(&self) -> vk::CommandPool {
        self.command_pool
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            // Destroying the pool frees its command buffers
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// Thin recorder over a command buffer the caller owns
pub struct CommandRecorder<'a> {
    device: &'a Device,
    command_buffer: vk::CommandBuffer,
}

impl<'a> CommandRecorder<'a> {
    /// Wrap `command_buffer`
    pub fn new(device: &'a Device, command_buffer: vk::CommandBuffer) -> Self {
        Self { device, command_buffer }
    }

    /// Underlying command buffer
    pub fn handle(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    /// Reset the buffer to the initial state
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe {
            self.device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
        }
        .map_err(api("vkResetCommandBuffer"))
    }

    /// Begin one-time-submit recording
    pub fn begin(&self) -> VulkanResult<()> {
        let begin_info =
            vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe { self.device.begin_command_buffer(self.command_buffer, &begin_info) }
            .map_err(api("vkBeginCommandBuffer"))
    }

    /// Finish recording
    pub fn end(&self) -> VulkanResult<()> {
        unsafe { self.device.end_command_buffer(self.command_buffer) }.map_err(api("vkEndCommandBuffer"))
    }

    /// Begin an inline render pass instance
    pub fn begin_render_pass(
        &self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_values: &[vk::ClearValue],
    ) {
        let render_pass_begin = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(clear_values);

        unsafe {
            self.device
                .cmd_begin_render_pass(self.command_buffer, &render_pass_begin, vk::SubpassContents::INLINE);
        }
    }

    /// End the current render pass instance
    pub fn end_render_pass(&self) {
        unsafe { self.device.cmd_end_render_pass(self.command_buffer) };
    }

    /// Bind a graphics pipeline
    pub fn bind_graphics_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe {
            self.device
                .cmd_bind_pipeline(self.command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline);
        }
    }

    /// Bind one descriptor set at set index 0
    pub fn bind_descriptor_set(&self, layout: vk::PipelineLayout, set: vk::DescriptorSet) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                &[set],
                &[],
            );
        }
    }

    /// Bind a vertex buffer at binding 0
    pub fn bind_vertex_buffer(&self, buffer: vk::Buffer) {
        unsafe {
            self.device
                .cmd_bind_vertex_buffers(self.command_buffer, 0, &[buffer], &[0]);
        }
    }

    /// Bind a 32-bit index buffer
    pub fn bind_index_buffer(&self, buffer: vk::Buffer) {
        unsafe {
            self.device
                .cmd_bind_index_buffer(self.command_buffer, buffer, 0, vk::IndexType::UINT32);
        }
    }

    /// Indexed draw starting at index 0, vertex offset 0, instance 0
    pub fn draw_indexed(&self, index_count: u32, instance_count: u32) {
        unsafe {
            self.device
                .cmd_draw_indexed(self.command_buffer, index_count, instance_count, 0, 0, 0);
        }
    }

    /// Indexed draw of one instance over a sub-range of the bound buffers
    pub fn draw_indexed_range(&self, index_count: u32, first_index: u32, vertex_offset: i32) {
        unsafe {
            self.device
                .cmd_draw_indexed(self.command_buffer, index_count, 1, first_index, vertex_offset, 0);
        }
    }

    /// Set dynamic viewport 0
    pub fn set_viewport(&self, viewport: vk::Viewport) {
        unsafe { self.device.cmd_set_viewport(self.command_buffer, 0, &[viewport]) };
    }

    /// Set dynamic scissor 0
    pub fn set_scissor(&self, scissor: vk::Rect2D) {
        unsafe { self.device.cmd_set_scissor(self.command_buffer, 0, &[scissor]) };
    }

    /// Push constants at offset 0
    pub fn push_constants(&self, layout: vk::PipelineLayout, stages: vk::ShaderStageFlags, data: &[u8]) {
        unsafe {
            self.device
                .cmd_push_constants(self.command_buffer, layout, stages, 0, data);
        }
    }

    /// Copy `size` bytes between buffers
    pub fn copy_buffer(&self, src: vk::Buffer, dst: vk::Buffer, size: vk::DeviceSize) {
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size,
        };
        unsafe {
            self.device.cmd_copy_buffer(self.command_buffer, src, dst, &[region]);
        }
    }

    /// Copy a tightly packed buffer into mip 0 of a color image in TRANSFER_DST layout
    pub fn copy_buffer_to_image(&self, src: vk::Buffer, image: vk::Image, extent: vk::Extent2D) {
        let region = vk::BufferImageCopy::builder()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
            .image_extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .build();

        unsafe {
            self.device.cmd_copy_buffer_to_image(
                self.command_buffer,
                src,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        }
    }

    /// Record a single image memory barrier
    pub fn image_barrier(
        &self,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        barrier: vk::ImageMemoryBarrier,
    ) {
        unsafe {
            self.device.cmd_pipeline_barrier(
                self.command_buffer,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
    }
}
