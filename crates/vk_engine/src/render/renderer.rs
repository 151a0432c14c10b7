//! Vulkan mesh renderer
//!
//! Owns the device context and everything built on it, uploads the mesh and
//! texture once, and renders one frame per [`Renderer::tick`]. Swapchain
//! rebuilds are deferred to the start of the next tick.

use ash::{vk, Device};

use crate::assets::image::ImageData;
use crate::config::{premultiply, RendererConfig};
use crate::foundation::time::Timer;
use crate::render::camera::{Camera, ModelSpin};
use crate::render::frame::{
    AcquireOutcome, DrawCommand, FrameBackend, FrameLoop, FrameOutcome, PresentOutcome, RebuildPlan,
};
use crate::render::mesh::Mesh;
use crate::render::overlay::{FrameStats, GuiOverlay, OverlayHandoff, OverlayInput, OverlayTarget, RendererControls};
use crate::render::vulkan::commands::{CommandPool, CommandRecorder};
use crate::render::vulkan::descriptor::write_mesh_set;
use crate::render::vulkan::image::DepthImage;
use crate::render::vulkan::render_process::{RenderProcess, TargetDescription};
use crate::render::vulkan::swapchain::{Swapchain, SwapchainSettings, SwapchainSupport};
use crate::render::vulkan::sync::{FrameSlot, Semaphore};
use crate::render::vulkan::texture::Texture;
use crate::render::vulkan::transfer::{MeshBuffers, VulkanTransfer};
use crate::render::vulkan::uniform::{UniformBufferObject, UniformBuffers};
use crate::render::vulkan::{api, SurfaceProvider, VulkanContext, VulkanError, VulkanResult};

/// Renders one textured mesh into a window surface
///
/// Field order is drop order: everything built on the context goes first.
pub struct Renderer {
    overlay: Option<Box<dyn GuiOverlay>>,
    frame_loop: FrameLoop,
    slots: Vec<FrameSlot>,
    render_complete: Vec<Semaphore>,
    descriptor_sets: Vec<vk::DescriptorSet>,
    uniforms: UniformBuffers,
    texture: Texture,
    mesh_buffers: MeshBuffers,
    swapchain: Swapchain,
    render_process: RenderProcess,
    depth: DepthImage,
    upload_pool: CommandPool,
    camera: Camera,
    spin: ModelSpin,
    controls: RendererControls,
    context: VulkanContext,
}

impl Renderer {
    /// Bring up Vulkan on `surface` and upload `mesh` and `image`
    pub fn new(
        surface: &mut dyn SurfaceProvider,
        config: &RendererConfig,
        mesh: &Mesh,
        image: &ImageData,
    ) -> VulkanResult<Self> {
        let context = VulkanContext::new(surface, &config.application_name, config.validation_enabled())?;
        let device = context.device();
        let graphics_family = context.queue_families().graphics;
        let upload_pool = CommandPool::new(device, graphics_family)?;

        let support = SwapchainSupport::query(&context)?;
        let settings = SwapchainSettings::negotiate(&support, surface.framebuffer_size())?
            .ok_or_else(|| VulkanError::InitializationFailed("window has no drawable area".to_string()))?;

        let mut swapchain = Swapchain::new(&context, settings, None)?;
        let depth = DepthImage::new(&context, &upload_pool, settings.extent)?;
        let render_process = RenderProcess::new(
            &context,
            &config.shaders.resolved_vertex(),
            &config.shaders.resolved_fragment(),
            TargetDescription {
                color_format: settings.surface_format.format,
                depth_format: depth.format(),
                extent: settings.extent,
            },
        )?;
        swapchain.create_framebuffers(&context, render_process.render_pass(), depth.view())?;

        let mut transfer = VulkanTransfer::new(&context, &upload_pool);
        let mesh_buffers = MeshBuffers::upload(&mut transfer, mesh)?;
        let texture = Texture::upload(&mut transfer, image)?;

        let frames_in_flight = config.frames_in_flight();
        let uniforms = UniformBuffers::new(&context, frames_in_flight)?;

        let layouts = vec![context.descriptor_set_layout().handle(); frames_in_flight];
        let descriptor_sets = context.descriptor_pool().allocate(&layouts)?;
        for (slot, &set) in descriptor_sets.iter().enumerate() {
            write_mesh_set(
                device,
                set,
                uniforms.handle(slot)?,
                uniforms.range(),
                texture.view(),
                texture.sampler(),
            );
        }

        let slots = (0..frames_in_flight)
            .map(|_| FrameSlot::new(device, graphics_family))
            .collect::<VulkanResult<Vec<_>>>()?;
        let render_complete = create_semaphores(device, swapchain.image_count())?;

        log::info!(
            "Renderer ready: {} frames in flight, {} swapchain images",
            frames_in_flight,
            swapchain.image_count()
        );

        Ok(Self {
            overlay: None,
            frame_loop: FrameLoop::new(frames_in_flight),
            slots,
            render_complete,
            descriptor_sets,
            uniforms,
            texture,
            mesh_buffers,
            swapchain,
            render_process,
            depth,
            upload_pool,
            camera: Camera::default(),
            spin: ModelSpin::new(config.rotation_degrees_per_second),
            controls: RendererControls::new(config.clear_color),
            context,
        })
    }

    /// Install a GUI overlay, replacing any previous one
    ///
    /// The overlay is attached to the current render pass and descriptor
    /// pool before it is stored.
    pub fn set_overlay(&mut self, mut overlay: Box<dyn GuiOverlay>) -> VulkanResult<()> {
        self.context.wait_idle()?;
        self.overlay = None;
        overlay.attach(&self.overlay_target())?;
        self.overlay = Some(overlay);
        Ok(())
    }

    /// Forward window input to the overlay, if one is installed
    pub fn handle_overlay_input(&mut self, input: &OverlayInput) {
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.handle_input(input);
        }
    }

    /// Whether the overlay asked the application to exit
    pub fn quit_requested(&self) -> bool {
        self.controls.quit_requested
    }

    /// Rebuild the swapchain before the next frame
    pub fn request_rebuild(&mut self) {
        self.frame_loop.request_rebuild();
    }

    /// Handle a pending rebuild, then render one frame at `timer`'s time
    ///
    /// Returns `None` when no frame was attempted because the window has
    /// zero area.
    pub fn tick(&mut self, surface: &dyn SurfaceProvider, timer: &Timer) -> VulkanResult<Option<FrameOutcome>> {
        match self.frame_loop.plan_rebuild(surface.framebuffer_size()) {
            RebuildPlan::NotNeeded => {}
            RebuildPlan::Suspended => return Ok(None),
            RebuildPlan::Rebuild { width, height } => {
                if !self.rebuild((width, height))? {
                    return Ok(None);
                }
            }
        }

        let extent = self.swapchain.extent();
        if let Some(mut overlay) = self.overlay.take() {
            let mut controls = self.controls;
            let stats = FrameStats::from_timer(timer);
            let prepared = overlay.prepare(&self.overlay_target(), extent, &stats, &mut controls);
            self.overlay = Some(overlay);
            prepared?;
            self.controls = controls;
        }

        let mut frame = VulkanFrame {
            context: &self.context,
            swapchain: &self.swapchain,
            render_process: &self.render_process,
            mesh: &self.mesh_buffers,
            uniforms: &self.uniforms,
            descriptor_sets: &self.descriptor_sets,
            slots: &self.slots,
            render_complete: &self.render_complete,
            overlay: self.overlay.as_deref_mut(),
            ubo: UniformBufferObject::for_frame(&self.camera, &self.spin, timer.total_time(), extent),
            clear_color: premultiply(self.controls.clear_color),
            extent,
        };

        self.frame_loop.render_frame(&mut frame).map(Some)
    }

    /// Block until the device has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        self.context.wait_idle()
    }

    /// Device access and handles an overlay builds against
    fn overlay_target(&self) -> OverlayTarget<'_> {
        OverlayTarget {
            context: &self.context,
            upload_pool: &self.upload_pool,
            handoff: OverlayHandoff {
                render_pass: self.render_process.render_pass(),
                descriptor_pool: self.context.descriptor_pool().handle(),
                image_count: self.swapchain.image_count(),
                frames_in_flight: self.slots.len(),
            },
        }
    }

    /// Recreate the chain and everything sized by it
    ///
    /// Returns `false` when the surface currently has zero area.
    fn rebuild(&mut self, window_size: (u32, u32)) -> VulkanResult<bool> {
        let support = SwapchainSupport::query(&self.context)?;
        let Some(settings) = SwapchainSettings::negotiate(&support, window_size)? else {
            return Ok(false);
        };

        self.context.wait_idle()?;
        self.swapchain.clear_framebuffers();

        let swapchain = Swapchain::new(&self.context, settings, Some(&self.swapchain))?;
        self.swapchain = swapchain;
        self.depth = DepthImage::new(&self.context, &self.upload_pool, settings.extent)?;

        self.render_process.rebuild(
            &self.context,
            TargetDescription {
                color_format: settings.surface_format.format,
                depth_format: self.depth.format(),
                extent: settings.extent,
            },
        )?;
        self.swapchain
            .create_framebuffers(&self.context, self.render_process.render_pass(), self.depth.view())?;

        let device = self.context.device();
        self.render_complete = create_semaphores(device, self.swapchain.image_count())?;
        for slot in &mut self.slots {
            slot.renew_image_acquired(device)?;
        }

        if let Some(mut overlay) = self.overlay.take() {
            let attached = overlay.attach(&self.overlay_target());
            self.overlay = Some(overlay);
            attached?;
        }

        self.frame_loop.rebuild_completed();
        log::info!(
            "Swapchain rebuilt at {}x{}",
            settings.extent.width,
            settings.extent.height
        );
        Ok(true)
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.context.wait_idle() {
            log::error!("Device wait failed during shutdown: {}", e);
        }
        if let Err(e) = self.context.descriptor_pool().free(&self.descriptor_sets) {
            log::warn!("Failed to free descriptor sets: {}", e);
        }
    }
}

fn create_semaphores(device: &Device, count: usize) -> VulkanResult<Vec<Semaphore>> {
    (0..count).map(|_| Semaphore::new(device)).collect()
}

/// Borrowed view of the renderer for one frame
struct VulkanFrame<'a> {
    context: &'a VulkanContext,
    swapchain: &'a Swapchain,
    render_process: &'a RenderProcess,
    mesh: &'a MeshBuffers,
    uniforms: &'a UniformBuffers,
    descriptor_sets: &'a [vk::DescriptorSet],
    slots: &'a [FrameSlot],
    render_complete: &'a [Semaphore],
    overlay: Option<&'a mut (dyn GuiOverlay + 'static)>,
    ubo: UniformBufferObject,
    clear_color: [f32; 4],
    extent: vk::Extent2D,
}

impl VulkanFrame<'_> {
    fn slot(&self, slot: usize) -> VulkanResult<&FrameSlot> {
        self.slots.get(slot).ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("no frame slot {}", slot),
        })
    }

    fn recorder(&self, slot: usize) -> VulkanResult<CommandRecorder<'_>> {
        let command_buffer = self.slot(slot)?.command_buffer();
        Ok(CommandRecorder::new(self.context.device(), command_buffer))
    }

    fn render_complete(&self, image_index: u32) -> VulkanResult<vk::Semaphore> {
        self.render_complete
            .get(image_index as usize)
            .map(Semaphore::handle)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("no render-complete semaphore for image {}", image_index),
            })
    }
}

impl FrameBackend for VulkanFrame<'_> {
    type Error = VulkanError;

    fn wait_for_slot(&mut self, slot: usize) -> VulkanResult<()> {
        self.slot(slot)?.in_flight.wait(u64::MAX)
    }

    fn acquire_image(&mut self, slot: usize) -> VulkanResult<AcquireOutcome> {
        let semaphore = self.slot(slot)?.image_acquired.handle();
        Ok(match self.swapchain.acquire_next_image(semaphore)? {
            Some(index) => AcquireOutcome::Acquired(index),
            None => AcquireOutcome::OutOfDate,
        })
    }

    fn reset_slot(&mut self, slot: usize) -> VulkanResult<()> {
        self.slot(slot)?.in_flight.reset()
    }

    fn update_uniforms(&mut self, slot: usize) -> VulkanResult<()> {
        self.uniforms.update(slot, &self.ubo)
    }

    fn begin_frame(&mut self, slot: usize, image_index: u32) -> VulkanResult<()> {
        let set = *self.descriptor_sets.get(slot).ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("no descriptor set for frame slot {}", slot),
        })?;
        let framebuffer = self.swapchain.framebuffer(image_index)?;
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            },
        ];

        let recorder = self.recorder(slot)?;
        recorder.reset()?;
        recorder.begin()?;
        recorder.begin_render_pass(self.render_process.render_pass(), framebuffer, self.extent, &clear_values);
        recorder.bind_graphics_pipeline(self.render_process.pipeline());
        recorder.bind_descriptor_set(self.render_process.layout(), set);
        recorder.bind_vertex_buffer(self.mesh.vertex_buffer());
        recorder.bind_index_buffer(self.mesh.index_buffer());
        Ok(())
    }

    fn index_count(&self) -> u32 {
        self.mesh.index_count()
    }

    fn draw_indexed(&mut self, slot: usize, draw: DrawCommand) -> VulkanResult<()> {
        self.recorder(slot)?.draw_indexed(draw.index_count, draw.instance_count);
        Ok(())
    }

    fn record_overlay(&mut self, slot: usize) -> VulkanResult<()> {
        let command_buffer = self.slot(slot)?.command_buffer();
        match self.overlay.as_deref_mut() {
            Some(overlay) => overlay.record(self.context, command_buffer, slot, self.extent),
            None => Ok(()),
        }
    }

    fn end_frame(&mut self, slot: usize) -> VulkanResult<()> {
        let recorder = self.recorder(slot)?;
        recorder.end_render_pass();
        recorder.end()
    }

    fn submit(&mut self, slot: usize, image_index: u32) -> VulkanResult<()> {
        let frame_slot = self.slot(slot)?;
        let wait_semaphores = [frame_slot.image_acquired.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [frame_slot.command_buffer()];
        let signal_semaphores = [self.render_complete(image_index)?];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        unsafe {
            self.context
                .device()
                .queue_submit(self.context.graphics_queue(), &[submit_info], frame_slot.in_flight.handle())
        }
        .map_err(api("vkQueueSubmit"))
    }

    fn present(&mut self, image_index: u32) -> VulkanResult<PresentOutcome> {
        let wait = self.render_complete(image_index)?;
        let presented = self
            .swapchain
            .present(self.context.present_queue(), image_index, wait)?;
        Ok(if presented {
            PresentOutcome::Presented
        } else {
            PresentOutcome::OutOfDate
        })
    }
}
