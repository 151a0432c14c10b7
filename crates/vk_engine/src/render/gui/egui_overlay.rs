//! egui debug overlay drawn inside the main render pass

use std::path::{Path, PathBuf};
use std::time::Instant;

use ash::{vk, Device};

use super::atlas::FontAtlas;
use super::geometry::OverlayGeometry;
use super::panel::{DebugPanel, InputCollector};
use crate::assets::AssetError;
use crate::config::OverlaySettings;
use crate::render::overlay::{
    FrameStats, GuiOverlay, OverlayHandoff, OverlayInput, OverlayTarget, Rebind, RendererControls,
};
use crate::render::vulkan::descriptor::{overlay_layout_builder, write_image_set, OVERLAY_FONT_BINDING};
use crate::render::vulkan::pipeline::{overlay_push_constant_range, viewport_for, GraphicsPipeline, PipelineLayout};
use crate::render::vulkan::shader::ShaderModule;
use crate::render::vulkan::{
    api, Buffer, CommandRecorder, DescriptorSetLayout, Texture, VulkanContext, VulkanError, VulkanResult,
    VulkanTransfer,
};

const MIN_BUFFER_BYTES: vk::DeviceSize = 64 * 1024;

const HOST_COHERENT: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
    vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw() | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
);

/// Host-visible geometry buffers owned by one frame slot
#[derive(Default)]
struct SlotBuffers {
    vertices: Option<Buffer>,
    indices: Option<Buffer>,
}

/// Everything built against one [`OverlayHandoff`]
///
/// The descriptor set is returned to the handed pool on drop, before any
/// field goes. Field order is drop order: the pipeline before its layout.
struct OverlayGpu {
    pipeline: GraphicsPipeline,
    slots: Vec<SlotBuffers>,
    font: Option<Texture>,
    layout: PipelineLayout,
    _set_layout: DescriptorSetLayout,
    vertex_shader: ShaderModule,
    fragment_shader: ShaderModule,
    descriptor_set: vk::DescriptorSet,
    handoff: OverlayHandoff,
    device: Device,
}

impl OverlayGpu {
    fn new(target: &OverlayTarget<'_>, vertex_path: &Path, fragment_path: &Path) -> VulkanResult<Self> {
        let device = target.context.device();
        let handoff = target.handoff;

        let vertex_shader = ShaderModule::from_file(device, vertex_path)?;
        let fragment_shader = ShaderModule::from_file(device, fragment_path)?;
        let set_layout = overlay_layout_builder().build(device)?;
        let layout =
            PipelineLayout::with_push_constants(device, &[set_layout.handle()], &[overlay_push_constant_range()])?;
        let pipeline =
            GraphicsPipeline::new_overlay(device, handoff.render_pass, &layout, &vertex_shader, &fragment_shader)?;

        let set_layouts = [set_layout.handle()];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(handoff.descriptor_pool)
            .set_layouts(&set_layouts);
        let descriptor_set = unsafe { device.allocate_descriptor_sets(&alloc_info) }
            .map_err(api("vkAllocateDescriptorSets"))?
            .into_iter()
            .next()
            .ok_or_else(|| VulkanError::InitializationFailed("no overlay descriptor set allocated".to_string()))?;

        let slots = (0..handoff.frames_in_flight).map(|_| SlotBuffers::default()).collect();

        log::info!(
            "GUI overlay attached ({} frame slots, {} swapchain images)",
            handoff.frames_in_flight,
            handoff.image_count
        );

        Ok(Self {
            pipeline,
            slots,
            font: None,
            layout,
            _set_layout: set_layout,
            vertex_shader,
            fragment_shader,
            descriptor_set,
            handoff,
            device: device.clone(),
        })
    }

    fn rebuild_pipeline(&mut self, render_pass: vk::RenderPass) -> VulkanResult<()> {
        self.pipeline = GraphicsPipeline::new_overlay(
            &self.device,
            render_pass,
            &self.layout,
            &self.vertex_shader,
            &self.fragment_shader,
        )?;
        log::debug!("GUI overlay pipeline rebuilt for new render pass");
        Ok(())
    }
}

impl Drop for OverlayGpu {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self
                .device
                .free_descriptor_sets(self.handoff.descriptor_pool, &[self.descriptor_set])
            {
                log::warn!("Failed to free overlay descriptor set: {:?}", e);
            }
        }
    }
}

/// egui overlay showing the debug panel
pub struct EguiOverlay {
    gpu: Option<OverlayGpu>,
    context: egui::Context,
    input: InputCollector,
    panel: DebugPanel,
    atlas: FontAtlas,
    atlas_dirty: bool,
    geometry: OverlayGeometry,
    pixels_per_point: f32,
    started: Instant,
    vertex_path: PathBuf,
    fragment_path: PathBuf,
}

impl EguiOverlay {
    /// Overlay loading its shaders from `settings`
    pub fn new(settings: &OverlaySettings) -> Self {
        Self {
            gpu: None,
            context: egui::Context::default(),
            input: InputCollector::default(),
            panel: DebugPanel::default(),
            atlas: FontAtlas::default(),
            atlas_dirty: false,
            geometry: OverlayGeometry::default(),
            pixels_per_point: 1.0,
            started: Instant::now(),
            vertex_path: PathBuf::from(settings.resolved_vertex()),
            fragment_path: PathBuf::from(settings.resolved_fragment()),
        }
    }

    /// Run egui for one frame and keep its geometry and atlas changes
    fn run_frame(
        &mut self,
        extent: vk::Extent2D,
        stats: &FrameStats,
        controls: &mut RendererControls,
    ) -> Result<(), AssetError> {
        let raw_input = self.input.take_raw_input(extent, self.started.elapsed().as_secs_f64());
        let panel = &self.panel;
        let output = self.context.run(raw_input, |ctx| panel.show(ctx, stats, controls));

        for (id, delta) in &output.textures_delta.set {
            if self.atlas.apply(*id, delta)? {
                self.atlas_dirty = true;
            }
        }

        self.pixels_per_point = output.pixels_per_point;
        let primitives = self.context.tessellate(output.shapes, output.pixels_per_point);
        self.geometry = OverlayGeometry::from_primitives(&primitives, self.pixels_per_point, extent);
        Ok(())
    }

    fn upload_atlas(&mut self, target: &OverlayTarget<'_>) -> VulkanResult<()> {
        let Some(gpu) = self.gpu.as_mut() else {
            return Ok(());
        };
        let image = self.atlas.to_image().map_err(|e| VulkanError::InvalidOperation {
            reason: e.to_string(),
        })?;

        // The previous atlas may still be sampled by frames in flight
        target.context.wait_idle()?;

        let mut transfer = VulkanTransfer::new(target.context, target.upload_pool);
        let font = Texture::upload_clamped(&mut transfer, &image)?;
        write_image_set(
            target.context.device(),
            gpu.descriptor_set,
            OVERLAY_FONT_BINDING,
            font.view(),
            font.sampler(),
        );
        gpu.font = Some(font);
        self.atlas_dirty = false;

        let [width, height] = self.atlas.size();
        log::debug!("GUI font atlas uploaded ({}x{})", width, height);
        Ok(())
    }
}

impl GuiOverlay for EguiOverlay {
    fn attach(&mut self, target: &OverlayTarget<'_>) -> VulkanResult<()> {
        let previous = self.gpu.as_ref().map(|gpu| gpu.handoff);
        match target.handoff.rebind_from(previous.as_ref()) {
            Rebind::Everything => {
                self.gpu = None;
                self.gpu = Some(OverlayGpu::new(target, &self.vertex_path, &self.fragment_path)?);
                self.atlas_dirty = !self.atlas.is_empty();
                if self.atlas_dirty {
                    self.upload_atlas(target)?;
                }
            }
            Rebind::Pipeline => {
                if let Some(gpu) = self.gpu.as_mut() {
                    gpu.rebuild_pipeline(target.handoff.render_pass)?;
                    gpu.handoff = target.handoff;
                }
            }
            Rebind::Nothing => {
                if let Some(gpu) = self.gpu.as_mut() {
                    gpu.handoff = target.handoff;
                }
            }
        }
        Ok(())
    }

    fn handle_input(&mut self, input: &OverlayInput) {
        self.input.push(input);
    }

    fn prepare(
        &mut self,
        target: &OverlayTarget<'_>,
        extent: vk::Extent2D,
        stats: &FrameStats,
        controls: &mut RendererControls,
    ) -> VulkanResult<()> {
        self.run_frame(extent, stats, controls)
            .map_err(|e| VulkanError::InvalidOperation { reason: e.to_string() })?;

        if self.atlas_dirty {
            self.upload_atlas(target)?;
        }
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn record(
        &mut self,
        context: &VulkanContext,
        command_buffer: vk::CommandBuffer,
        slot: usize,
        extent: vk::Extent2D,
    ) -> VulkanResult<()> {
        let Some(gpu) = self.gpu.as_mut() else {
            return Ok(());
        };
        if self.geometry.is_empty() || gpu.font.is_none() {
            return Ok(());
        }

        let frames_in_flight = gpu.slots.len();
        let buffers = gpu.slots.get_mut(slot).ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("overlay slot {} of {}", slot, frames_in_flight),
        })?;
        let vertex_buffer = write_host_buffer(
            context,
            &mut buffers.vertices,
            self.geometry.vertex_bytes(),
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;
        let index_buffer = write_host_buffer(
            context,
            &mut buffers.indices,
            self.geometry.index_bytes(),
            vk::BufferUsageFlags::INDEX_BUFFER,
        )?;

        let screen_size = [
            extent.width as f32 / self.pixels_per_point,
            extent.height as f32 / self.pixels_per_point,
        ];

        let recorder = CommandRecorder::new(context.device(), command_buffer);
        recorder.bind_graphics_pipeline(gpu.pipeline.handle());
        recorder.bind_descriptor_set(gpu.layout.handle(), gpu.descriptor_set);
        recorder.bind_vertex_buffer(vertex_buffer);
        recorder.bind_index_buffer(index_buffer);
        recorder.set_viewport(viewport_for(extent));
        recorder.push_constants(
            gpu.layout.handle(),
            vk::ShaderStageFlags::VERTEX,
            bytemuck::bytes_of(&screen_size),
        );

        for draw in self.geometry.draws() {
            recorder.set_scissor(draw.scissor);
            recorder.draw_indexed_range(draw.index_count, draw.first_index, draw.vertex_offset);
        }
        Ok(())
    }
}

/// Write `bytes` into `slot`, replacing the buffer when it is too small
fn write_host_buffer(
    context: &VulkanContext,
    slot: &mut Option<Buffer>,
    bytes: &[u8],
    usage: vk::BufferUsageFlags,
) -> VulkanResult<vk::Buffer> {
    let needed = bytes.len() as vk::DeviceSize;
    if let Some(buffer) = slot.as_ref().filter(|buffer| buffer.size() >= needed) {
        buffer.write_bytes(bytes)?;
        return Ok(buffer.handle());
    }

    let buffer = slot.insert(Buffer::new(context, buffer_capacity(needed), usage, HOST_COHERENT)?);
    buffer.write_bytes(bytes)?;
    Ok(buffer.handle())
}

/// Allocation size for `needed` bytes of GUI geometry
fn buffer_capacity(needed: vk::DeviceSize) -> vk::DeviceSize {
    needed.max(MIN_BUFFER_BYTES).next_power_of_two()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXTENT: vk::Extent2D = vk::Extent2D { width: 1280, height: 720 };

    #[test]
    fn test_buffer_capacity_grows_in_powers_of_two() {
        assert_eq!(buffer_capacity(1), MIN_BUFFER_BYTES);
        assert_eq!(buffer_capacity(MIN_BUFFER_BYTES), MIN_BUFFER_BYTES);
        assert_eq!(buffer_capacity(MIN_BUFFER_BYTES + 1), MIN_BUFFER_BYTES * 2);
        assert_eq!(buffer_capacity(300_000), 512 * 1024);
    }

    #[test]
    fn test_first_frame_builds_geometry_and_atlas() {
        let mut overlay = EguiOverlay::new(&OverlaySettings::default());
        let stats = FrameStats {
            frame_count: 10,
            average_frame_time_ms: 8.0,
            fps: 125.0,
        };
        let mut controls = RendererControls::new([0.45, 0.55, 0.6, 1.0]);

        overlay.run_frame(EXTENT, &stats, &mut controls).unwrap();

        assert!(!overlay.geometry.is_empty());
        assert!(overlay.atlas_dirty);
        assert!(!overlay.atlas.is_empty());
        assert!(overlay
            .geometry
            .draws()
            .iter()
            .all(|draw| draw.scissor.extent.width <= EXTENT.width && draw.scissor.extent.height <= EXTENT.height));
    }

    #[test]
    fn test_input_waits_for_next_frame() {
        let mut overlay = EguiOverlay::new(&OverlaySettings::default());
        overlay.handle_input(&OverlayInput::CursorMoved { x: 5.0, y: 6.0 });
        assert_eq!(overlay.input.pointer(), Some(egui::pos2(5.0, 6.0)));

        let mut controls = RendererControls::new([0.0; 4]);
        overlay.run_frame(EXTENT, &FrameStats::default(), &mut controls).unwrap();
        assert!(overlay.input.take_raw_input(EXTENT, 0.0).events.is_empty());
        assert!(overlay.gpu.is_none());
    }
}
