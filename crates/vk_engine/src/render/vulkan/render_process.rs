//! Render pass, pipeline layout and graphics pipeline as one unit
//!
//! The pipeline bakes in the viewport, so the pass and pipeline are rebuilt
//! whenever the swapchain extent or an attachment format changes.

use ash::vk;

use super::pipeline::{GraphicsPipeline, PipelineLayout};
use super::render_pass::RenderPass;
use super::shader::ShaderModule;
use super::{VulkanContext, VulkanResult};

/// Attachment formats and extent a render process was built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetDescription {
    /// Swapchain image format
    pub color_format: vk::Format,
    /// Depth attachment format
    pub depth_format: vk::Format,
    /// Swapchain extent
    pub extent: vk::Extent2D,
}

/// Shaders plus everything built from them; field order is drop order
pub struct RenderProcess {
    pipeline: GraphicsPipeline,
    render_pass: RenderPass,
    layout: PipelineLayout,
    vertex_shader: ShaderModule,
    fragment_shader: ShaderModule,
    target: TargetDescription,
}

impl RenderProcess {
    /// Load both shader stages and build the pass and pipeline for `target`
    pub fn new(
        context: &VulkanContext,
        vertex_path: &str,
        fragment_path: &str,
        target: TargetDescription,
    ) -> VulkanResult<Self> {
        let device = context.device();
        let vertex_shader = ShaderModule::from_file(device, vertex_path)?;
        let fragment_shader = ShaderModule::from_file(device, fragment_path)?;
        let layout = PipelineLayout::new(device, &[context.descriptor_set_layout().handle()])?;
        let render_pass = RenderPass::new_forward_pass(device, target.color_format, target.depth_format)?;
        let pipeline = GraphicsPipeline::new(
            device,
            render_pass.handle(),
            &layout,
            &vertex_shader,
            &fragment_shader,
            target.extent,
        )?;

        log::info!(
            "Render process built for {:?}/{:?} at {}x{}",
            target.color_format,
            target.depth_format,
            target.extent.width,
            target.extent.height
        );

        Ok(Self {
            pipeline,
            render_pass,
            layout,
            vertex_shader,
            fragment_shader,
            target,
        })
    }

    /// Whether `target` differs from what this process was built for
    pub fn needs_rebuild(&self, target: &TargetDescription) -> bool {
        self.target != *target
    }

    /// Rebuild the pass and pipeline for `target`; no-op when unchanged
    ///
    /// Returns whether anything was rebuilt. The device must be idle.
    pub fn rebuild(&mut self, context: &VulkanContext, target: TargetDescription) -> VulkanResult<bool> {
        if !self.needs_rebuild(&target) {
            return Ok(false);
        }

        let device = context.device();
        let render_pass = RenderPass::new_forward_pass(device, target.color_format, target.depth_format)?;
        let pipeline = GraphicsPipeline::new(
            device,
            render_pass.handle(),
            &self.layout,
            &self.vertex_shader,
            &self.fragment_shader,
            target.extent,
        )?;

        // Pipeline first so it never outlives its pass
        self.pipeline = pipeline;
        self.render_pass = render_pass;
        self.target = target;

        log::info!("Render process rebuilt at {}x{}", target.extent.width, target.extent.height);
        Ok(true)
    }

    /// Render pass handle
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass.handle()
    }

    /// Pipeline handle
    pub fn pipeline(&self) -> vk::Pipeline {
        self.pipeline.handle()
    }

    /// Pipeline layout handle
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout.handle()
    }
}
