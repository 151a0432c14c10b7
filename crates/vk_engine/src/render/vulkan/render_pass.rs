//! Forward render pass: one color and one depth attachment, one subpass

use ash::{vk, Device};

use super::{api, VulkanResult};

/// Color attachment index within the pass and every framebuffer
pub const COLOR_ATTACHMENT: u32 = 0;
/// Depth attachment index within the pass and every framebuffer
pub const DEPTH_ATTACHMENT: u32 = 1;

/// Attachment descriptions in framebuffer order
pub fn attachment_descriptions(color_format: vk::Format, depth_format: vk::Format) -> [vk::AttachmentDescription; 2] {
    let color = vk::AttachmentDescription::builder()
        .format(color_format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
        .build();

    let depth = vk::AttachmentDescription::builder()
        .format(depth_format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::DONT_CARE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
        .build();

    [color, depth]
}

/// External -> subpass 0 dependency on color output and early depth tests
///
/// The depth image is shared by every frame in flight, so the previous
/// frame's depth writes must finish before this frame's depth clear.
pub fn external_dependency() -> vk::SubpassDependency {
    let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;

    vk::SubpassDependency::builder()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(stages)
        .src_access_mask(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE)
        .dst_stage_mask(stages)
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE)
        .build()
}

/// Render pass wrapper with RAII cleanup
pub struct RenderPass {
    device: Device,
    render_pass: vk::RenderPass,
}

impl RenderPass {
    /// Create the forward pass for the given attachment formats
    pub fn new_forward_pass(device: &Device, color_format: vk::Format, depth_format: vk::Format) -> VulkanResult<Self> {
        let attachments = attachment_descriptions(color_format, depth_format);

        let color_attachment_ref = vk::AttachmentReference::builder()
            .attachment(COLOR_ATTACHMENT)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .build();

        let depth_attachment_ref = vk::AttachmentReference::builder()
            .attachment(DEPTH_ATTACHMENT)
            .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            .build();

        let color_attachments = [color_attachment_ref];
        let subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_attachments)
            .depth_stencil_attachment(&depth_attachment_ref)
            .build();

        let subpasses = [subpass];
        let dependencies = [external_dependency()];

        let render_pass_create_info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = unsafe { device.create_render_pass(&render_pass_create_info, None) }
            .map_err(api("vkCreateRenderPass"))?;

        Ok(Self {
            device: device.clone(),
            render_pass,
        })
    }

    /// Get the render pass handle
    pub fn handle(&self) -> vk::RenderPass {
        self.render_pass
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_attachment_is_presented() {
        let [color, _] = attachment_descriptions(vk::Format::B8G8R8A8_UNORM, vk::Format::D32_SFLOAT);

        assert_eq!(color.format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(color.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(color.store_op, vk::AttachmentStoreOp::STORE);
        assert_eq!(color.final_layout, vk::ImageLayout::PRESENT_SRC_KHR);
    }

    #[test]
    fn test_depth_attachment_is_discarded() {
        let [_, depth] = attachment_descriptions(vk::Format::B8G8R8A8_UNORM, vk::Format::D24_UNORM_S8_UINT);

        assert_eq!(depth.format, vk::Format::D24_UNORM_S8_UINT);
        assert_eq!(depth.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(depth.store_op, vk::AttachmentStoreOp::DONT_CARE);
        assert_eq!(depth.final_layout, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
    }

    #[test]
    fn test_dependency_waits_on_color_and_depth() {
        let dependency = external_dependency();

        assert_eq!(dependency.src_subpass, vk::SUBPASS_EXTERNAL);
        assert_eq!(dependency.dst_subpass, 0);
        assert!(dependency
            .dst_stage_mask
            .contains(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS));
        assert!(dependency.dst_access_mask.contains(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE));
    }

    #[test]
    fn test_dependency_orders_depth_writes_between_frames() {
        let dependency = external_dependency();

        assert!(dependency
            .src_stage_mask
            .contains(vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS));
        assert_eq!(dependency.src_access_mask, vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE);
    }
}
