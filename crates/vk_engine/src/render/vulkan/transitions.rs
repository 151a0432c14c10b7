//! Image layout transitions
//!
//! Every supported `(old, new)` layout pair lives in [`TRANSITIONS`] with the
//! access masks and pipeline stages its barrier needs. Anything not listed is
//! rejected.

use ash::vk;

use super::commands::CommandRecorder;
use super::{VulkanError, VulkanResult};

/// Barrier parameters for one supported layout change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutTransition {
    /// Layout the image is in
    pub old: vk::ImageLayout,
    /// Layout the image moves to
    pub new: vk::ImageLayout,
    /// Writes that must be available before the transition
    pub src_access: vk::AccessFlags,
    /// Accesses that wait for the transition
    pub dst_access: vk::AccessFlags,
    /// Stage the barrier waits on
    pub src_stage: vk::PipelineStageFlags,
    /// Stage blocked until the barrier completes
    pub dst_stage: vk::PipelineStageFlags,
}

/// Supported layout transitions
pub const TRANSITIONS: &[LayoutTransition] = &[
    LayoutTransition {
        old: vk::ImageLayout::UNDEFINED,
        new: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        src_access: vk::AccessFlags::empty(),
        dst_access: vk::AccessFlags::TRANSFER_WRITE,
        src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
        dst_stage: vk::PipelineStageFlags::TRANSFER,
    },
    LayoutTransition {
        old: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        new: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        src_access: vk::AccessFlags::TRANSFER_WRITE,
        dst_access: vk::AccessFlags::SHADER_READ,
        src_stage: vk::PipelineStageFlags::TRANSFER,
        dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
    },
    LayoutTransition {
        old: vk::ImageLayout::UNDEFINED,
        new: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        src_access: vk::AccessFlags::empty(),
        dst_access: vk::AccessFlags::from_raw(
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ.as_raw()
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE.as_raw(),
        ),
        src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
        dst_stage: vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
    },
];

/// Look up the barrier for `old -> new`
pub fn lookup_transition(old: vk::ImageLayout, new: vk::ImageLayout) -> VulkanResult<LayoutTransition> {
    TRANSITIONS
        .iter()
        .find(|transition| transition.old == old && transition.new == new)
        .copied()
        .ok_or(VulkanError::UnsupportedLayoutTransition { old, new })
}

/// Whether `format` carries a stencil component
pub fn has_stencil_component(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D32_SFLOAT_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D16_UNORM_S8_UINT
    )
}

/// Aspect flags a transition of an image in `format` to `new` touches
pub fn aspect_mask(format: vk::Format, new: vk::ImageLayout) -> vk::ImageAspectFlags {
    if new == vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL {
        if has_stencil_component(format) {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        } else {
            vk::ImageAspectFlags::DEPTH
        }
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

/// Record a pipeline barrier moving mip 0 of `image` from `old` to `new`
pub fn record_layout_transition(
    recorder: &CommandRecorder<'_>,
    image: vk::Image,
    format: vk::Format,
    old: vk::ImageLayout,
    new: vk::ImageLayout,
) -> VulkanResult<()> {
    let transition = lookup_transition(old, new)?;

    let barrier = vk::ImageMemoryBarrier::builder()
        .old_layout(old)
        .new_layout(new)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: aspect_mask(format, new),
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        })
        .src_access_mask(transition.src_access)
        .dst_access_mask(transition.dst_access)
        .build();

    recorder.image_barrier(transition.src_stage, transition.dst_stage, barrier);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_transitions() {
        let to_dst = lookup_transition(vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL).unwrap();
        assert_eq!(to_dst.dst_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(to_dst.src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);

        let to_read = lookup_transition(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
        .unwrap();
        assert_eq!(to_read.src_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(to_read.dst_access, vk::AccessFlags::SHADER_READ);
        assert_eq!(to_read.dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
    }

    #[test]
    fn test_depth_transition() {
        let depth = lookup_transition(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        )
        .unwrap();
        assert!(depth.dst_access.contains(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE));
        assert_eq!(depth.dst_stage, vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS);
    }

    #[test]
    fn test_unlisted_pairs_rejected() {
        let pairs = [
            (vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, vk::ImageLayout::TRANSFER_DST_OPTIMAL),
            (vk::ImageLayout::UNDEFINED, vk::ImageLayout::PRESENT_SRC_KHR),
            (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::TRANSFER_DST_OPTIMAL),
        ];
        for (old, new) in pairs {
            assert!(matches!(
                lookup_transition(old, new),
                Err(VulkanError::UnsupportedLayoutTransition { .. })
            ));
        }
    }

    #[test]
    fn test_table_has_no_duplicate_keys() {
        for (i, a) in TRANSITIONS.iter().enumerate() {
            for b in &TRANSITIONS[i + 1..] {
                assert!(!(a.old == b.old && a.new == b.new));
            }
        }
    }

    #[test]
    fn test_depth_aspect_includes_stencil_when_present() {
        let layout = vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL;
        assert_eq!(aspect_mask(vk::Format::D32_SFLOAT, layout), vk::ImageAspectFlags::DEPTH);
        assert_eq!(
            aspect_mask(vk::Format::D24_UNORM_S8_UINT, layout),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(
            aspect_mask(vk::Format::R8G8B8A8_UNORM, vk::ImageLayout::TRANSFER_DST_OPTIMAL),
            vk::ImageAspectFlags::COLOR
        );
    }
}
