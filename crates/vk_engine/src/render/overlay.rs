//! Immediate-mode GUI overlay seam
//!
//! The renderer hands an installed overlay its render pass and descriptor
//! pool through [`OverlayHandoff`], once on install and again after every
//! swapchain rebuild. Each tick the overlay first builds its UI against the
//! frame statistics and the renderer's editable [`RendererControls`], then
//! records its draw data into the frame's command buffer while the main
//! render pass instance is active, after the mesh draw.

use ash::vk;

use crate::foundation::time::Timer;
use crate::render::vulkan::{CommandPool, VulkanContext, VulkanResult};

/// Frame timing figures an overlay may display
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    /// Frames rendered so far
    pub frame_count: u64,
    /// Mean frame time in milliseconds
    pub average_frame_time_ms: f32,
    /// Mean frames per second
    pub fps: f32,
}

impl FrameStats {
    /// Snapshot of `timer`
    pub fn from_timer(timer: &Timer) -> Self {
        Self {
            frame_count: timer.frame_count(),
            average_frame_time_ms: timer.average_frame_time_ms(),
            fps: timer.average_fps(),
        }
    }
}

/// Mouse buttons the overlay understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerButton {
    /// Left mouse button
    Primary,
    /// Right mouse button
    Secondary,
    /// Middle mouse button
    Middle,
}

/// Window input forwarded to the overlay, positions in framebuffer pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverlayInput {
    /// The cursor moved inside the window
    CursorMoved {
        /// Horizontal position from the left edge
        x: f32,
        /// Vertical position from the top edge
        y: f32,
    },
    /// The cursor left the window
    CursorLeft,
    /// A mouse button changed state
    Button {
        /// Which button
        button: PointerButton,
        /// Pressed or released
        pressed: bool,
    },
}

/// Renderer state an overlay may edit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RendererControls {
    /// Background color, straight alpha; premultiplied when a frame is recorded
    pub clear_color: [f32; 4],
    /// Set to ask the application to exit
    pub quit_requested: bool,
}

impl RendererControls {
    /// Controls starting from `clear_color`
    pub fn new(clear_color: [f32; 4]) -> Self {
        Self {
            clear_color,
            quit_requested: false,
        }
    }
}

/// Renderer objects an overlay builds against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayHandoff {
    /// Pass the overlay records into, subpass 0
    pub render_pass: vk::RenderPass,
    /// Pool the overlay allocates its descriptor sets from
    pub descriptor_pool: vk::DescriptorPool,
    /// Swapchain images
    pub image_count: usize,
    /// Frame slots; `record` receives a slot index below this
    pub frames_in_flight: usize,
}

/// What an overlay has to recreate for a new handoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rebind {
    /// Everything it built is still valid
    Nothing,
    /// Pipelines were built against a render pass that no longer exists
    Pipeline,
    /// Descriptor sets and per-slot resources must be rebuilt too
    Everything,
}

impl OverlayHandoff {
    /// Compare with the handoff an overlay last built for
    pub fn rebind_from(&self, previous: Option<&OverlayHandoff>) -> Rebind {
        match previous {
            None => Rebind::Everything,
            Some(previous)
                if previous.descriptor_pool != self.descriptor_pool
                    || previous.frames_in_flight != self.frames_in_flight =>
            {
                Rebind::Everything
            }
            Some(previous) if previous.render_pass != self.render_pass => Rebind::Pipeline,
            Some(_) => Rebind::Nothing,
        }
    }
}

/// Device access handed to an overlay outside of command recording
pub struct OverlayTarget<'a> {
    /// Device context for creating resources
    pub context: &'a VulkanContext,
    /// Pool for one-time upload commands
    pub upload_pool: &'a CommandPool,
    /// Render pass and descriptor pool to build against
    pub handoff: OverlayHandoff,
}

/// GUI drawn on top of the mesh inside the main render pass
pub trait GuiOverlay {
    /// Build or rebuild GPU objects for `target`
    ///
    /// Called on install and after every swapchain rebuild, with the device idle.
    fn attach(&mut self, target: &OverlayTarget<'_>) -> VulkanResult<()>;

    /// Window input since the last frame
    fn handle_input(&mut self, _input: &OverlayInput) {}

    /// Run the UI for the next frame and upload any texture changes
    fn prepare(
        &mut self,
        target: &OverlayTarget<'_>,
        extent: vk::Extent2D,
        stats: &FrameStats,
        controls: &mut RendererControls,
    ) -> VulkanResult<()>;

    /// Record draw commands into `command_buffer`
    ///
    /// Called between begin and end of the render pass, after the mesh draw,
    /// once the fence of frame slot `slot` has signaled.
    fn record(
        &mut self,
        context: &VulkanContext,
        command_buffer: vk::CommandBuffer,
        slot: usize,
        extent: vk::Extent2D,
    ) -> VulkanResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;
    use std::time::Duration;

    fn handoff(render_pass: u64, pool: u64) -> OverlayHandoff {
        OverlayHandoff {
            render_pass: vk::RenderPass::from_raw(render_pass),
            descriptor_pool: vk::DescriptorPool::from_raw(pool),
            image_count: 3,
            frames_in_flight: 2,
        }
    }

    #[test]
    fn test_stats_follow_timer() {
        let mut timer = Timer::new();
        for _ in 0..4 {
            timer.advance(Duration::from_millis(20));
        }

        let stats = FrameStats::from_timer(&timer);
        assert_eq!(stats.frame_count, 4);
        assert!((stats.average_frame_time_ms - 20.0).abs() < 0.5);
        assert!((stats.fps - 50.0).abs() < 1.0);
    }

    #[test]
    fn test_first_handoff_builds_everything() {
        assert_eq!(handoff(1, 9).rebind_from(None), Rebind::Everything);
    }

    #[test]
    fn test_same_handoff_keeps_everything() {
        let current = handoff(1, 9);
        let mut resized = current;
        resized.image_count = 4;
        assert_eq!(resized.rebind_from(Some(&current)), Rebind::Nothing);
    }

    #[test]
    fn test_new_render_pass_rebuilds_pipeline() {
        assert_eq!(handoff(2, 9).rebind_from(Some(&handoff(1, 9))), Rebind::Pipeline);
    }

    #[test]
    fn test_new_descriptor_pool_rebuilds_everything() {
        assert_eq!(handoff(1, 10).rebind_from(Some(&handoff(1, 9))), Rebind::Everything);
        assert_eq!(handoff(2, 10).rebind_from(Some(&handoff(1, 9))), Rebind::Everything);
    }

    #[test]
    fn test_controls_start_without_quit() {
        let controls = RendererControls::new([0.1, 0.2, 0.3, 1.0]);
        assert!(!controls.quit_requested);
        assert_eq!(controls.clear_color, [0.1, 0.2, 0.3, 1.0]);
    }
}
