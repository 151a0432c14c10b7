//! Per-frame submit/present protocol
//!
//! [`FrameLoop`] drives one frame through a [`FrameBackend`] in a fixed
//! order and tracks the frame slot and pending swapchain rebuilds. The
//! backend does the device work; the loop owns only the sequencing, so it
//! can be exercised with an in-memory backend.
//!
//! Order per frame, for slot `s`:
//!
//! 1. wait for `s`'s fence
//! 2. acquire an image; a stale chain flags a rebuild and ends the frame
//! 3. reset `s`'s fence
//! 4. update uniforms, record (begin, draw, overlay, end)
//! 5. submit, advance the slot, present; a stale chain flags a rebuild
//!
//! The fence is only reset once an image was acquired, so a skipped frame
//! leaves it signaled and the next wait on the slot returns immediately.

/// Result of asking the swapchain for an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Image index ready to render into
    Acquired(u32),
    /// Chain is out of date or suboptimal
    OutOfDate,
}

/// Result of queueing an image for presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// Image was queued
    Presented,
    /// Image was queued or dropped, and the chain is out of date or suboptimal
    OutOfDate,
}

/// One indexed draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCommand {
    /// Indices to draw, starting at 0
    pub index_count: u32,
    /// Instances to draw, starting at 0
    pub instance_count: u32,
}

/// How a call to [`FrameLoop::render_frame`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Frame submitted and presented
    Presented,
    /// Frame submitted, but presentation asked for a rebuild
    PresentedStale,
    /// Acquire asked for a rebuild; nothing was recorded
    Skipped,
}

/// What to do about a pending rebuild at the start of a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildPlan {
    /// No rebuild pending
    NotNeeded,
    /// Rebuild pending but the window has zero area
    Suspended,
    /// Rebuild for a window of this size
    Rebuild {
        /// Window width in pixels
        width: u32,
        /// Window height in pixels
        height: u32,
    },
}

/// Device work for one frame, split into the steps [`FrameLoop`] sequences
pub trait FrameBackend {
    /// Error produced by any step
    type Error;

    /// Block until the last submission that used `slot` has completed
    fn wait_for_slot(&mut self, slot: usize) -> Result<(), Self::Error>;

    /// Acquire the next swapchain image, signaling `slot`'s acquire semaphore
    fn acquire_image(&mut self, slot: usize) -> Result<AcquireOutcome, Self::Error>;

    /// Reset `slot`'s fence ahead of the submission that will signal it
    fn reset_slot(&mut self, slot: usize) -> Result<(), Self::Error>;

    /// Write this frame's transforms into `slot`'s uniform buffer
    fn update_uniforms(&mut self, slot: usize) -> Result<(), Self::Error>;

    /// Begin recording and the render pass; bind pipeline and mesh
    fn begin_frame(&mut self, slot: usize, image_index: u32) -> Result<(), Self::Error>;

    /// Number of indices in the bound mesh
    fn index_count(&self) -> u32;

    /// Record one indexed draw
    fn draw_indexed(&mut self, slot: usize, draw: DrawCommand) -> Result<(), Self::Error>;

    /// Let an installed overlay record its draw data
    fn record_overlay(&mut self, slot: usize) -> Result<(), Self::Error>;

    /// End the render pass and the command buffer
    fn end_frame(&mut self, slot: usize) -> Result<(), Self::Error>;

    /// Submit `slot`'s command buffer for `image_index`
    fn submit(&mut self, slot: usize, image_index: u32) -> Result<(), Self::Error>;

    /// Present `image_index`
    fn present(&mut self, image_index: u32) -> Result<PresentOutcome, Self::Error>;
}

/// Frame slot rotation and rebuild bookkeeping
#[derive(Debug, Clone)]
pub struct FrameLoop {
    frames_in_flight: usize,
    current_slot: usize,
    rebuild_requested: bool,
}

impl FrameLoop {
    /// Rotate through `frames_in_flight` slots (at least one)
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            frames_in_flight: frames_in_flight.max(1),
            current_slot: 0,
            rebuild_requested: false,
        }
    }

    /// Run one frame against `backend`
    ///
    /// Any backend error aborts the frame and is returned unchanged.
    pub fn render_frame<B: FrameBackend>(&mut self, backend: &mut B) -> Result<FrameOutcome, B::Error> {
        let slot = self.current_slot;

        backend.wait_for_slot(slot)?;

        let image_index = match backend.acquire_image(slot)? {
            AcquireOutcome::Acquired(index) => index,
            AcquireOutcome::OutOfDate => {
                log::debug!("Swapchain stale on acquire, skipping frame");
                self.rebuild_requested = true;
                return Ok(FrameOutcome::Skipped);
            }
        };

        backend.reset_slot(slot)?;
        backend.update_uniforms(slot)?;

        backend.begin_frame(slot, image_index)?;
        let draw = DrawCommand {
            index_count: backend.index_count(),
            instance_count: 1,
        };
        backend.draw_indexed(slot, draw)?;
        backend.record_overlay(slot)?;
        backend.end_frame(slot)?;

        backend.submit(slot, image_index)?;
        self.current_slot = (slot + 1) % self.frames_in_flight;

        match backend.present(image_index)? {
            PresentOutcome::Presented => Ok(FrameOutcome::Presented),
            PresentOutcome::OutOfDate => {
                log::debug!("Swapchain stale on present");
                self.rebuild_requested = true;
                Ok(FrameOutcome::PresentedStale)
            }
        }
    }

    /// Flag the swapchain for rebuild before the next frame
    pub fn request_rebuild(&mut self) {
        self.rebuild_requested = true;
    }

    /// Whether a rebuild is pending
    pub fn rebuild_requested(&self) -> bool {
        self.rebuild_requested
    }

    /// Decide how to handle a pending rebuild for the current window size
    pub fn plan_rebuild(&self, window_size: (u32, u32)) -> RebuildPlan {
        let (width, height) = window_size;
        if !self.rebuild_requested {
            RebuildPlan::NotNeeded
        } else if width == 0 || height == 0 {
            RebuildPlan::Suspended
        } else {
            RebuildPlan::Rebuild { width, height }
        }
    }

    /// Clear the pending rebuild once the chain has been recreated
    pub fn rebuild_completed(&mut self) {
        self.rebuild_requested = false;
    }

    /// Slot the next frame will use
    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    /// Number of slots in rotation
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }
}
