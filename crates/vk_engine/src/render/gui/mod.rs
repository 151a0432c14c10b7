//! egui debug overlay
//!
//! [`EguiOverlay`] implements [`GuiOverlay`](crate::render::overlay::GuiOverlay):
//! it runs the debug panel, keeps a copy of egui's font atlas and draws the
//! tessellated output with its own pipeline inside the main render pass.

pub mod atlas;
pub mod geometry;
pub mod panel;

mod egui_overlay;

pub use egui_overlay::EguiOverlay;
