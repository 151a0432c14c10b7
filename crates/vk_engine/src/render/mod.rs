//! Rendering: window, mesh data, camera, the frame loop and its Vulkan backend

pub mod camera;
pub mod frame;
pub mod gui;
pub mod mesh;
pub mod overlay;
pub mod renderer;
pub mod vulkan;
pub mod window;

pub use camera::{Camera, ModelSpin};
pub use frame::{FrameBackend, FrameLoop};
pub use mesh::{Mesh, SubMesh, Vertex};
pub use gui::EguiOverlay;
pub use overlay::{FrameStats, GuiOverlay, OverlayInput, RendererControls};
pub use renderer::Renderer;
pub use window::{Window, WindowError};
