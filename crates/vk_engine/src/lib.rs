//! # vk_engine
//!
//! A minimal Vulkan renderer: one textured, indexed mesh spinning in a
//! resizable GLFW window, with an egui debug overlay drawn in the same
//! render pass.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vk_engine::prelude::*;
//!
//! fn main() -> Result<(), EngineError> {
//!     vk_engine::foundation::logging::init();
//!     let config = RendererConfig::default();
//!     let mut engine = Engine::new(config)?;
//!     engine.run()
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod foundation;
pub mod config;
pub mod assets;
pub mod render;

mod engine;

pub use engine::{Engine, EngineError};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        Engine, EngineError,
        config::{Config, ConfigError, OverlaySettings, RendererConfig},
        foundation::{
            math::{Vec3, Mat4},
            time::Timer,
        },
        assets::{image::ImageData, model::load_obj},
        render::{
            mesh::{Mesh, Vertex},
            gui::EguiOverlay,
            overlay::{FrameStats, GuiOverlay, OverlayInput, RendererControls},
            renderer::Renderer,
            window::Window,
        },
    };
}
