//! Engine: window, renderer and the main loop

use thiserror::Error;

use crate::assets::{image::ImageData, model::load_obj, AssetError};
use crate::config::{ConfigError, RendererConfig};
use crate::foundation::time::Timer;
use crate::render::{
    renderer::Renderer,
    vulkan::VulkanError,
    window::{Window, WindowError},
};

/// Seconds between frame statistics log lines
const STATS_LOG_INTERVAL_SECONDS: f32 = 5.0;

/// Main engine struct
///
/// Field order is drop order: the renderer releases the surface before the
/// window goes away.
pub struct Engine {
    renderer: Renderer,
    window: Window,
    timer: Timer,
}

impl Engine {
    /// Open the window, load the model and texture, and bring up the renderer
    pub fn new(config: RendererConfig) -> Result<Self, EngineError> {
        log::info!("Initializing engine...");
        let config = config.sanitized();

        let mut window = Window::new(&config.window.title, config.window.width, config.window.height)?;

        let model_path = config.assets.resolved_model();
        let mesh = load_obj(&model_path)?;
        log::info!(
            "Loaded mesh {}: {} vertices, {} indices",
            model_path,
            mesh.vertices().len(),
            mesh.index_count()
        );

        let texture_path = config.assets.resolved_texture();
        let image = ImageData::from_file(&texture_path)?;
        log::info!("Loaded texture {}: {}x{}", texture_path, image.width(), image.height());

        let renderer = Renderer::new(&mut window, &config, &mesh, &image)?;

        Ok(Self {
            renderer,
            window,
            timer: Timer::new(),
        })
    }

    /// Run until the window is closed, Escape is pressed or the overlay asks to exit
    pub fn run(&mut self) -> Result<(), EngineError> {
        log::info!("Starting main loop...");
        let mut last_stats_log = 0.0;

        while !self.window.should_close() {
            self.window.poll_events();
            if self.window.take_resized() {
                self.renderer.request_rebuild();
            }
            for input in self.window.take_input() {
                self.renderer.handle_overlay_input(&input);
            }

            self.timer.update();
            if self.renderer.tick(&self.window, &self.timer)?.is_none() {
                // Minimized: sleep until the window changes instead of spinning
                self.window.wait_events();
                continue;
            }
            if self.renderer.quit_requested() {
                self.window.set_should_close(true);
            }

            if self.timer.total_time() - last_stats_log >= STATS_LOG_INTERVAL_SECONDS {
                last_stats_log = self.timer.total_time();
                log::debug!(
                    "Frame {}: {:.2} ms average, {:.1} FPS",
                    self.timer.frame_count(),
                    self.timer.average_frame_time_ms(),
                    self.timer.average_fps()
                );
            }
        }

        self.renderer.wait_idle()?;
        log::info!("Engine shutdown complete");
        Ok(())
    }

    /// The renderer, e.g. to install a GUI overlay
    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }
}

/// Engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Device, swapchain or pipeline failure
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] VulkanError),

    /// Model or texture could not be loaded
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    /// Window could not be created
    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    /// Configuration could not be read
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
