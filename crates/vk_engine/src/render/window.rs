//! Window management using GLFW
//!
//! The window records framebuffer-resize and close requests while polling;
//! the renderer reads them back through [`SurfaceProvider`] and
//! [`Window::take_resized`]. Mouse events are queued for the GUI overlay in
//! framebuffer pixels.

use ash::vk;
use thiserror::Error;

use crate::render::overlay::{OverlayInput, PointerButton};
use crate::render::vulkan::{SurfaceProvider, VulkanError, VulkanResult};

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW could not be initialized
    #[error("GLFW initialization failed")]
    InitializationFailed,

    /// The window could not be created
    #[error("Window creation failed")]
    CreationFailed,

    /// Any other GLFW failure
    #[error("GLFW error: {0}")]
    GlfwError(String),
}

/// Result type for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// GLFW window wrapper
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
    framebuffer_resized: bool,
    input: Vec<OverlayInput>,
}

impl Window {
    /// Create a resizable window without a client API, ready for Vulkan
    pub fn new(title: &str, width: u32, height: u32) -> WindowResult<Self> {
        let mut glfw = glfw::init(glfw::log_errors).map_err(|_| WindowError::InitializationFailed)?;

        if !glfw.vulkan_supported() {
            return Err(WindowError::GlfwError("Vulkan loader not available".to_string()));
        }

        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(true));

        let (mut window, events) = glfw
            .create_window(width, height, title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);
        window.set_cursor_pos_polling(true);
        window.set_cursor_enter_polling(true);
        window.set_mouse_button_polling(true);

        log::info!("Created window '{}' ({}x{})", title, width, height);

        Ok(Self {
            glfw,
            window,
            events,
            framebuffer_resized: false,
            input: Vec::new(),
        })
    }

    /// Whether the user asked to close the window
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Request or cancel closing
    pub fn set_should_close(&mut self, should_close: bool) {
        self.window.set_should_close(should_close);
    }

    /// Poll GLFW and record resize/close requests; Escape closes
    pub fn poll_events(&mut self) {
        self.glfw.poll_events();
        for (_, event) in glfw::flush_messages(&self.events) {
            match event {
                glfw::WindowEvent::FramebufferSize(width, height) => {
                    log::debug!("Framebuffer resized to {}x{}", width, height);
                    self.framebuffer_resized = true;
                }
                glfw::WindowEvent::Key(glfw::Key::Escape, _, glfw::Action::Press, _)
                | glfw::WindowEvent::Close => {
                    self.window.set_should_close(true);
                }
                glfw::WindowEvent::CursorPos(x, y) => {
                    let (scale_x, scale_y) =
                        cursor_scale(self.window.get_size(), self.window.get_framebuffer_size());
                    #[allow(clippy::cast_possible_truncation)]
                    self.input.push(OverlayInput::CursorMoved {
                        x: x as f32 * scale_x,
                        y: y as f32 * scale_y,
                    });
                }
                glfw::WindowEvent::CursorEnter(false) => {
                    self.input.push(OverlayInput::CursorLeft);
                }
                glfw::WindowEvent::MouseButton(button, action, _) => {
                    let pressed = match action {
                        glfw::Action::Press => true,
                        glfw::Action::Release => false,
                        glfw::Action::Repeat => continue,
                    };
                    if let Some(button) = map_mouse_button(button) {
                        self.input.push(OverlayInput::Button { button, pressed });
                    }
                }
                _ => {}
            }
        }
    }

    /// Block until an event arrives; used while minimized
    pub fn wait_events(&mut self) {
        self.glfw.wait_events();
    }

    /// Returns and clears the pending resize flag
    pub fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.framebuffer_resized)
    }

    /// Drain mouse input queued since the last call
    pub fn take_input(&mut self) -> Vec<OverlayInput> {
        std::mem::take(&mut self.input)
    }
}

impl SurfaceProvider for Window {
    fn required_instance_extensions(&self) -> VulkanResult<Vec<String>> {
        self.glfw.get_required_instance_extensions().ok_or_else(|| {
            VulkanError::InitializationFailed("GLFW reported no Vulkan instance extensions".to_string())
        })
    }

    fn create_surface(&mut self, instance: &ash::Instance) -> VulkanResult<vk::SurfaceKHR> {
        let mut surface = vk::SurfaceKHR::null();
        let result = self
            .window
            .create_window_surface(instance.handle(), std::ptr::null(), &mut surface);

        if result == vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(VulkanError::Api {
                call: "glfwCreateWindowSurface",
                result,
            })
        }
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (
            u32::try_from(width).unwrap_or(0),
            u32::try_from(height).unwrap_or(0),
        )
    }
}

/// Factors from window coordinates to framebuffer pixels
///
/// They differ on high-DPI displays. A zero-sized window maps 1:1.
#[allow(clippy::cast_precision_loss)]
pub fn cursor_scale(window_size: (i32, i32), framebuffer_size: (i32, i32)) -> (f32, f32) {
    let factor = |window: i32, framebuffer: i32| {
        if window > 0 && framebuffer > 0 {
            framebuffer as f32 / window as f32
        } else {
            1.0
        }
    };
    (
        factor(window_size.0, framebuffer_size.0),
        factor(window_size.1, framebuffer_size.1),
    )
}

/// Overlay button for a GLFW mouse button; extra buttons are ignored
pub fn map_mouse_button(button: glfw::MouseButton) -> Option<PointerButton> {
    match button {
        glfw::MouseButton::Button1 => Some(PointerButton::Primary),
        glfw::MouseButton::Button2 => Some(PointerButton::Secondary),
        glfw::MouseButton::Button3 => Some(PointerButton::Middle),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_scale_matches_framebuffer() {
        assert_eq!(cursor_scale((800, 600), (800, 600)), (1.0, 1.0));
        assert_eq!(cursor_scale((800, 600), (1600, 1200)), (2.0, 2.0));
    }

    #[test]
    fn test_minimized_window_scales_one_to_one() {
        assert_eq!(cursor_scale((0, 0), (0, 0)), (1.0, 1.0));
        assert_eq!(cursor_scale((800, 0), (1600, 0)), (2.0, 1.0));
    }

    #[test]
    fn test_mouse_buttons_map_to_pointer_buttons() {
        assert_eq!(map_mouse_button(glfw::MouseButton::Button1), Some(PointerButton::Primary));
        assert_eq!(map_mouse_button(glfw::MouseButton::Button2), Some(PointerButton::Secondary));
        assert_eq!(map_mouse_button(glfw::MouseButton::Button3), Some(PointerButton::Middle));
        assert_eq!(map_mouse_button(glfw::MouseButton::Button5), None);
    }
}
