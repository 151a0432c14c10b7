//! Renderer and sandbox settings

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{Config, ConfigError};

/// Upper bound on frames in flight
pub const MAX_FRAMES_IN_FLIGHT_LIMIT: usize = 8;

/// Window creation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    /// Window title
    pub title: String,
    /// Initial width in screen coordinates
    pub width: u32,
    /// Initial height in screen coordinates
    pub height: u32,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: "vk_engine sandbox".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

/// Compiled SPIR-V shader locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderPaths {
    /// Vertex stage SPIR-V
    pub vertex: String,
    /// Fragment stage SPIR-V
    pub fragment: String,
}

impl Default for ShaderPaths {
    fn default() -> Self {
        Self {
            vertex: "target/shaders/mesh.vert.spv".to_string(),
            fragment: "target/shaders/mesh.frag.spv".to_string(),
        }
    }
}

impl ShaderPaths {
    /// Vertex path after searching the usual build output directories
    pub fn resolved_vertex(&self) -> String {
        resolve_path(&self.vertex, "target/shaders")
    }

    /// Fragment path after searching the usual build output directories
    pub fn resolved_fragment(&self) -> String {
        resolve_path(&self.fragment, "target/shaders")
    }
}

/// Debug GUI overlay settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySettings {
    /// Whether the sandbox installs the overlay
    pub enabled: bool,
    /// Overlay vertex stage SPIR-V
    pub vertex: String,
    /// Overlay fragment stage SPIR-V
    pub fragment: String,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            vertex: "target/shaders/overlay.vert.spv".to_string(),
            fragment: "target/shaders/overlay.frag.spv".to_string(),
        }
    }
}

impl OverlaySettings {
    /// Vertex path after searching the usual build output directories
    pub fn resolved_vertex(&self) -> String {
        resolve_path(&self.vertex, "target/shaders")
    }

    /// Fragment path after searching the usual build output directories
    pub fn resolved_fragment(&self) -> String {
        resolve_path(&self.fragment, "target/shaders")
    }
}

/// Model and texture locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetPaths {
    /// OBJ model file
    pub model: String,
    /// Texture image file
    pub texture: String,
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self {
            model: "resources/models/cube.obj".to_string(),
            texture: "resources/textures/checker.png".to_string(),
        }
    }
}

impl AssetPaths {
    /// Model path after searching from the workspace and its subdirectories
    pub fn resolved_model(&self) -> String {
        resolve_path(&self.model, "resources/models")
    }

    /// Texture path after searching from the workspace and its subdirectories
    pub fn resolved_texture(&self) -> String {
        resolve_path(&self.texture, "resources/textures")
    }
}

/// Configuration for the renderer and the sandbox application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Maximum frames in flight, clamped to `1..=8`
    pub max_frames_in_flight: usize,
    /// Background clear color [R, G, B, A] (0.0-1.0 range)
    pub clear_color: [f32; 4],
    /// Whether to enable Vulkan validation layers; `None` follows the build profile
    pub enable_validation: Option<bool>,
    /// Model spin speed around +Y
    pub rotation_degrees_per_second: f32,
    /// Window settings
    pub window: WindowSettings,
    /// Shader binaries
    pub shaders: ShaderPaths,
    /// Debug GUI overlay
    pub overlay: OverlaySettings,
    /// Mesh and texture files
    pub assets: AssetPaths,
}

impl Config for RendererConfig {}

impl Default for RendererConfig {
    fn default() -> Self {
        Self::new("vk_engine sandbox")
    }
}

impl RendererConfig {
    /// Create a new renderer configuration
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            application_name: app_name.into(),
            max_frames_in_flight: 2,
            clear_color: [0.45, 0.55, 0.60, 1.0],
            enable_validation: None,
            rotation_degrees_per_second: 90.0,
            window: WindowSettings::default(),
            shaders: ShaderPaths::default(),
            overlay: OverlaySettings::default(),
            assets: AssetPaths::default(),
        }
    }

    /// Load from `path`, falling back to defaults when the file is absent
    pub fn load_or_default(path: &str) -> Result<Self, ConfigError> {
        if !Path::new(path).exists() {
            log::warn!("Config file {} not found, using defaults", path);
            return Ok(Self::default());
        }
        let config = Self::load_from_file(path)?;
        log::info!("Loaded configuration from {}", path);
        Ok(config.sanitized())
    }

    /// Clamp out-of-range values
    pub fn sanitized(mut self) -> Self {
        self.max_frames_in_flight = self.frames_in_flight();
        self
    }

    /// Frames in flight to build, whatever the raw field holds
    pub fn frames_in_flight(&self) -> usize {
        self.max_frames_in_flight.clamp(1, MAX_FRAMES_IN_FLIGHT_LIMIT)
    }

    /// Set window title and size
    pub fn with_window(mut self, title: impl Into<String>, width: u32, height: u32) -> Self {
        self.window = WindowSettings {
            title: title.into(),
            width,
            height,
        };
        self
    }

    /// Set custom shader paths
    pub fn with_shader_paths(mut self, vertex_path: impl Into<String>, fragment_path: impl Into<String>) -> Self {
        self.shaders = ShaderPaths {
            vertex: vertex_path.into(),
            fragment: fragment_path.into(),
        };
        self
    }

    /// Set model and texture paths
    pub fn with_asset_paths(mut self, model: impl Into<String>, texture: impl Into<String>) -> Self {
        self.assets = AssetPaths {
            model: model.into(),
            texture: texture.into(),
        };
        self
    }

    /// Set maximum frames in flight
    pub fn with_max_frames_in_flight(mut self, max_frames: usize) -> Self {
        self.max_frames_in_flight = max_frames.clamp(1, MAX_FRAMES_IN_FLIGHT_LIMIT);
        self
    }

    /// Set background clear color [R, G, B, A] (0.0-1.0 range)
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Enable or disable the debug GUI overlay
    pub fn with_overlay(mut self, enabled: bool) -> Self {
        self.overlay.enabled = enabled;
        self
    }

    /// Enable or disable Vulkan validation layers
    pub fn with_validation(mut self, enable: bool) -> Self {
        self.enable_validation = Some(enable);
        self
    }

    /// Set the model spin speed
    pub fn with_rotation_speed(mut self, degrees_per_second: f32) -> Self {
        self.rotation_degrees_per_second = degrees_per_second;
        self
    }

    /// Whether validation layers should be requested
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }
}

/// Scale RGB by alpha
pub fn premultiply(color: [f32; 4]) -> [f32; 4] {
    let [r, g, b, a] = color;
    [r * a, g * a, b * a, a]
}

/// Resolve a path by checking the working directory, then `fallback_dir`,
/// then the same directory one level up
fn resolve_path(path: &str, fallback_dir: &str) -> String {
    if Path::new(path).exists() {
        return path.to_string();
    }

    let Some(file_name) = Path::new(path).file_name().and_then(|name| name.to_str()) else {
        return path.to_string();
    };

    [
        format!("{}/{}", fallback_dir, file_name),
        format!("../{}/{}", fallback_dir, file_name),
        format!("../../{}/{}", fallback_dir, file_name),
    ]
    .into_iter()
    .find(|candidate| Path::new(candidate).exists())
    .unwrap_or_else(|| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults() {
        let config = RendererConfig::default();
        assert_eq!(config.max_frames_in_flight, 2);
        assert_relative_eq!(config.rotation_degrees_per_second, 90.0);
        assert_eq!(config.validation_enabled(), cfg!(debug_assertions));
    }

    #[test]
    fn test_frames_in_flight_clamped() {
        assert_eq!(RendererConfig::default().with_max_frames_in_flight(0).max_frames_in_flight, 1);
        assert_eq!(RendererConfig::default().with_max_frames_in_flight(64).max_frames_in_flight, 8);

        let mut config = RendererConfig::default();
        config.max_frames_in_flight = 99;
        assert_eq!(config.sanitized().max_frames_in_flight, MAX_FRAMES_IN_FLIGHT_LIMIT);
    }

    #[test]
    fn test_unsanitized_zero_frames_still_builds_one() {
        let mut config = RendererConfig::default();
        config.max_frames_in_flight = 0;
        assert_eq!(config.frames_in_flight(), 1);
        assert_eq!(config.max_frames_in_flight, 0);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let text = r#"
            application_name = "Spinner"
            max_frames_in_flight = 3

            [window]
            width = 800
            height = 600
        "#;
        let config = RendererConfig::parse("sandbox.toml", text).unwrap();

        assert_eq!(config.application_name, "Spinner");
        assert_eq!(config.max_frames_in_flight, 3);
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.title, WindowSettings::default().title);
        assert_eq!(config.assets, AssetPaths::default());
        assert!(config.overlay.enabled);
    }

    #[test]
    fn test_toml_and_ron_agree() {
        let config = RendererConfig::new("Both")
            .with_clear_color([0.1, 0.2, 0.3, 0.5])
            .with_validation(false);

        for path in ["out.toml", "out.ron"] {
            let text = config.to_string_for(path).unwrap();
            let parsed = RendererConfig::parse(path, &text).unwrap();
            assert_eq!(parsed, config, "{} did not survive", path);
        }
    }

    #[test]
    fn test_unsupported_extension() {
        let result = RendererConfig::parse("sandbox.json", "{}");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = RendererConfig::load_or_default("definitely/not/here.toml").unwrap();
        assert_eq!(config, RendererConfig::default());
    }

    #[test]
    fn test_premultiply_scales_rgb_by_alpha() {
        let config = RendererConfig::default().with_clear_color([0.8, 0.4, 0.2, 0.5]);
        let color = premultiply(config.clear_color);
        assert_relative_eq!(color[0], 0.4);
        assert_relative_eq!(color[1], 0.2);
        assert_relative_eq!(color[2], 0.1);
        assert_relative_eq!(color[3], 0.5);
    }
}
