//! Sandbox application
//!
//! Opens a window and spins a textured mesh under the egui debug panel. The
//! configuration is read from the path given as the first argument, or
//! `resources/config/sandbox.toml`.

use thiserror::Error;
use vk_engine::prelude::*;

const DEFAULT_CONFIG_PATH: &str = "resources/config/sandbox.toml";

#[derive(Error, Debug)]
enum SandboxError {
    #[error("Failed to load configuration {path}: {source}")]
    Config { path: String, source: ConfigError },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

fn run(config_path: &str) -> Result<(), SandboxError> {
    let config = RendererConfig::load_or_default(config_path).map_err(|source| SandboxError::Config {
        path: config_path.to_string(),
        source,
    })?;

    let overlay = config.overlay.clone();
    let mut engine = Engine::new(config)?;
    if overlay.enabled {
        engine
            .renderer_mut()
            .set_overlay(Box::new(EguiOverlay::new(&overlay)))
            .map_err(EngineError::from)?;
    } else {
        log::info!("GUI overlay disabled");
    }
    engine.run()?;
    Ok(())
}

fn main() {
    vk_engine::foundation::logging::init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    log::info!("Starting sandbox with {}", config_path);

    if let Err(e) = run(&config_path) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
