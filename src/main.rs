use anyhow::Result;

use crate::config::{AppConfig, DebugConfig};

mod assets;
mod camera;
mod color;
mod config;
mod controls;
mod debug_panel;
mod doors;
mod engine;
mod fridge;
mod lighting;
mod loading;
mod material_manager;
mod math;
mod model;
mod raycaster;
mod rendering;
mod scene_graph;
mod showroom;
mod tween;
mod window;

fn main() -> Result<()> {
    let config = AppConfig::load();

    let log_level = match &config {
        Ok(config) => config.debug.log_level.clone(),
        Err(_) => DebugConfig::default().log_level,
    };
    let mut logger = pretty_env_logger::formatted_builder();
    logger.parse_filters(&log_level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        logger.parse_filters(&filters);
    }
    logger.init();

    let config = config.unwrap_or_else(|e| {
        log::warn!("Falling back to default configuration: {:?}", e);
        AppConfig::default()
    });

    pollster::block_on(window::run(config))?;

    Ok(())
}
