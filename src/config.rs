//! Application configuration
//!
//! Configuration is loaded from multiple sources with the following priority (lowest to highest):
//! 1. `config/default.toml` (version controlled)
//! 2. `config/user.toml` (gitignored, user overrides)
//! 3. Environment variables (`FRIDGE_SECTION__KEY`)
//!
//! Every field has a default matching the stock showroom, so the app runs without any file.

use std::f32::consts::PI;
use std::path::{Path, PathBuf};

use anyhow::Context;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowConfig,
    pub assets: AssetsConfig,
    pub camera: CameraConfig,
    pub controls: ControlsConfig,
    pub doors: DoorsConfig,
    pub scene: SceneConfig,
    pub lighting: LightingConfig,
    pub fog: FogConfig,
    pub loading: LoadingConfig,
    pub rendering: RenderingConfig,
    pub debug: DebugConfig,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from("config")
    }

    /// Load configuration from a specific config directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> anyhow::Result<Self> {
        let config_dir = config_dir.as_ref();
        let default_path = config_dir.join("default.toml");
        let user_path = config_dir.join("user.toml");

        let mut figment = Figment::new();

        if default_path.exists() {
            figment = figment.merge(Toml::file(&default_path));
        }

        if user_path.exists() {
            figment = figment.merge(Toml::file(&user_path));
        }

        // FRIDGE_DOORS__OPEN_ANGLE=-1.5 -> doors.open_angle = -1.5
        figment = figment.merge(Env::prefixed("FRIDGE_").split("__"));

        Self::extract(figment)
    }

    pub fn extract(figment: Figment) -> anyhow::Result<Self> {
        figment
            .extract()
            .context("Failed to read showroom configuration")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Fridge Showroom".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

/// Asset locations, relative to the working directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    pub model: PathBuf,
    /// Directory holding `px.png`, `nx.png`, `py.png`, `ny.png`, `pz.png` and `nz.png`
    pub environment_map: PathBuf,
    pub shaders: PathBuf,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            model: PathBuf::from("assets/models/fridge.glb"),
            environment_map: PathBuf::from("assets/textures/environmentMaps/0"),
            shaders: PathBuf::from("assets/shaders"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov: 45.0,
            near: 0.3,
            far: 1000.0,
            position: [-1.7, 0.0, 3.3],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    pub target: [f32; 3],
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub enable_pan: bool,
    pub pan_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Radians from the +Y axis
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            target: [0.0, 0.0, 0.0],
            enable_damping: true,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            enable_pan: true,
            pan_speed: 1.0,
            min_distance: 2.0,
            max_distance: 3.0,
            min_polar_angle: 0.0,
            max_polar_angle: PI / 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DoorsConfig {
    /// Pivot Y rotation of an open door, in radians
    pub open_angle: f32,
    /// Distance between a door's origin and its hinge along local Z
    pub pivot_displacement: f32,
    /// Seconds
    pub animation_duration: f32,
    pub bottom_door_interactive: bool,
}

impl Default for DoorsConfig {
    fn default() -> Self {
        Self {
            open_angle: -PI * 0.6,
            pivot_displacement: 0.38,
            animation_duration: 0.5,
            bottom_door_interactive: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Rotation of the whole fridge group about Y, in radians
    pub showroom_rotation: f32,
    pub floor_size: f32,
    pub floor_y: f32,
    pub floor_color: String,
    pub background_color: String,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            showroom_rotation: PI * 1.2,
            floor_size: 50.0,
            floor_y: -0.78,
            floor_color: "#DDDDDD".to_string(),
            background_color: "#FFFFFF".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientLightConfig {
    pub color: String,
    pub intensity: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionalLightConfig {
    pub color: String,
    pub intensity: f32,
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub cast_shadow: bool,
}

impl Default for DirectionalLightConfig {
    fn default() -> Self {
        Self {
            color: "#FFFFFF".to_string(),
            intensity: 1.0,
            position: [0.0, 1.0, 0.0],
            target: [0.0, 0.0, 0.0],
            cast_shadow: false,
        }
    }
}

impl Default for AmbientLightConfig {
    fn default() -> Self {
        Self {
            color: "#efefef".to_string(),
            intensity: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    pub map_size: u32,
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            map_size: 256,
            left: -7.0,
            right: 7.0,
            top: 7.0,
            bottom: -7.0,
            near: 0.5,
            far: 15.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub ambient: AmbientLightConfig,
    pub key: DirectionalLightConfig,
    pub front: DirectionalLightConfig,
    pub shadow: ShadowConfig,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            ambient: AmbientLightConfig::default(),
            key: DirectionalLightConfig {
                color: "#ecf0f1".to_string(),
                intensity: 0.4,
                position: [0.0, 6.0, 0.0],
                target: [0.0, 0.0, 0.0],
                cast_shadow: true,
            },
            front: DirectionalLightConfig {
                color: "#FFFFFF".to_string(),
                intensity: 0.1,
                position: [-2.0, 2.0, 5.0],
                target: [0.0, 0.0, 0.0],
                cast_shadow: false,
            },
            shadow: ShadowConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FogConfig {
    pub color: String,
    pub near: f32,
    pub far: f32,
}

impl Default for FogConfig {
    fn default() -> Self {
        Self {
            color: "#FFFFFF".to_string(),
            near: 1.0,
            far: 15.0,
        }
    }
}

/// Timings of the loading overlay, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadingConfig {
    pub fade_delay: f32,
    pub fade_duration: f32,
    pub bar_exit_duration: f32,
}

impl Default for LoadingConfig {
    fn default() -> Self {
        Self {
            fade_delay: 0.5,
            fade_duration: 3.0,
            bar_exit_duration: 1.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneMapping {
    None,
    Aces,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderingConfig {
    pub vsync: bool,
    pub tone_mapping: ToneMapping,
    pub tone_mapping_exposure: f32,
}

impl Default for RenderingConfig {
    fn default() -> Self {
        Self {
            vsync: true,
            tone_mapping: ToneMapping::None,
            tone_mapping_exposure: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Show the imgui panel with door and showroom sliders
    pub show_panel: bool,
    /// Used when `RUST_LOG` is not set
    pub log_level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            show_panel: false,
            log_level: "info".to_string(),
        }
    }
}
