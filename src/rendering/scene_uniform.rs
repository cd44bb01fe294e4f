use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

use crate::{
    camera::Camera,
    config::{RenderingConfig, ToneMapping},
    lighting::{DirectionalLight, Fog, Lights},
};

const SHADOW_BIAS: f32 = 0.002;

/// Per-frame data shared by every pass. Layout matches `SceneUniform` in `shared/scene.wgsl`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct SceneUniformState {
    pub view_proj: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub light_view_proj: [[f32; 4]; 4],
    /// xyz camera position, w 1 when an environment map is bound
    pub camera_position: [f32; 4],
    /// rgb premultiplied by intensity
    pub ambient: [f32; 4],
    /// xyz towards the light, w 1 when it casts shadows
    pub key_direction: [f32; 4],
    pub key_color: [f32; 4],
    pub front_direction: [f32; 4],
    pub front_color: [f32; 4],
    pub fog_color: [f32; 4],
    /// near, far, tone mapping (0 none, 1 ACES), exposure
    pub fog_and_tone_mapping: [f32; 4],
    /// shadow map size, depth bias
    pub shadow: [f32; 4],
}

fn direction_and_color(light: &DirectionalLight, casts_shadow: bool) -> ([f32; 4], [f32; 4]) {
    let casts_shadow = if casts_shadow { 1.0 } else { 0.0 };
    (
        light.direction_to_light().extend(casts_shadow).to_array(),
        (light.color * light.intensity).extend(1.0).to_array(),
    )
}

impl SceneUniformState {
    pub fn new(
        camera: &Camera,
        lights: &Lights,
        fog: &Fog,
        rendering: &RenderingConfig,
        has_environment: bool,
    ) -> Self {
        // One shadow map, so only the first caster gets shadows
        let key_casts = lights.key.shadow.is_some();
        let front_casts = !key_casts && lights.front.shadow.is_some();
        let (key_direction, key_color) = direction_and_color(&lights.key, key_casts);
        let (front_direction, front_color) = direction_and_color(&lights.front, front_casts);

        let shadow_caster = lights.shadow_caster();
        let light_view_proj = shadow_caster
            .and_then(|light| light.shadow_view_projection())
            .unwrap_or(Mat4::IDENTITY);
        let shadow_map_size = shadow_caster
            .and_then(|light| light.shadow.as_ref())
            .map_or(1, |shadow| shadow.map_size);

        let tone_mapping = match rendering.tone_mapping {
            ToneMapping::None => 0.0,
            ToneMapping::Aces => 1.0,
        };

        Self {
            view_proj: camera.get_vp_matrix().to_cols_array_2d(),
            view: camera.view_matrix().to_cols_array_2d(),
            light_view_proj: light_view_proj.to_cols_array_2d(),
            camera_position: camera
                .eye
                .extend(if has_environment { 1.0 } else { 0.0 })
                .to_array(),
            ambient: (lights.ambient.color * lights.ambient.intensity)
                .extend(1.0)
                .to_array(),
            key_direction,
            key_color,
            front_direction,
            front_color,
            fog_color: fog.color.extend(1.0).to_array(),
            fog_and_tone_mapping: [
                fog.near,
                fog.far,
                tone_mapping,
                rendering.tone_mapping_exposure,
            ],
            shadow: Vec4::new(shadow_map_size as f32, SHADOW_BIAS, 0.0, 0.0).to_array(),
        }
    }
}
