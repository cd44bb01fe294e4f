use glam::{Mat4, Vec3};

use crate::{
    color::parse_hex_linear,
    config::{
        AmbientLightConfig, DirectionalLightConfig, FogConfig, LightingConfig, ShadowConfig,
    },
};

#[derive(Debug, Clone)]
pub struct AmbientLight {
    /// Linear color
    pub color: Vec3,
    pub intensity: f32,
}

impl AmbientLight {
    pub fn from_config(config: &AmbientLightConfig) -> anyhow::Result<Self> {
        Ok(Self {
            color: parse_hex_linear(&config.color)?,
            intensity: config.intensity,
        })
    }
}

/// Orthographic shadow camera of a directional light.
#[derive(Debug, Clone)]
pub struct DirectionalShadow {
    pub map_size: u32,
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
    pub near: f32,
    pub far: f32,
}

impl DirectionalShadow {
    pub fn from_config(config: &ShadowConfig) -> Self {
        Self {
            map_size: config.map_size.max(1),
            left: config.left,
            right: config.right,
            top: config.top,
            bottom: config.bottom,
            near: config.near,
            far: config.far,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DirectionalLight {
    pub color: Vec3,
    pub intensity: f32,
    pub position: Vec3,
    pub target: Vec3,
    pub shadow: Option<DirectionalShadow>,
}

impl DirectionalLight {
    pub fn from_config(
        config: &DirectionalLightConfig,
        shadow: &ShadowConfig,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            color: parse_hex_linear(&config.color)?,
            intensity: config.intensity,
            position: Vec3::from_array(config.position),
            target: Vec3::from_array(config.target),
            shadow: config
                .cast_shadow
                .then(|| DirectionalShadow::from_config(shadow)),
        })
    }

    /// Unit vector pointing from the surface towards the light.
    pub fn direction_to_light(&self) -> Vec3 {
        (self.position - self.target).normalize_or(Vec3::Y)
    }

    /// View-projection of the shadow camera, or `None` for lights without shadows.
    pub fn shadow_view_projection(&self) -> Option<Mat4> {
        let shadow = self.shadow.as_ref()?;

        let forward = (self.target - self.position).normalize_or(Vec3::NEG_Y);
        // Straight-down lights need a different up vector
        let up = if forward.cross(Vec3::Y).length_squared() < 1e-6 {
            Vec3::Z
        } else {
            Vec3::Y
        };

        let view = Mat4::look_at_rh(self.position, self.target, up);
        let projection = Mat4::orthographic_rh(
            shadow.left,
            shadow.right,
            shadow.bottom,
            shadow.top,
            shadow.near,
            shadow.far,
        );

        Some(projection * view)
    }
}

#[derive(Debug, Clone)]
pub struct Fog {
    pub color: Vec3,
    pub near: f32,
    pub far: f32,
}

impl Fog {
    pub fn from_config(config: &FogConfig) -> anyhow::Result<Self> {
        Ok(Self {
            color: parse_hex_linear(&config.color)?,
            near: config.near,
            far: config.far,
        })
    }
}

/// Every light in the showroom. The renderer supports exactly this setup.
#[derive(Debug, Clone)]
pub struct Lights {
    pub ambient: AmbientLight,
    pub key: DirectionalLight,
    pub front: DirectionalLight,
}

impl Lights {
    pub fn from_config(config: &LightingConfig) -> anyhow::Result<Self> {
        Ok(Self {
            ambient: AmbientLight::from_config(&config.ambient)?,
            key: DirectionalLight::from_config(&config.key, &config.shadow)?,
            front: DirectionalLight::from_config(&config.front, &config.shadow)?,
        })
    }

    pub fn directional(&self) -> [&DirectionalLight; 2] {
        [&self.key, &self.front]
    }

    /// The first shadow-casting directional light.
    pub fn shadow_caster(&self) -> Option<&DirectionalLight> {
        self.directional()
            .into_iter()
            .find(|light| light.shadow.is_some())
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec4Swizzles;

    use super::*;

    #[test]
    fn default_lights_match_showroom() {
        let lights = Lights::from_config(&LightingConfig::default()).unwrap();

        assert_eq!(lights.ambient.intensity, 0.7);
        assert_eq!(lights.key.shadow.as_ref().unwrap().map_size, 256);
        assert!(lights.front.shadow.is_none());
        assert!(std::ptr::eq(lights.shadow_caster().unwrap(), &lights.key));
        assert_eq!(lights.key.direction_to_light(), Vec3::Y);
    }

    #[test]
    fn overhead_shadow_camera_covers_the_floor() {
        let lights = Lights::from_config(&LightingConfig::default()).unwrap();
        let view_projection = lights.key.shadow_view_projection().unwrap();

        for point in [
            Vec3::new(0.0, -0.78, 0.0),
            Vec3::new(6.5, -0.78, -6.5),
            Vec3::new(0.0, 2.0, 0.0),
        ] {
            let clip = view_projection * point.extend(1.0);
            let ndc = clip.xyz() / clip.w;
            assert!(ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0, "{point:?}");
            assert!((0.0..=1.0).contains(&ndc.z), "{point:?}");
        }

        // Higher points are closer to the light
        let high = view_projection * Vec3::new(0.0, 2.0, 0.0).extend(1.0);
        let low = view_projection * Vec3::new(0.0, -0.78, 0.0).extend(1.0);
        assert!(high.z < low.z);
    }
}
