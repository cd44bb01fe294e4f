//! Orbit camera controls: left-drag orbits around the target, wheel dollies,
//! right-drag pans. With damping on, input accumulates into deltas that decay
//! every `update`, so `update` must run once per frame.

use std::f32::consts::{PI, TAU};

use glam::{Vec2, Vec3};

use crate::{camera::Camera, config::ControlsConfig};

const EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    Rotate,
    Pan,
}

/// Radius, polar angle from +Y (phi) and azimuth around Y from +Z (theta).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Spherical {
    radius: f32,
    phi: f32,
    theta: f32,
}

impl Spherical {
    fn from_offset(offset: Vec3) -> Self {
        let radius = offset.length();

        if radius == 0.0 {
            return Self::default();
        }

        Self {
            radius,
            theta: offset.x.atan2(offset.z),
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
        }
    }

    fn to_offset(self) -> Vec3 {
        let sin_phi_radius = self.phi.sin() * self.radius;

        Vec3::new(
            sin_phi_radius * self.theta.sin(),
            self.phi.cos() * self.radius,
            sin_phi_radius * self.theta.cos(),
        )
    }
}

pub struct OrbitControls {
    pub target: Vec3,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub enable_pan: bool,
    pub pan_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,

    spherical_delta: Spherical,
    scale: f32,
    pan_offset: Vec3,
    drag: Option<(DragMode, Vec2)>,
}

impl OrbitControls {
    pub fn from_config(config: &ControlsConfig) -> Self {
        Self {
            target: Vec3::from_array(config.target),
            enable_damping: config.enable_damping,
            damping_factor: config.damping_factor,
            rotate_speed: config.rotate_speed,
            zoom_speed: config.zoom_speed,
            enable_pan: config.enable_pan,
            pan_speed: config.pan_speed,
            min_distance: config.min_distance,
            max_distance: config.max_distance,
            min_polar_angle: config.min_polar_angle,
            max_polar_angle: config.max_polar_angle,
            spherical_delta: Spherical::default(),
            scale: 1.0,
            pan_offset: Vec3::ZERO,
            drag: None,
        }
    }

    pub fn begin_drag(&mut self, mode: DragMode, pointer: Vec2) {
        if mode == DragMode::Pan && !self.enable_pan {
            return;
        }

        self.drag = Some((mode, pointer));
    }

    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    /// `pointer` and `viewport` in the same pixel units.
    pub fn pointer_moved(&mut self, pointer: Vec2, viewport: Vec2, camera: &Camera) {
        let Some((mode, last)) = self.drag else {
            return;
        };
        self.drag = Some((mode, pointer));

        if viewport.y <= 0.0 {
            return;
        }

        let delta = pointer - last;

        match mode {
            DragMode::Rotate => {
                let delta = delta * self.rotate_speed;
                self.rotate_left(TAU * delta.x / viewport.y);
                self.rotate_up(TAU * delta.y / viewport.y);
            }
            DragMode::Pan => self.pan(delta * self.pan_speed, viewport, camera),
        }
    }

    /// Positive `delta_y` (scrolling towards the user) dollies out.
    pub fn wheel(&mut self, delta_y: f32) {
        let zoom_scale = 0.95_f32.powf(self.zoom_speed);

        if delta_y < 0.0 {
            self.scale *= zoom_scale;
        } else if delta_y > 0.0 {
            self.scale /= zoom_scale;
        }
    }

    pub fn rotate_left(&mut self, angle: f32) {
        self.spherical_delta.theta -= angle;
    }

    pub fn rotate_up(&mut self, angle: f32) {
        self.spherical_delta.phi -= angle;
    }

    fn pan(&mut self, delta: Vec2, viewport: Vec2, camera: &Camera) {
        let offset = camera.eye - self.target;
        let target_distance = offset.length() * (camera.fov.to_radians() * 0.5).tan();
        let (right, up) = camera.right_and_up();

        let left_amount = 2.0 * delta.x * target_distance / viewport.y;
        let up_amount = 2.0 * delta.y * target_distance / viewport.y;

        self.pan_offset += -right * left_amount + up * up_amount;
    }

    /// Applies accumulated input to the camera. Returns whether the camera moved.
    pub fn update(&mut self, camera: &mut Camera) -> bool {
        let offset = camera.eye - self.target;
        let mut spherical = Spherical::from_offset(offset);

        if self.enable_damping {
            spherical.theta += self.spherical_delta.theta * self.damping_factor;
            spherical.phi += self.spherical_delta.phi * self.damping_factor;
        } else {
            spherical.theta += self.spherical_delta.theta;
            spherical.phi += self.spherical_delta.phi;
        }

        spherical.phi = spherical
            .phi
            .clamp(self.min_polar_angle, self.max_polar_angle)
            .clamp(EPSILON, PI - EPSILON);

        spherical.radius = (spherical.radius * self.scale).clamp(self.min_distance, self.max_distance);

        if self.enable_damping {
            self.target += self.pan_offset * self.damping_factor;
        } else {
            self.target += self.pan_offset;
        }

        let new_eye = self.target + spherical.to_offset();
        let moved = new_eye.distance_squared(camera.eye) > EPSILON
            || camera.target.distance_squared(self.target) > EPSILON;

        camera.eye = new_eye;
        camera.target = self.target;

        if self.enable_damping {
            let decay = 1.0 - self.damping_factor;
            self.spherical_delta.theta *= decay;
            self.spherical_delta.phi *= decay;
            self.pan_offset *= decay;
        } else {
            self.spherical_delta = Spherical::default();
            self.pan_offset = Vec3::ZERO;
        }

        self.scale = 1.0;

        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CameraConfig;

    fn setup() -> (OrbitControls, Camera) {
        let controls = OrbitControls::from_config(&ControlsConfig::default());
        let camera = Camera::from_config(&CameraConfig::default(), 1.5);
        (controls, camera)
    }

    #[test]
    fn first_update_clamps_distance_into_range() {
        let (mut controls, mut camera) = setup();
        assert!(camera.eye.length() > 3.0);

        controls.update(&mut camera);

        assert!((camera.eye.length() - 3.0).abs() < 1e-4);
        // Direction from the target is preserved
        let original = Vec3::new(-1.7, 0.0, 3.3).normalize();
        assert!((camera.eye.normalize() - original).length() < 1e-4);
    }

    #[test]
    fn camera_never_goes_below_the_horizon() {
        let (mut controls, mut camera) = setup();
        controls.enable_damping = false;

        // Dragging upwards rotates the camera under the target
        controls.rotate_up(-PI);
        controls.update(&mut camera);

        assert!(camera.eye.y >= -1e-4);
        let phi = (camera.eye.y / camera.eye.length()).acos();
        assert!(phi <= PI / 2.0 + 1e-4);
    }

    #[test]
    fn wheel_zoom_respects_min_distance() {
        let (mut controls, mut camera) = setup();
        controls.enable_damping = false;

        for _ in 0..100 {
            controls.wheel(-1.0);
            controls.update(&mut camera);
        }

        assert!((camera.eye.length() - 2.0).abs() < 1e-4);
    }

    #[test]
    fn damping_spreads_rotation_over_frames() {
        let (mut controls, mut camera) = setup();
        controls.update(&mut camera);

        let start_theta = camera.eye.x.atan2(camera.eye.z);
        controls.rotate_left(1.0);
        controls.update(&mut camera);
        let first_step = start_theta - camera.eye.x.atan2(camera.eye.z);

        assert!((first_step - 0.05).abs() < 1e-3);

        for _ in 0..500 {
            controls.update(&mut camera);
        }
        let total = start_theta - camera.eye.x.atan2(camera.eye.z);
        assert!((total - 1.0).abs() < 1e-2);
    }

    #[test]
    fn dragging_rotates_only_while_pressed() {
        let (mut controls, mut camera) = setup();
        controls.enable_damping = false;
        controls.update(&mut camera);
        let viewport = Vec2::new(800.0, 600.0);
        let before = camera.eye;

        controls.pointer_moved(Vec2::new(100.0, 0.0), viewport, &camera);
        controls.update(&mut camera);
        assert!((camera.eye - before).length() < 1e-5);

        controls.begin_drag(DragMode::Rotate, Vec2::ZERO);
        controls.pointer_moved(Vec2::new(100.0, 0.0), viewport, &camera);
        controls.end_drag();
        assert!(controls.update(&mut camera));
        assert!((camera.eye - before).length() > 0.1);
    }

    #[test]
    fn pan_moves_target_and_camera_together() {
        let (mut controls, mut camera) = setup();
        controls.enable_damping = false;
        controls.update(&mut camera);
        let offset = camera.eye - controls.target;

        controls.begin_drag(DragMode::Pan, Vec2::ZERO);
        controls.pointer_moved(Vec2::new(50.0, 0.0), Vec2::new(800.0, 600.0), &camera);
        controls.update(&mut camera);

        assert!(controls.target.length() > 0.0);
        assert!((camera.eye - controls.target - offset).length() < 1e-4);
    }
}
