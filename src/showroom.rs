use std::f32::consts::FRAC_PI_2;

use anyhow::Context;
use glam::{Quat, Vec2, Vec3};

use crate::{
    assets::{AssetEvent, EnvironmentMap, GltfAsset},
    camera::Camera,
    color::parse_hex_linear,
    config::AppConfig,
    controls::{DragMode, OrbitControls},
    doors::HingedDoor,
    fridge,
    lighting::{Fog, Lights},
    loading::LoadingManager,
    material_manager::StandardMaterial,
    model::Model,
    raycaster::{Intersection, Raycaster},
    scene_graph::{Object3D, ObjectId, Scene, SceneModel},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
}

/// Door handle under the pointer.
#[derive(Debug, Clone, Copy)]
pub struct Hover {
    pub door: usize,
    pub intersection: Intersection,
}

/// Everything on screen plus the interaction state. Knows nothing about the GPU.
pub struct Showroom {
    pub config: AppConfig,
    pub camera: Camera,
    pub controls: OrbitControls,
    pub scene: Scene,
    pub lights: Lights,
    pub fog: Fog,
    pub background: Vec3,
    pub loading: LoadingManager,
    pub doors: Vec<HingedDoor>,
    pub start_time: std::time::Instant,

    group: ObjectId,
    pivot_top: ObjectId,
    pivot_bottom: ObjectId,
    showroom_rotation: f32,

    environment_map: Option<EnvironmentMap>,
    raycaster: Raycaster,
    viewport: Vec2,
    pointer: Option<Vec2>,
    hover: Option<Hover>,
}

impl Showroom {
    pub fn new(config: AppConfig, viewport: Vec2) -> anyhow::Result<Self> {
        let aspect = if viewport.y > 0.0 {
            viewport.x / viewport.y
        } else {
            1.0
        };
        let camera = Camera::from_config(&config.camera, aspect);
        let controls = OrbitControls::from_config(&config.controls);

        let mut scene = Scene::new();

        // The fridge group and its pivots exist before the model arrives
        let group = scene.add_object(Object3D::new("showroom"));
        let pivot_top = scene.add_child(group, Object3D::new("pivot_top"))?;
        let pivot_bottom = scene.add_child(group, Object3D::new("pivot_bottom"))?;
        let showroom_rotation = config.scene.showroom_rotation;
        scene.rotate_object(group, Quat::from_rotation_y(showroom_rotation));

        add_floor(&mut scene, &config)?;

        let lights = Lights::from_config(&config.lighting).context("Invalid light settings")?;
        let fog = Fog::from_config(&config.fog).context("Invalid fog settings")?;
        let background =
            parse_hex_linear(&config.scene.background_color).context("Invalid background color")?;
        let loading = LoadingManager::new(config.loading.clone());

        Ok(Self {
            config,
            camera,
            controls,
            scene,
            lights,
            fog,
            background,
            loading,
            doors: Vec::new(),
            start_time: std::time::Instant::now(),
            group,
            pivot_top,
            pivot_bottom,
            showroom_rotation,
            environment_map: None,
            raycaster: Raycaster::default(),
            viewport,
            pointer: None,
            hover: None,
        })
    }

    pub fn handle_asset_event(&mut self, event: AssetEvent) {
        match event {
            AssetEvent::ItemLoaded { url } => self.loading.item_end(&url),
            AssetEvent::ItemFailed { url, error } => self.loading.item_error(&url, &error),
            AssetEvent::EnvironmentMap(environment_map) => {
                log::info!(
                    "Environment map ready ({0}x{0} per face)",
                    environment_map.size
                );
                self.environment_map = Some(environment_map);
            }
            AssetEvent::Model(asset) => {
                if let Err(error) = self.add_fridge(&asset) {
                    log::error!("Failed to set up {}: {:?}", asset.path.display(), error);
                }
            }
        }
    }

    /// Hands a newly loaded environment map over to the renderer, once.
    pub fn take_environment_map(&mut self) -> Option<EnvironmentMap> {
        self.environment_map.take()
    }

    fn add_fridge(&mut self, asset: &GltfAsset) -> anyhow::Result<()> {
        let file_name = asset.path.display().to_string();

        self.scene.spawn_gltf_scene(
            &file_name,
            &asset.document,
            &asset.buffers,
            &asset.images,
            Some(self.group),
        )?;

        let fridge = fridge::assemble(
            &mut self.scene,
            self.group,
            self.pivot_top,
            self.pivot_bottom,
            &self.config.doors,
        )?;

        log::info!(
            "Fridge ready: {} objects, {} models",
            self.scene.objects.len(),
            self.scene.models.len()
        );

        self.doors = fridge.doors;
        Ok(())
    }

    pub fn resize(&mut self, viewport: Vec2) {
        self.viewport = viewport;
        self.camera.set_resolution(viewport);
    }

    /// Cursor position in pixels, origin top-left.
    pub fn pointer_moved(&mut self, position: Vec2) {
        self.controls
            .pointer_moved(position, self.viewport, &self.camera);

        if self.viewport.x > 0.0 && self.viewport.y > 0.0 {
            self.pointer = Some(Vec2::new(
                position.x / self.viewport.x * 2.0 - 1.0,
                -(position.y / self.viewport.y) * 2.0 + 1.0,
            ));
        }
    }

    pub fn pointer_left(&mut self) {
        self.pointer = None;
        self.hover = None;
    }

    pub fn pointer_pressed(&mut self, button: PointerButton, position: Vec2) {
        match button {
            PointerButton::Primary => {
                if let Some(hover) = self.hover {
                    if let Some(door) = self.doors.get_mut(hover.door) {
                        door.toggle();
                    }
                }
                self.controls.begin_drag(DragMode::Rotate, position);
            }
            PointerButton::Secondary => self.controls.begin_drag(DragMode::Pan, position),
        }
    }

    pub fn pointer_released(&mut self) {
        self.controls.end_drag();
    }

    pub fn wheel(&mut self, delta_y: f32) {
        self.controls.wheel(delta_y);
    }

    /// Whether the pointer is over something clickable.
    pub fn is_hovering_handle(&self) -> bool {
        self.hover.is_some()
    }

    pub fn showroom_rotation(&self) -> f32 {
        self.showroom_rotation
    }

    pub fn set_showroom_rotation(&mut self, angle: f32) {
        self.showroom_rotation = angle;
        self.scene
            .set_object_rotation(self.group, Quat::from_rotation_y(angle));
    }

    pub fn update(&mut self, delta_time: f32) {
        self.update_hover();

        for door in &mut self.doors {
            door.update(&mut self.scene, delta_time);
        }

        self.loading.update(delta_time);
        self.controls.update(&mut self.camera);
    }

    fn update_hover(&mut self) {
        let Some(pointer) = self.pointer else {
            self.hover = None;
            return;
        };

        self.raycaster.set_from_camera(pointer, &self.camera);

        self.hover = self
            .doors
            .iter()
            .enumerate()
            .filter(|(_, door)| door.interactive)
            .filter_map(|(index, door)| {
                self.raycaster
                    .intersect_object(&self.scene, door.handle, true)
                    .first()
                    .map(|intersection| Hover {
                        door: index,
                        intersection: *intersection,
                    })
            })
            .min_by(|a, b| {
                a.intersection
                    .distance
                    .total_cmp(&b.intersection.distance)
            });
    }
}

fn add_floor(scene: &mut Scene, config: &AppConfig) -> anyhow::Result<ObjectId> {
    let size = config.scene.floor_size;
    let model = scene.add_model(SceneModel::new(Model::plane("floor", size, size)?));

    let material = scene.materials.add_material(StandardMaterial {
        name: "floor".to_string(),
        color: parse_hex_linear(&config.scene.floor_color).context("Invalid floor color")?,
        metalness: 0.0,
        roughness: 0.5,
        ..Default::default()
    });

    let mut floor = Object3D::new("floor");
    floor.model_id = Some(model);
    floor.material_ids = vec![material];
    floor.receive_shadow = true;
    floor.transform.set_transform(
        Vec3::new(0.0, config.scene.floor_y, 0.0),
        Quat::from_rotation_x(-FRAC_PI_2),
        Vec3::ONE,
    );

    Ok(scene.add_object(floor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fridge::tests::fake_fridge;

    fn showroom_with_fake_fridge() -> Showroom {
        let mut showroom = Showroom::new(AppConfig::default(), Vec2::new(800.0, 600.0)).unwrap();
        fake_fridge(&mut showroom.scene, showroom.group);
        let fridge = fridge::assemble(
            &mut showroom.scene,
            showroom.group,
            showroom.pivot_top,
            showroom.pivot_bottom,
            &showroom.config.doors,
        )
        .unwrap();
        showroom.doors = fridge.doors;
        showroom
    }

    /// Pixel position where the top handle appears on screen.
    fn handle_on_screen(showroom: &Showroom) -> Vec2 {
        let handle = showroom.doors[0].handle;
        let world = showroom.scene.world_matrix(handle).transform_point3(Vec3::ZERO);
        let clip = showroom.camera.get_vp_matrix() * world.extend(1.0);
        let ndc = Vec2::new(clip.x / clip.w, clip.y / clip.w);

        Vec2::new(
            (ndc.x + 1.0) * 0.5 * showroom.viewport.x,
            (1.0 - ndc.y) * 0.5 * showroom.viewport.y,
        )
    }

    #[test]
    fn scene_starts_with_floor_group_and_pivots() {
        let showroom = Showroom::new(AppConfig::default(), Vec2::new(800.0, 600.0)).unwrap();

        let floor = showroom.scene.get_object_by_name("floor").unwrap();
        assert!(showroom.scene.objects[floor].receive_shadow);
        let floor_origin = showroom.scene.world_matrix(floor).transform_point3(Vec3::ZERO);
        assert!((floor_origin.y + 0.78).abs() < 1e-6);
        // The plane's normal points up once rotated
        let normal = showroom.scene.world_matrix(floor).transform_vector3(Vec3::Z);
        assert!((normal - Vec3::Y).length() < 1e-5);

        assert_eq!(
            showroom.scene.objects[showroom.pivot_top].parent_id,
            Some(showroom.group)
        );
        assert!((showroom.camera.aspect - 800.0 / 600.0).abs() < 1e-6);
    }

    #[test]
    fn pointer_is_converted_to_ndc() {
        let mut showroom = Showroom::new(AppConfig::default(), Vec2::new(800.0, 600.0)).unwrap();
        showroom.pointer_moved(Vec2::new(0.0, 0.0));
        assert_eq!(showroom.pointer, Some(Vec2::new(-1.0, 1.0)));

        showroom.pointer_moved(Vec2::new(400.0, 450.0));
        assert_eq!(showroom.pointer, Some(Vec2::new(0.0, -0.5)));

        showroom.pointer_left();
        assert_eq!(showroom.pointer, None);
    }

    #[test]
    fn clicking_the_handle_opens_and_closes_the_door() {
        let mut showroom = showroom_with_fake_fridge();
        showroom.update(0.0);

        let position = handle_on_screen(&showroom);
        showroom.pointer_moved(position);
        showroom.update(0.0);
        assert!(showroom.is_hovering_handle());

        showroom.pointer_pressed(PointerButton::Primary, position);
        showroom.pointer_released();
        assert!(showroom.doors[0].is_open());
        showroom.update(1.0);
        assert!((showroom.doors[0].angle() - showroom.config.doors.open_angle).abs() < 1e-6);

        // The handle swung away with the door
        showroom.update(0.0);
        assert!(!showroom.is_hovering_handle());

        // Aim at where the handle is now and close again
        let position = handle_on_screen(&showroom);
        showroom.pointer_moved(position);
        showroom.update(0.0);
        assert!(showroom.is_hovering_handle());
        showroom.pointer_pressed(PointerButton::Primary, position);
        showroom.pointer_released();
        showroom.update(1.0);
        assert!(!showroom.doors[0].is_open());
        assert_eq!(showroom.doors[0].angle(), 0.0);
    }

    #[test]
    fn clicking_elsewhere_does_nothing() {
        let mut showroom = showroom_with_fake_fridge();
        showroom.update(0.0);

        showroom.pointer_moved(Vec2::new(5.0, 5.0));
        showroom.update(0.0);
        assert!(!showroom.is_hovering_handle());

        showroom.pointer_pressed(PointerButton::Primary, Vec2::new(5.0, 5.0));
        showroom.pointer_released();
        assert!(!showroom.doors[0].is_open());
    }

    #[test]
    fn loading_events_drive_the_overlay() {
        let mut showroom = Showroom::new(AppConfig::default(), Vec2::new(800.0, 600.0)).unwrap();
        showroom.loading.item_start("a");
        showroom.loading.item_start("b");

        showroom.handle_asset_event(AssetEvent::ItemLoaded {
            url: "a".to_string(),
        });
        assert_eq!(showroom.loading.progress_ratio(), 0.5);

        showroom.handle_asset_event(AssetEvent::ItemFailed {
            url: "b".to_string(),
            error: anyhow::anyhow!("not found"),
        });
        assert!(showroom.loading.is_finished());

        showroom.update(10.0);
        assert_eq!(showroom.loading.overlay_alpha(), 0.0);
    }
}
