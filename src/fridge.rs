//! Turns the raw fridge model into the interactive product: material tweaks and
//! hanging both doors on their pivots.

use anyhow::Context;

use crate::{
    color::parse_hex_linear,
    config::DoorsConfig,
    doors::{DoorParts, HingedDoor},
    material_manager::MaterialId,
    scene_graph::{ObjectId, Scene},
};

pub const TOP_DOOR: &str = "top_door";
pub const BOTTOM_DOOR: &str = "bottom_door";
pub const BODY: &str = "fridge_body";
pub const TOP_HANDLE: &str = "top_handle";
pub const BOTTOM_HANDLE: &str = "bottom_handle";
pub const ADS: [&str; 3] = ["ad_davidSW", "ad_maldives", "ad_sasquatch"];
pub const LOGO: &str = "TWFC";
pub const PATRONS: &str = "patrons";

const LOGO_COLOR: &str = "#ecf0f1";

struct FridgeNodes {
    top_door: ObjectId,
    bottom_door: ObjectId,
    body: ObjectId,
    top_handle: ObjectId,
    bottom_handle: ObjectId,
    ads: [ObjectId; 3],
    logo: ObjectId,
    patrons: ObjectId,
}

impl FridgeNodes {
    fn find(scene: &Scene, root: ObjectId) -> anyhow::Result<Self> {
        let find = |name: &str| {
            scene
                .find_descendant_by_name(root, name)
                .with_context(|| format!("Fridge model has no node named {name:?}"))
        };

        Ok(Self {
            top_door: find(TOP_DOOR)?,
            bottom_door: find(BOTTOM_DOOR)?,
            body: find(BODY)?,
            top_handle: find(TOP_HANDLE)?,
            bottom_handle: find(BOTTOM_HANDLE)?,
            ads: [find(ADS[0])?, find(ADS[1])?, find(ADS[2])?],
            logo: find(LOGO)?,
            patrons: find(PATRONS)?,
        })
    }
}

/// Doors of the assembled fridge, top first.
pub struct Fridge {
    pub doors: Vec<HingedDoor>,
}

/// Prepares the model spawned under `root`. Pivots must already be children of `root`.
pub fn assemble(
    scene: &mut Scene,
    root: ObjectId,
    pivot_top: ObjectId,
    pivot_bottom: ObjectId,
    config: &DoorsConfig,
) -> anyhow::Result<Fridge> {
    let nodes = FridgeNodes::find(scene, root)?;

    scene.traverse_mut(root, |object| object.cast_shadow = true);

    configure_materials(scene, &nodes)?;

    let top = HingedDoor::assemble(
        scene,
        DoorParts {
            name: "top door",
            pivot: pivot_top,
            door: nodes.top_door,
            handle: nodes.top_handle,
            extras: &nodes.ads,
        },
        config.pivot_displacement,
        config.open_angle,
        config.animation_duration,
    )?;

    let mut bottom = HingedDoor::assemble(
        scene,
        DoorParts {
            name: "bottom door",
            pivot: pivot_bottom,
            door: nodes.bottom_door,
            handle: nodes.bottom_handle,
            extras: &[],
        },
        config.pivot_displacement,
        config.open_angle,
        config.animation_duration,
    )?;
    bottom.interactive = config.bottom_door_interactive;

    Ok(Fridge {
        doors: vec![top, bottom],
    })
}

fn material_of(scene: &Scene, object: ObjectId, name: &str) -> anyhow::Result<MaterialId> {
    scene
        .get_object(object)
        .and_then(|object| object.material())
        .with_context(|| format!("Node {name:?} has no mesh material"))
}

fn configure_materials(scene: &mut Scene, nodes: &FridgeNodes) -> anyhow::Result<()> {
    let body = material_of(scene, nodes.body, BODY)?;
    {
        let material = scene
            .materials
            .get_mut(body)
            .context("Body material missing")?;
        material.roughness = 0.2;
        material.metalness = 0.1;
        material.tone_mapped = false;
        material.use_env_map = true;
        material.env_map_intensity = 0.5;
    }

    let clone_body = |scene: &mut Scene| {
        scene
            .materials
            .clone_material(body)
            .context("Body material missing")
    };

    // Both handles share one material
    let handle = clone_body(scene)?;
    if let Some(material) = scene.materials.get_mut(handle) {
        material.metalness = 0.6;
        material.roughness = 0.1;
        material.use_env_map = true;
    }
    for object in [nodes.top_handle, nodes.bottom_handle] {
        if let Some(object) = scene.get_object_mut(object) {
            object.set_material(handle);
        }
    }

    let logo = clone_body(scene)?;
    if let Some(material) = scene.materials.get_mut(logo) {
        material.roughness = 0.3;
        material.color = parse_hex_linear(LOGO_COLOR)?;
    }
    if let Some(object) = scene.get_object_mut(nodes.logo) {
        object.set_material(logo);
    }

    let patrons = clone_body(scene)?;
    if let Some(material) = scene.materials.get_mut(patrons) {
        material.metalness = 0.4;
        material.roughness = 0.1;
    }
    if let Some(object) = scene.get_object_mut(nodes.patrons) {
        object.set_material(patrons);
    }

    for (&ad, name) in nodes.ads.iter().zip(ADS) {
        let material = material_of(scene, ad, name)?;
        if let Some(material) = scene.materials.get_mut(material) {
            material.use_env_map = true;
        }
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use glam::Vec3;

    use super::*;
    use crate::{
        material_manager::StandardMaterial,
        model::Model,
        scene_graph::{Object3D, SceneModel},
    };

    /// A stand-in for the fridge model: one small quad per named node.
    pub(crate) fn fake_fridge(scene: &mut Scene, root: ObjectId) -> ObjectId {
        let model_root = scene.add_child(root, Object3D::new("Scene")).unwrap();
        let quad = scene.add_model(SceneModel::new(Model::plane("quad", 0.1, 0.1).unwrap()));

        let names = [TOP_DOOR, BOTTOM_DOOR, BODY, TOP_HANDLE, BOTTOM_HANDLE, LOGO, PATRONS]
            .into_iter()
            .chain(ADS);

        for (i, name) in names.enumerate() {
            let material = scene.materials.add_material(StandardMaterial {
                name: format!("{name} material"),
                ..Default::default()
            });
            let mut object = Object3D::new(name);
            object.model_id = Some(quad);
            object.material_ids = vec![material];
            object
                .transform
                .set_translation(Vec3::new(0.3, i as f32 * 0.1, 0.35));
            scene.add_child(model_root, object).unwrap();
        }

        model_root
    }

    fn setup() -> (Scene, ObjectId, ObjectId, ObjectId) {
        let mut scene = Scene::new();
        let root = scene.add_object(Object3D::new("showroom"));
        let top = scene.add_child(root, Object3D::new("pivot_top")).unwrap();
        let bottom = scene.add_child(root, Object3D::new("pivot_bottom")).unwrap();
        fake_fridge(&mut scene, root);
        (scene, root, top, bottom)
    }

    fn material(scene: &Scene, name: &str) -> StandardMaterial {
        let id = scene.get_object_by_name(name).unwrap();
        let material = scene.objects[id].material().unwrap();
        scene.materials.get(material).unwrap().clone()
    }

    #[test]
    fn materials_are_tuned_per_part() {
        let (mut scene, root, top, bottom) = setup();
        assemble(&mut scene, root, top, bottom, &DoorsConfig::default()).unwrap();

        let body = material(&scene, BODY);
        assert_eq!((body.roughness, body.metalness), (0.2, 0.1));
        assert!(!body.tone_mapped);
        assert!(body.use_env_map);
        assert_eq!(body.env_map_intensity, 0.5);

        let top_handle = scene.get_object_by_name(TOP_HANDLE).unwrap();
        let bottom_handle = scene.get_object_by_name(BOTTOM_HANDLE).unwrap();
        assert_eq!(
            scene.objects[top_handle].material(),
            scene.objects[bottom_handle].material()
        );
        let handle = material(&scene, TOP_HANDLE);
        assert_eq!((handle.roughness, handle.metalness), (0.1, 0.6));
        assert!(!handle.tone_mapped);

        let logo = material(&scene, LOGO);
        assert_eq!(logo.roughness, 0.3);
        assert_eq!(logo.color, parse_hex_linear(LOGO_COLOR).unwrap());

        let patrons = material(&scene, PATRONS);
        assert_eq!((patrons.roughness, patrons.metalness), (0.1, 0.4));

        for ad in ADS {
            assert!(material(&scene, ad).use_env_map);
        }
    }

    #[test]
    fn doors_hang_on_their_pivots() {
        let (mut scene, root, top, bottom) = setup();
        let fridge = assemble(&mut scene, root, top, bottom, &DoorsConfig::default()).unwrap();

        assert_eq!(fridge.doors.len(), 2);
        assert!(fridge.doors[0].interactive);
        assert!(!fridge.doors[1].interactive);

        let top_door = scene.get_object_by_name(TOP_DOOR).unwrap();
        let top_handle = scene.get_object_by_name(TOP_HANDLE).unwrap();
        assert_eq!(scene.objects[top_door].parent_id, Some(top));
        assert_eq!(scene.objects[top_handle].parent_id, Some(top_door));
        for ad in ADS {
            let ad = scene.get_object_by_name(ad).unwrap();
            assert_eq!(scene.objects[ad].parent_id, Some(top_door));
        }

        let bottom_door = scene.get_object_by_name(BOTTOM_DOOR).unwrap();
        assert_eq!(scene.objects[bottom_door].parent_id, Some(bottom));
        assert!(scene.descendants(root).iter().all(|&id| scene.objects[id].cast_shadow));
    }

    #[test]
    fn missing_node_is_reported_by_name() {
        let mut scene = Scene::new();
        let root = scene.add_object(Object3D::new("showroom"));
        let top = scene.add_child(root, Object3D::new("pivot_top")).unwrap();
        let bottom = scene.add_child(root, Object3D::new("pivot_bottom")).unwrap();

        let error = assemble(&mut scene, root, top, bottom, &DoorsConfig::default())
            .err()
            .unwrap();
        assert!(error.to_string().contains(TOP_DOOR));
    }
}
