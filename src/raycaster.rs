use glam::{Vec2, Vec3};

use crate::{
    camera::Camera,
    math::ray::Ray,
    scene_graph::{ObjectId, Scene},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    pub object: ObjectId,
    pub distance: f32,
    pub point: Vec3,
}

pub struct Raycaster {
    pub ray: Ray,
    pub near: f32,
    pub far: f32,
}

impl Default for Raycaster {
    fn default() -> Self {
        Self {
            ray: Ray::new(Vec3::ZERO, Vec3::NEG_Z),
            near: 0.0,
            far: f32::INFINITY,
        }
    }
}

impl Raycaster {
    /// `ndc` in -1..1 with +y up.
    pub fn set_from_camera(&mut self, ndc: Vec2, camera: &Camera) {
        self.ray = Ray::from_ndc(ndc, camera.get_vp_matrix().inverse(), camera.eye);
    }

    /// Hits on `object` (and its descendants when `recursive`), nearest first.
    /// Uses world matrices computed from the current local transforms.
    pub fn intersect_object(
        &self,
        scene: &Scene,
        object: ObjectId,
        recursive: bool,
    ) -> Vec<Intersection> {
        let candidates = if recursive {
            scene.descendants(object)
        } else {
            vec![object]
        };

        let mut hits = candidates
            .into_iter()
            .filter_map(|id| self.intersect_mesh(scene, id))
            .collect::<Vec<_>>();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }

    /// Nearest triangle hit on one mesh node.
    fn intersect_mesh(&self, scene: &Scene, id: ObjectId) -> Option<Intersection> {
        let object = scene.get_object(id)?;
        let model = &scene.get_model(object.model_id?)?.model;

        if !scene.is_visible(id) {
            return None;
        }

        let world = scene.world_matrix(id);
        let inverse_world = world.inverse();

        // Test in the mesh's local space, then convert distances back to world space
        let local_ray = Ray::new(
            inverse_world.transform_point3(self.ray.origin),
            inverse_world.transform_vector3(self.ray.direction),
        );

        model.bounding_box.intersect_ray(&local_ray)?;

        model
            .primitives
            .iter()
            .flat_map(|primitive| primitive.triangles())
            .filter_map(|[a, b, c]| local_ray.intersect_triangle(a, b, c))
            .map(|local_distance| {
                let point = world.transform_point3(local_ray.at(local_distance));
                let distance = self.ray.origin.distance(point);
                Intersection {
                    object: id,
                    distance,
                    point,
                }
            })
            .filter(|hit| hit.distance >= self.near && hit.distance <= self.far)
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}

#[cfg(test)]
mod tests {
    use glam::Quat;

    use super::*;
    use crate::{config::CameraConfig, model::Model, scene_graph::Object3D, scene_graph::SceneModel};

    fn quad(scene: &mut Scene, name: &str, position: Vec3) -> ObjectId {
        let model = scene.add_model(SceneModel::new(Model::plane(name, 1.0, 1.0).unwrap()));
        let mut object = Object3D::new(name);
        object.model_id = Some(model);
        object.transform.set_translation(position);
        scene.add_object(object)
    }

    fn camera_looking_down_negative_z() -> Camera {
        let mut camera = Camera::from_config(&CameraConfig::default(), 1.0);
        camera.eye = Vec3::new(0.0, 0.0, 5.0);
        camera.target = Vec3::ZERO;
        camera
    }

    #[test]
    fn hits_are_sorted_nearest_first() {
        let mut scene = Scene::new();
        let group = scene.add_object(Object3D::new("group"));
        let far = quad(&mut scene, "far", Vec3::new(0.0, 0.0, -2.0));
        let near = quad(&mut scene, "near", Vec3::new(0.0, 0.0, 1.0));
        scene.set_object_parent(far, Some(group)).unwrap();
        scene.set_object_parent(near, Some(group)).unwrap();

        let mut raycaster = Raycaster::default();
        raycaster.set_from_camera(Vec2::ZERO, &camera_looking_down_negative_z());

        let hits = raycaster.intersect_object(&scene, group, true);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].object, near);
        assert!((hits[0].distance - 4.0).abs() < 1e-3);
        assert_eq!(hits[1].object, far);
    }

    #[test]
    fn misses_when_pointer_is_off_the_mesh() {
        let mut scene = Scene::new();
        let target = quad(&mut scene, "handle", Vec3::ZERO);

        let mut raycaster = Raycaster::default();
        raycaster.set_from_camera(Vec2::new(0.9, 0.9), &camera_looking_down_negative_z());

        assert!(raycaster.intersect_object(&scene, target, true).is_empty());
    }

    #[test]
    fn follows_parent_transforms_and_recurses() {
        let mut scene = Scene::new();
        let mut pivot = Object3D::new("pivot");
        pivot.transform.set_translation(Vec3::new(3.0, 0.0, 0.0));
        pivot.transform.set_rotation(Quat::from_rotation_y(0.3));
        let pivot = scene.add_object(pivot);
        let handle = quad(&mut scene, "handle", Vec3::ZERO);
        scene.set_object_parent(handle, Some(pivot)).unwrap();

        let mut camera = camera_looking_down_negative_z();
        camera.eye = Vec3::new(3.0, 0.0, 5.0);
        camera.target = Vec3::new(3.0, 0.0, 0.0);

        let mut raycaster = Raycaster::default();
        raycaster.set_from_camera(Vec2::ZERO, &camera);

        assert!(raycaster.intersect_object(&scene, pivot, false).is_empty());
        let hits = raycaster.intersect_object(&scene, pivot, true);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].object, handle);
        assert!((hits[0].point - Vec3::new(3.0, 0.0, 0.0)).length() < 1e-3);
    }

    #[test]
    fn hidden_meshes_are_ignored() {
        let mut scene = Scene::new();
        let target = quad(&mut scene, "handle", Vec3::ZERO);
        scene.objects[target].visible = false;

        let mut raycaster = Raycaster::default();
        raycaster.set_from_camera(Vec2::ZERO, &camera_looking_down_negative_z());

        assert!(raycaster.intersect_object(&scene, target, true).is_empty());
    }
}
