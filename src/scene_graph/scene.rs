use anyhow::{bail, Context};
use glam::{Mat4, Quat, Vec3};
use id_arena::Arena;
use std::collections::HashMap;

use crate::material_manager::MaterialManager;
use crate::model::{Buffers, Model};
use crate::scene_graph::object3d::{Object3D, ObjectId};
use crate::scene_graph::scene_model::{SceneModel, SceneModelId};
use crate::scene_graph::transform::Transform;

pub struct Scene {
    pub objects: Arena<Object3D>,
    pub models: Arena<SceneModel>,
    pub materials: MaterialManager,
    gltf_mesh_to_model: HashMap<(String, usize), SceneModelId>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            objects: Arena::new(),
            models: Arena::new(),
            materials: MaterialManager::new(),
            gltf_mesh_to_model: HashMap::new(),
        }
    }

    pub fn add_object(&mut self, object: Object3D) -> ObjectId {
        self.objects.alloc(object)
    }

    /// Adds `object` as a child of `parent`, keeping its transform as a local one.
    pub fn add_child(&mut self, parent: ObjectId, object: Object3D) -> anyhow::Result<ObjectId> {
        let id = self.add_object(object);
        self.set_object_parent(id, Some(parent))?;
        Ok(id)
    }

    pub fn get_object(&self, id: ObjectId) -> Option<&Object3D> {
        self.objects.get(id)
    }

    pub fn get_object_mut(&mut self, id: ObjectId) -> Option<&mut Object3D> {
        self.objects.get_mut(id)
    }

    /// First object with this name, in creation order.
    #[cfg(test)]
    pub fn get_object_by_name(&self, name: &str) -> Option<ObjectId> {
        self.objects
            .iter()
            .find(|(_, object)| object.name == name)
            .map(|(id, _)| id)
    }

    /// Depth-first search starting at (and including) `root`.
    pub fn find_descendant_by_name(&self, root: ObjectId, name: &str) -> Option<ObjectId> {
        self.descendants(root)
            .into_iter()
            .find(|id| self.objects.get(*id).is_some_and(|object| object.name == name))
    }

    /// `root` followed by all of its descendants, depth-first.
    pub fn descendants(&self, root: ObjectId) -> Vec<ObjectId> {
        let mut result = Vec::new();
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            let Some(object) = self.objects.get(id) else {
                continue;
            };
            result.push(id);
            stack.extend(object.child_ids.iter().rev().copied());
        }

        result
    }

    pub fn traverse_mut(&mut self, root: ObjectId, mut f: impl FnMut(&mut Object3D)) {
        for id in self.descendants(root) {
            if let Some(object) = self.objects.get_mut(id) {
                f(object);
            }
        }
    }

    pub fn add_model(&mut self, model: SceneModel) -> SceneModelId {
        self.models.alloc(model)
    }

    pub fn get_model(&self, id: SceneModelId) -> Option<&SceneModel> {
        self.models.get(id)
    }

    /// Spawns the default scene of a glTF document as a group under `parent`.
    /// Returns the group.
    pub fn spawn_gltf_scene(
        &mut self,
        file_name: &str,
        document: &gltf::Document,
        buffers: Buffers,
        images: &[gltf::image::Data],
        parent: Option<ObjectId>,
    ) -> anyhow::Result<ObjectId> {
        self.materials
            .load_all_materials_from_gltf(file_name, document, images)?;

        let gltf_scene = document
            .default_scene()
            .or_else(|| document.scenes().next())
            .context("No scenes in glTF")?;

        let group = self.add_object(Object3D::new(gltf_scene.name().unwrap_or("Scene")));
        if parent.is_some() {
            self.set_object_parent(group, parent)?;
        }

        for node in gltf_scene.nodes() {
            self.spawn_gltf_node(file_name, buffers, &node, group)?;
        }

        Ok(group)
    }

    fn spawn_gltf_node(
        &mut self,
        file_name: &str,
        buffers: Buffers,
        node: &gltf::Node,
        parent: ObjectId,
    ) -> anyhow::Result<ObjectId> {
        let node_name = node.name().unwrap_or("Unnamed").to_string();
        let mut object = Object3D::new(node_name.clone());
        let (translation, rotation, scale) = node.transform().decomposed();

        object.transform.set_transform(
            translation.into(),
            Quat::from_array(rotation),
            scale.into(),
        );

        if let Some(mesh) = node.mesh() {
            let key = (file_name.to_string(), mesh.index());

            let model_id = match self.gltf_mesh_to_model.get(&key).copied() {
                Some(model_id) => model_id,
                None => {
                    let mesh_name = mesh
                        .name()
                        .map(String::from)
                        .unwrap_or_else(|| format!("{} (Mesh)", node_name));

                    let model = Model::from_gltf(mesh_name, mesh, buffers)
                        .with_context(|| format!("Failed to load mesh of node {}", node_name))?;
                    let model_id = self.add_model(SceneModel::new(model));
                    self.gltf_mesh_to_model.insert(key, model_id);

                    model_id
                }
            };

            let mut material_ids = Vec::new();
            for primitive in &self.models[model_id].model.primitives {
                let material_id = self
                    .materials
                    .get_gltf_material(file_name, primitive.material_index)
                    .with_context(|| {
                        format!("Missing material for a primitive of {}", node_name)
                    })?;
                material_ids.push(material_id);
            }

            object.model_id = Some(model_id);
            object.material_ids = material_ids;
        }

        let object_id = self.add_child(parent, object)?;

        for child in node.children() {
            self.spawn_gltf_node(file_name, buffers, &child, object_id)?;
        }

        Ok(object_id)
    }

    /// Updates all object transforms in hierarchical order
    fn update_transforms(&self) {
        let root_objects = self.objects.iter().filter_map(|(id, object)| {
            if object.parent_id.is_none() {
                Some(id)
            } else {
                None
            }
        });

        for root_id in root_objects {
            self.update_object_transform_recursive(root_id, Mat4::IDENTITY);
        }
    }

    /// Recursively updates an object's world transform and its children
    fn update_object_transform_recursive(&self, object_id: ObjectId, parent_world_matrix: Mat4) {
        if let Some(object) = self.objects.get(object_id) {
            if object.transform.is_world_dirty() {
                let local_matrix = *object.transform.get_local_matrix();
                let world_matrix = parent_world_matrix * local_matrix;
                object.transform.set_world_matrix(world_matrix);
            }

            let world_matrix = *object.transform.get_world_matrix();
            for &child_id in &object.child_ids {
                self.update_object_transform_recursive(child_id, world_matrix);
            }
        }
    }

    /// Computes the world matrix from local transforms, without relying on the cached one.
    pub fn world_matrix(&self, object_id: ObjectId) -> Mat4 {
        let mut matrix = Mat4::IDENTITY;
        let mut current = Some(object_id);

        while let Some(id) = current {
            let Some(object) = self.objects.get(id) else {
                break;
            };
            matrix = *object.transform.get_local_matrix() * matrix;
            current = object.parent_id;
        }

        matrix
    }

    /// Visible when the object and all of its ancestors are.
    pub fn is_visible(&self, object_id: ObjectId) -> bool {
        let mut current = Some(object_id);

        while let Some(id) = current {
            match self.objects.get(id) {
                Some(object) if object.visible => current = object.parent_id,
                _ => return false,
            }
        }

        true
    }

    /// Invalidates world transforms for an object and all its descendants
    pub fn invalidate_object_hierarchy(&self, object_id: ObjectId) {
        if let Some(object) = self.objects.get(object_id) {
            object.transform.invalidate_world();

            for &child_id in &object.child_ids {
                self.invalidate_object_hierarchy(child_id);
            }
        }
    }

    fn is_ancestor_or_self(&self, ancestor: ObjectId, object_id: ObjectId) -> bool {
        let mut current = Some(object_id);

        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.objects.get(id).and_then(|object| object.parent_id);
        }

        false
    }

    /// Sets the parent of an object and updates child relationships.
    /// The local transform is kept, so the world transform follows the new parent.
    pub fn set_object_parent(
        &mut self,
        child_id: ObjectId,
        new_parent_id: Option<ObjectId>,
    ) -> anyhow::Result<()> {
        let Some(child) = self.objects.get(child_id) else {
            bail!("Unknown object {:?}", child_id);
        };
        let old_parent_id = child.parent_id;

        if let Some(new_parent_id) = new_parent_id {
            if self.objects.get(new_parent_id).is_none() {
                bail!("Unknown parent object {:?}", new_parent_id);
            }
            if self.is_ancestor_or_self(child_id, new_parent_id) {
                bail!(
                    "Cannot parent {} under its own descendant",
                    self.objects[child_id].name
                );
            }
        }

        if let Some(old_parent) = old_parent_id.and_then(|id| self.objects.get_mut(id)) {
            old_parent.child_ids.retain(|&id| id != child_id);
        }

        self.objects[child_id].parent_id = new_parent_id;

        if let Some(new_parent) = new_parent_id.and_then(|id| self.objects.get_mut(id)) {
            new_parent.child_ids.push(child_id);
        }

        self.invalidate_object_hierarchy(child_id);

        Ok(())
    }

    /// Re-parents an object while keeping its world transform.
    pub fn attach(&mut self, parent_id: ObjectId, child_id: ObjectId) -> anyhow::Result<()> {
        let child_world = self.world_matrix(child_id);
        let parent_world = self.world_matrix(parent_id);

        self.set_object_parent(child_id, Some(parent_id))?;

        let local = parent_world.inverse() * child_world;
        self.objects[child_id].transform.set_from_matrix(local);
        self.invalidate_object_hierarchy(child_id);

        Ok(())
    }

    pub fn set_object_translation(&mut self, object_id: ObjectId, translation: Vec3) {
        if let Some(object) = self.objects.get_mut(object_id) {
            object.transform.set_translation(translation);
        }
        self.invalidate_object_hierarchy(object_id);
    }

    pub fn set_object_rotation(&mut self, object_id: ObjectId, rotation: Quat) {
        if let Some(object) = self.objects.get_mut(object_id) {
            object.transform.set_rotation(rotation);
        }
        self.invalidate_object_hierarchy(object_id);
    }

    pub fn translate_object_on_axis(&mut self, object_id: ObjectId, axis: Vec3, distance: f32) {
        if let Some(object) = self.objects.get_mut(object_id) {
            object.transform.translate_on_axis(axis, distance);
        }
        self.invalidate_object_hierarchy(object_id);
    }

    pub fn rotate_object(&mut self, object_id: ObjectId, rotation: Quat) {
        if let Some(object) = self.objects.get_mut(object_id) {
            object.transform.rotate(rotation);
        }
        self.invalidate_object_hierarchy(object_id);
    }

    pub fn get_object_transform(&self, object_id: ObjectId) -> Option<&Transform> {
        self.objects.get(object_id).map(|object| &object.transform)
    }

    pub fn early_update(&mut self) {
        for (_, object) in self.objects.iter() {
            object.transform.reset_flags();
        }
    }

    pub fn late_update(&mut self) {
        self.update_transforms();
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::{FRAC_PI_2, PI};

    use super::*;

    fn assert_close(a: Vec3, b: Vec3) {
        assert!((a - b).length() < 1e-4, "{a:?} != {b:?}");
    }

    #[test]
    fn attach_keeps_world_position() {
        let mut scene = Scene::new();

        let mut door = Object3D::new("door");
        door.transform.set_translation(Vec3::new(1.0, 2.0, 0.0));
        door.transform.set_rotation(Quat::from_rotation_y(FRAC_PI_2));
        let door = scene.add_object(door);

        let mut handle = Object3D::new("handle");
        handle.transform.set_translation(Vec3::new(1.5, 2.0, 0.3));
        let handle = scene.add_object(handle);

        let before = scene.world_matrix(handle).transform_point3(Vec3::ZERO);
        scene.attach(door, handle).unwrap();
        let after = scene.world_matrix(handle).transform_point3(Vec3::ZERO);

        assert_close(before, after);
        assert_eq!(scene.objects[handle].parent_id, Some(door));
        assert_eq!(scene.objects[door].child_ids, vec![handle]);
    }

    #[test]
    fn set_parent_keeps_local_transform() {
        let mut scene = Scene::new();
        let mut pivot = Object3D::new("pivot");
        pivot.transform.set_translation(Vec3::X);
        let pivot = scene.add_object(pivot);

        let mut door = Object3D::new("door");
        door.transform.set_translation(Vec3::Y);
        let door = scene.add_object(door);

        scene.set_object_parent(door, Some(pivot)).unwrap();

        assert_eq!(scene.objects[door].transform.translation(), Vec3::Y);
        assert_close(
            scene.world_matrix(door).transform_point3(Vec3::ZERO),
            Vec3::new(1.0, 1.0, 0.0),
        );
    }

    #[test]
    fn reparenting_removes_from_old_parent() {
        let mut scene = Scene::new();
        let a = scene.add_object(Object3D::new("a"));
        let b = scene.add_object(Object3D::new("b"));
        let child = scene.add_child(a, Object3D::new("child")).unwrap();

        scene.set_object_parent(child, Some(b)).unwrap();

        assert!(scene.objects[a].child_ids.is_empty());
        assert_eq!(scene.objects[b].child_ids, vec![child]);
    }

    #[test]
    fn refuses_cycles() {
        let mut scene = Scene::new();
        let root = scene.add_object(Object3D::new("root"));
        let child = scene.add_child(root, Object3D::new("child")).unwrap();

        assert!(scene.set_object_parent(root, Some(child)).is_err());
        assert!(scene.set_object_parent(root, Some(root)).is_err());
    }

    #[test]
    fn name_lookup_is_depth_first_and_scoped() {
        let mut scene = Scene::new();
        let outside = scene.add_object(Object3D::new("handle"));
        let root = scene.add_object(Object3D::new("root"));
        let body = scene.add_child(root, Object3D::new("body")).unwrap();
        let nested = scene.add_child(body, Object3D::new("handle")).unwrap();

        assert_eq!(scene.get_object_by_name("handle"), Some(outside));
        assert_eq!(scene.find_descendant_by_name(root, "handle"), Some(nested));
        assert_eq!(scene.find_descendant_by_name(root, "root"), Some(root));
        assert_eq!(scene.find_descendant_by_name(root, "missing"), None);
        assert_eq!(scene.descendants(root), vec![root, body, nested]);
    }

    #[test]
    fn late_update_propagates_world_matrices() {
        let mut scene = Scene::new();
        let mut group = Object3D::new("group");
        group.transform.set_rotation(Quat::from_rotation_y(PI));
        let group = scene.add_object(group);

        let mut child = Object3D::new("child");
        child.transform.set_translation(Vec3::Z);
        let child = scene.add_child(group, child).unwrap();

        scene.late_update();
        let cached = *scene.objects[child].transform.get_world_matrix();
        assert_close(cached.transform_point3(Vec3::ZERO), Vec3::NEG_Z);

        scene.rotate_object(group, Quat::from_rotation_y(FRAC_PI_2));
        scene.late_update();
        let cached = *scene.objects[child].transform.get_world_matrix();
        assert_close(cached.transform_point3(Vec3::ZERO), Vec3::NEG_X);
    }

    /// A triangle (positions, normals, u16 indices) in one buffer.
    fn triangle_buffer() -> Vec<gltf::buffer::Data> {
        let floats: [f32; 18] = [
            0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, // positions
            0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, // normals
        ];
        let mut bytes = bytemuck::cast_slice::<f32, u8>(&floats).to_vec();
        bytes.extend(bytemuck::cast_slice::<u16, u8>(&[0, 1, 2, 0]));
        vec![gltf::buffer::Data(bytes)]
    }

    /// `meshes` is spliced into an otherwise fixed document.
    fn gltf_document(meshes: &str) -> gltf::Document {
        let json = format!(
            r#"{{
                "asset": {{ "version": "2.0" }},
                "buffers": [{{ "byteLength": 80 }}],
                "bufferViews": [
                    {{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }},
                    {{ "buffer": 0, "byteOffset": 36, "byteLength": 36 }},
                    {{ "buffer": 0, "byteOffset": 72, "byteLength": 6 }}
                ],
                "accessors": [
                    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                       "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] }},
                    {{ "bufferView": 1, "componentType": 5126, "count": 3, "type": "VEC3" }},
                    {{ "bufferView": 2, "componentType": 5123, "count": 3, "type": "SCALAR" }}
                ],
                "materials": [{{
                    "name": "paint",
                    "pbrMetallicRoughness": {{
                        "baseColorFactor": [0.5, 0.25, 1.0, 0.5],
                        "metallicFactor": 0.3,
                        "roughnessFactor": 0.7
                    }}
                }}],
                "meshes": {meshes},
                "nodes": [
                    {{ "name": "door", "mesh": 0, "children": [1],
                       "translation": [1.0, 2.0, 3.0],
                       "rotation": [0.0, 0.70710677, 0.0, 0.70710677],
                       "scale": [2.0, 2.0, 2.0] }},
                    {{ "name": "door_copy", "mesh": 0 }},
                    {{ "name": "plain", "mesh": 1 }}
                ],
                "scenes": [{{ "name": "Showroom", "nodes": [0, 2] }}],
                "scene": 0
            }}"#
        );

        gltf::Gltf::from_slice(json.as_bytes()).unwrap().document
    }

    const MESHES: &str = r#"[
        { "name": "door_mesh", "primitives": [
            { "attributes": { "POSITION": 0, "NORMAL": 1 }, "indices": 2, "material": 0 }
        ] },
        { "name": "plain_mesh", "primitives": [
            { "attributes": { "POSITION": 0, "NORMAL": 1 } }
        ] }
    ]"#;

    #[test]
    fn gltf_scene_shares_models_and_materials() {
        let mut scene = Scene::new();
        let parent = scene.add_object(Object3D::new("showroom"));
        let document = gltf_document(MESHES);
        let buffers = triangle_buffer();

        let group = scene
            .spawn_gltf_scene("fridge.gltf", &document, &buffers, &[], Some(parent))
            .unwrap();

        assert_eq!(scene.objects[group].name, "Showroom");
        assert_eq!(scene.objects[group].parent_id, Some(parent));

        let door = scene.find_descendant_by_name(group, "door").unwrap();
        let copy = scene.find_descendant_by_name(group, "door_copy").unwrap();
        let plain = scene.find_descendant_by_name(group, "plain").unwrap();
        assert_eq!(scene.objects[copy].parent_id, Some(door));
        assert_eq!(scene.objects[plain].parent_id, Some(group));

        // One model per glTF mesh, reused by every node that references it
        assert_eq!(scene.models.len(), 2);
        assert_eq!(scene.objects[door].model_id, scene.objects[copy].model_id);
        assert_ne!(scene.objects[door].model_id, scene.objects[plain].model_id);
        let door_model = scene.get_model(scene.objects[door].model_id.unwrap()).unwrap();
        assert_eq!(door_model.model.name, "door_mesh");
        assert_eq!(door_model.model.primitives[0].indices, vec![0, 1, 2]);

        // One material per glTF material, plus the default one
        let paint = scene.materials.get_gltf_material("fridge.gltf", Some(0)).unwrap();
        let default = scene.materials.get_gltf_material("fridge.gltf", None).unwrap();
        assert_eq!(scene.objects[door].material_ids, vec![paint]);
        assert_eq!(scene.objects[copy].material_ids, vec![paint]);
        assert_eq!(scene.objects[plain].material_ids, vec![default]);
        assert_eq!(scene.materials.materials().count(), 2);

        let paint = scene.materials.get(paint).unwrap();
        assert_eq!(paint.name, "paint");
        assert_eq!(paint.color, Vec3::new(0.5, 0.25, 1.0));
        assert_eq!(paint.opacity, 0.5);
        assert_eq!((paint.metalness, paint.roughness), (0.3, 0.7));
        assert_eq!(scene.materials.get(default).unwrap().name, "Default material");

        // Node TRS is decomposed into the local transform
        let transform = &scene.objects[door].transform;
        assert_eq!(transform.translation(), Vec3::new(1.0, 2.0, 3.0));
        assert!(transform.rotation().angle_between(Quat::from_rotation_y(FRAC_PI_2)) < 1e-4);
        assert_close(
            transform.get_local_matrix().transform_vector3(Vec3::Z),
            Vec3::new(2.0, 0.0, 0.0),
        );
    }

    #[test]
    fn gltf_mesh_without_normals_is_an_error() {
        let mut scene = Scene::new();
        let document = gltf_document(
            r#"[
                { "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 2 }] },
                { "primitives": [{ "attributes": { "POSITION": 0, "NORMAL": 1 } }] }
            ]"#,
        );

        let error = scene
            .spawn_gltf_scene("fridge.gltf", &document, &triangle_buffer(), &[], None)
            .err()
            .unwrap();
        assert!(format!("{:?}", error).contains("no normals"));
    }

    #[test]
    fn gltf_line_primitives_are_rejected() {
        let mut scene = Scene::new();
        let document = gltf_document(
            r#"[
                { "name": "wire", "primitives": [
                    { "attributes": { "POSITION": 0, "NORMAL": 1 }, "mode": 1 }
                ] },
                { "primitives": [{ "attributes": { "POSITION": 0, "NORMAL": 1 } }] }
            ]"#,
        );

        let error = scene
            .spawn_gltf_scene("fridge.gltf", &document, &triangle_buffer(), &[], None)
            .err()
            .unwrap();
        assert!(format!("{:?}", error).contains("Unsupported primitive mode"));
    }

    #[test]
    fn hidden_parent_hides_children() {
        let mut scene = Scene::new();
        let group = scene.add_object(Object3D::new("group"));
        let child = scene.add_child(group, Object3D::new("child")).unwrap();

        assert!(scene.is_visible(child));
        scene.objects[group].visible = false;
        assert!(!scene.is_visible(child));
    }
}
