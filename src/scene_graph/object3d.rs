use id_arena::Id;

use crate::material_manager::MaterialId;
use crate::scene_graph::scene_model::SceneModelId;
use crate::scene_graph::transform::Transform;

pub type ObjectId = Id<Object3D>;

/// A scene graph node. Groups and pivots are nodes without a model.
#[derive(Default)]
pub struct Object3D {
    pub name: String,
    pub transform: Transform,
    pub model_id: Option<SceneModelId>,
    /// One material per model primitive
    pub material_ids: Vec<MaterialId>,
    pub parent_id: Option<ObjectId>,
    pub child_ids: Vec<ObjectId>,
    pub visible: bool,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

impl Object3D {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visible: true,
            ..Default::default()
        }
    }

    /// Replaces the material of every primitive.
    pub fn set_material(&mut self, material_id: MaterialId) {
        for id in &mut self.material_ids {
            *id = material_id;
        }
    }

    /// The first primitive's material, if this node has a mesh.
    pub fn material(&self) -> Option<MaterialId> {
        self.material_ids.first().copied()
    }
}
