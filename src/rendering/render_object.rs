use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::util::DeviceExt;

use crate::scene_graph::{Object3D, ObjectId, Scene};

/// Layout matches `ObjectUniform` in the WGSL shaders.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ObjectUniformState {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 4],
    /// receives shadows
    pub flags: [f32; 4],
}

impl ObjectUniformState {
    pub fn from_object(object: &Object3D) -> Self {
        Self::new(
            *object.transform.get_world_matrix(),
            *object.transform.get_normal_matrix(),
            object.receive_shadow,
        )
    }

    pub fn new(model: Mat4, normal: Mat4, receive_shadow: bool) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            normal: normal.to_cols_array_2d(),
            flags: [if receive_shadow { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
        }
    }
}

struct RenderObject {
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    receive_shadow: bool,
}

/// One uniform per mesh node, rewritten when its world transform changes.
pub struct RenderObjects {
    objects: HashMap<ObjectId, RenderObject>,
}

impl RenderObjects {
    pub fn new() -> Self {
        Self {
            objects: HashMap::new(),
        }
    }

    /// Call after the scene's late update.
    pub fn sync(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        scene: &Scene,
    ) {
        for (id, object) in scene.objects.iter() {
            if object.model_id.is_none() {
                continue;
            }

            let state = ObjectUniformState::from_object(object);

            match self.objects.get_mut(&id) {
                Some(render_object) => {
                    if object.transform.has_changed()
                        || render_object.receive_shadow != object.receive_shadow
                    {
                        queue.write_buffer(
                            &render_object.uniform_buffer,
                            0,
                            bytemuck::cast_slice(&[state]),
                        );
                        render_object.receive_shadow = object.receive_shadow;
                    }
                }
                None => {
                    let uniform_buffer =
                        device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                            label: Some(&format!("Object uniform ({})", object.name)),
                            contents: bytemuck::cast_slice(&[state]),
                            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                        });

                    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some(&format!("Object bind group ({})", object.name)),
                        layout,
                        entries: &[wgpu::BindGroupEntry {
                            binding: 0,
                            resource: uniform_buffer.as_entire_binding(),
                        }],
                    });

                    self.objects.insert(
                        id,
                        RenderObject {
                            uniform_buffer,
                            bind_group,
                            receive_shadow: object.receive_shadow,
                        },
                    );
                }
            }
        }
    }

    pub fn bind_group(&self, id: ObjectId) -> Option<&wgpu::BindGroup> {
        self.objects.get(&id).map(|object| &object.bind_group)
    }
}
