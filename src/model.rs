use std::mem::offset_of;

use anyhow::{anyhow, bail, Context};
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use gltf::buffer;
use itertools::izip;

use crate::math::bounds::AABB;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tex_coords: Vec2,
}

pub struct ModelPrimitive {
    pub index: usize,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub bounding_box: AABB,
    /// glTF material index, `None` for the default material
    pub material_index: Option<usize>,
}

impl ModelPrimitive {
    pub fn new(
        index: usize,
        vertices: Vec<Vertex>,
        indices: Vec<u32>,
        material_index: Option<usize>,
    ) -> anyhow::Result<Self> {
        let bounding_box = AABB::from_points(vertices.iter().map(|vertex| vertex.position))
            .ok_or_else(|| anyhow!("Primitive {} has no vertices", index))?;

        if indices.len() % 3 != 0 {
            bail!("Primitive {} index count is not a multiple of 3", index);
        }

        if let Some(out_of_range) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            bail!(
                "Primitive {} references vertex {} but has only {}",
                index,
                out_of_range,
                vertices.len()
            );
        }

        Ok(Self {
            index,
            vertices,
            indices,
            bounding_box,
            material_index,
        })
    }

    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).map(|triangle| {
            [
                self.vertices[triangle[0] as usize].position,
                self.vertices[triangle[1] as usize].position,
                self.vertices[triangle[2] as usize].position,
            ]
        })
    }
}

pub struct Model {
    pub name: String,
    pub primitives: Vec<ModelPrimitive>,
    pub bounding_box: AABB,
}

pub type Buffers<'a> = &'a [buffer::Data];

impl Model {
    pub fn new(name: impl Into<String>, primitives: Vec<ModelPrimitive>) -> anyhow::Result<Model> {
        let name = name.into();

        let bounding_box = primitives
            .iter()
            .map(|primitive| primitive.bounding_box)
            .reduce(|a, b| a.union(&b))
            .ok_or_else(|| anyhow!("Mesh without primitives: {}", name))?;

        Ok(Model {
            name,
            primitives,
            bounding_box,
        })
    }

    pub fn from_gltf(
        name: impl Into<String>,
        mesh: gltf::Mesh,
        buffers: Buffers,
    ) -> anyhow::Result<Model> {
        let name = name.into();
        let mut primitives = Vec::new();

        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                bail!(
                    "Unsupported primitive mode in {}: {:?}",
                    name,
                    primitive.mode()
                );
            }

            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

            let positions = reader
                .read_positions()
                .with_context(|| format!("Mesh {} has no positions", name))?
                .map(Vec3::from)
                .collect::<Vec<_>>();

            let normals = reader
                .read_normals()
                .with_context(|| format!("Mesh {} has no normals", name))?
                .map(Vec3::from);

            let tex_coords = match reader.read_tex_coords(0) {
                Some(tex_coords) => tex_coords.into_f32().map(Vec2::from).collect(),
                None => vec![Vec2::ZERO; positions.len()],
            };

            let vertices = izip!(positions.iter().copied(), normals, tex_coords)
                .map(|(position, normal, tex_coords)| Vertex {
                    position,
                    normal,
                    tex_coords,
                })
                .collect::<Vec<Vertex>>();

            let indices = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect::<Vec<u32>>(),
                None => (0..vertices.len() as u32).collect(),
            };

            primitives.push(ModelPrimitive::new(
                primitive.index(),
                vertices,
                indices,
                primitive.material().index(),
            )?);
        }

        Model::new(name, primitives)
    }

    /// A `width` x `height` quad in the XY plane facing +Z, centered on the origin.
    pub fn plane(name: impl Into<String>, width: f32, height: f32) -> anyhow::Result<Model> {
        let (hw, hh) = (width * 0.5, height * 0.5);

        let vertices = [
            (Vec3::new(-hw, hh, 0.0), Vec2::new(0.0, 0.0)),
            (Vec3::new(hw, hh, 0.0), Vec2::new(1.0, 0.0)),
            (Vec3::new(-hw, -hh, 0.0), Vec2::new(0.0, 1.0)),
            (Vec3::new(hw, -hh, 0.0), Vec2::new(1.0, 1.0)),
        ]
        .map(|(position, tex_coords)| Vertex {
            position,
            normal: Vec3::Z,
            tex_coords,
        });

        let primitive = ModelPrimitive::new(0, vertices.to_vec(), vec![0, 2, 1, 2, 3, 1], None)?;
        Model::new(name, vec![primitive])
    }
}

pub const RENDER_MODEL_VBL: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &[
        wgpu::VertexAttribute {
            offset: offset_of!(Vertex, position) as wgpu::BufferAddress,
            shader_location: 0,
            format: wgpu::VertexFormat::Float32x3,
        },
        wgpu::VertexAttribute {
            offset: offset_of!(Vertex, normal) as wgpu::BufferAddress,
            shader_location: 1,
            format: wgpu::VertexFormat::Float32x3,
        },
        wgpu::VertexAttribute {
            offset: offset_of!(Vertex, tex_coords) as wgpu::BufferAddress,
            shader_location: 2,
            format: wgpu::VertexFormat::Float32x2,
        },
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_faces_positive_z_with_counter_clockwise_winding() {
        let model = Model::plane("floor", 50.0, 50.0).unwrap();
        let primitive = &model.primitives[0];

        assert_eq!(model.bounding_box.min, Vec3::new(-25.0, -25.0, 0.0));
        assert_eq!(model.bounding_box.max, Vec3::new(25.0, 25.0, 0.0));

        for [a, b, c] in primitive.triangles() {
            let normal = (b - a).cross(c - a);
            assert!(normal.z > 0.0);
        }
    }

    #[test]
    fn rejects_out_of_range_indices() {
        let vertex = Vertex {
            position: Vec3::ZERO,
            normal: Vec3::Y,
            tex_coords: Vec2::ZERO,
        };

        assert!(ModelPrimitive::new(0, vec![vertex; 3], vec![0, 1, 3], None).is_err());
        assert!(ModelPrimitive::new(0, vec![vertex; 3], vec![0, 1], None).is_err());
        assert!(ModelPrimitive::new(0, Vec::new(), Vec::new(), None).is_err());
    }
}
