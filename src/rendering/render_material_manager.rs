use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use wgpu::{util::DeviceExt, TexelCopyBufferLayout, TexelCopyTextureInfo};

use crate::material_manager::{
    MaterialId, MaterialManager, StandardMaterial, TextureData, TextureId,
};

/// Layout matches `MaterialUniform` in `pbr.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct MaterialUniformState {
    /// Linear rgb, opacity
    pub color: [f32; 4],
    /// roughness, metalness, environment intensity, uses environment
    pub surface: [f32; 4],
    /// tone mapped, has base color texture
    pub flags: [f32; 4],
}

fn flag(value: bool) -> f32 {
    if value {
        1.0
    } else {
        0.0
    }
}

impl MaterialUniformState {
    pub fn from_material(material: &StandardMaterial) -> Self {
        Self {
            color: material.color.extend(material.opacity).to_array(),
            surface: [
                material.roughness.clamp(0.04, 1.0),
                material.metalness.clamp(0.0, 1.0),
                material.env_map_intensity,
                flag(material.use_env_map),
            ],
            flags: [
                flag(material.tone_mapped),
                flag(material.base_color_texture.is_some()),
                0.0,
                0.0,
            ],
        }
    }
}

struct RenderMaterial {
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    last_state: MaterialUniformState,
}

/// GPU side of [`MaterialManager`]. Materials and textures are uploaded the
/// first time they are drawn; uniforms follow later edits to the material.
pub struct RenderMaterialManager {
    textures: HashMap<TextureId, wgpu::TextureView>,
    materials: HashMap<MaterialId, RenderMaterial>,
    default_texture: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

impl RenderMaterialManager {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Material sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            lod_min_clamp: 0.0,
            lod_max_clamp: 32.0,
            compare: None,
            anisotropy_clamp: 1,
            border_color: None,
        });

        Self {
            textures: HashMap::new(),
            materials: HashMap::new(),
            default_texture: create_white_texture(device, queue),
            sampler,
        }
    }

    /// Uploads anything new and refreshes changed uniforms.
    pub fn sync(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        material_manager: &MaterialManager,
    ) {
        for (id, material) in material_manager.materials() {
            let state = MaterialUniformState::from_material(material);

            if let Some(render_material) = self.materials.get_mut(&id) {
                if render_material.last_state != state {
                    queue.write_buffer(
                        &render_material.uniform_buffer,
                        0,
                        bytemuck::cast_slice(&[state]),
                    );
                    render_material.last_state = state;
                }
                continue;
            }

            if let Some(texture_id) = material.base_color_texture {
                if !self.textures.contains_key(&texture_id) {
                    if let Some(data) = material_manager.texture(texture_id) {
                        let view = create_texture(device, queue, data);
                        self.textures.insert(texture_id, view);
                    }
                }
            }

            let texture_view = material
                .base_color_texture
                .and_then(|texture_id| self.textures.get(&texture_id))
                .unwrap_or(&self.default_texture);

            let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("Material uniform ({})", material.name)),
                contents: bytemuck::cast_slice(&[state]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });

            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("Material bind group ({})", material.name)),
                layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(texture_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            });

            log::debug!("Uploaded material {}", material.name);

            self.materials.insert(
                id,
                RenderMaterial {
                    uniform_buffer,
                    bind_group,
                    last_state: state,
                },
            );
        }
    }

    pub fn bind_group(&self, id: MaterialId) -> Option<&wgpu::BindGroup> {
        self.materials.get(&id).map(|material| &material.bind_group)
    }
}

fn create_texture(device: &wgpu::Device, queue: &wgpu::Queue, data: &TextureData) -> wgpu::TextureView {
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(&data.name),
            size: wgpu::Extent3d {
                width: data.width,
                height: data.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::wgt::TextureDataOrder::default(),
        &data.pixels,
    );

    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn create_white_texture(device: &wgpu::Device, queue: &wgpu::Queue) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Default base color"),
        size: wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    queue.write_texture(
        TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &[255, 255, 255, 255],
        TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4),
            rows_per_image: None,
        },
        wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
    );

    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    #[test]
    fn uniform_packs_material_settings() {
        let material = StandardMaterial {
            color: Vec3::new(0.5, 0.25, 1.0),
            opacity: 0.8,
            roughness: 0.2,
            metalness: 0.1,
            use_env_map: true,
            env_map_intensity: 0.5,
            tone_mapped: false,
            ..Default::default()
        };

        let state = MaterialUniformState::from_material(&material);
        assert_eq!(state.color, [0.5, 0.25, 1.0, 0.8]);
        assert_eq!(state.surface, [0.2, 0.1, 0.5, 1.0]);
        assert_eq!(state.flags, [0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn roughness_never_reaches_zero() {
        let material = StandardMaterial {
            roughness: 0.0,
            metalness: 2.0,
            ..Default::default()
        };

        let state = MaterialUniformState::from_material(&material);
        assert_eq!(state.surface[0], 0.04);
        assert_eq!(state.surface[1], 1.0);
        assert_eq!(state.flags[0], 1.0);
    }
}
