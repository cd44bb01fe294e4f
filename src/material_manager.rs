use std::collections::HashMap;

use anyhow::bail;
use glam::Vec3;
use id_arena::{Arena, Id};

/// RGBA8 pixels, row-major.
#[derive(Debug, Clone)]
pub struct TextureData {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

pub type TextureId = Id<TextureData>;

/// Metal/roughness material. Colors are linear.
#[derive(Debug, Clone)]
pub struct StandardMaterial {
    pub name: String,
    pub color: Vec3,
    pub opacity: f32,
    pub base_color_texture: Option<TextureId>,
    pub roughness: f32,
    pub metalness: f32,
    /// Reflect the scene environment map
    pub use_env_map: bool,
    pub env_map_intensity: f32,
    pub tone_mapped: bool,
}

impl Default for StandardMaterial {
    fn default() -> Self {
        Self {
            name: String::new(),
            color: Vec3::ONE,
            opacity: 1.0,
            base_color_texture: None,
            roughness: 1.0,
            metalness: 0.0,
            use_env_map: false,
            env_map_intensity: 1.0,
            tone_mapped: true,
        }
    }
}

pub type MaterialId = Id<StandardMaterial>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GltfMaterialKey {
    pub file_name: String,
    pub material_index: Option<usize>,
}

pub struct MaterialManager {
    materials: Arena<StandardMaterial>,
    textures: Arena<TextureData>,
    materials_by_gltf: HashMap<GltfMaterialKey, MaterialId>,
}

impl Default for MaterialManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MaterialManager {
    pub fn new() -> Self {
        Self {
            materials: Arena::new(),
            textures: Arena::new(),
            materials_by_gltf: HashMap::new(),
        }
    }

    pub fn add_material(&mut self, material: StandardMaterial) -> MaterialId {
        self.materials.alloc(material)
    }

    /// Copies a material into a new slot. Textures stay shared.
    pub fn clone_material(&mut self, id: MaterialId) -> Option<MaterialId> {
        let material = self.materials.get(id)?.clone();
        Some(self.materials.alloc(material))
    }

    pub fn get(&self, id: MaterialId) -> Option<&StandardMaterial> {
        self.materials.get(id)
    }

    pub fn get_mut(&mut self, id: MaterialId) -> Option<&mut StandardMaterial> {
        self.materials.get_mut(id)
    }

    pub fn materials(&self) -> impl Iterator<Item = (MaterialId, &StandardMaterial)> {
        self.materials.iter()
    }

    pub fn add_texture(&mut self, texture: TextureData) -> TextureId {
        self.textures.alloc(texture)
    }

    pub fn texture(&self, id: TextureId) -> Option<&TextureData> {
        self.textures.get(id)
    }

    /// Material for a glTF primitive. `None` is glTF's default material.
    pub fn get_gltf_material(
        &self,
        file_name: &str,
        material_index: Option<usize>,
    ) -> Option<MaterialId> {
        let key = GltfMaterialKey {
            file_name: file_name.to_string(),
            material_index,
        };
        self.materials_by_gltf.get(&key).copied()
    }

    pub fn load_all_materials_from_gltf(
        &mut self,
        file_name: &str,
        document: &gltf::Document,
        images: &[gltf::image::Data],
    ) -> anyhow::Result<()> {
        let mut textures_by_image = HashMap::new();

        let default_key = GltfMaterialKey {
            file_name: file_name.to_string(),
            material_index: None,
        };
        if !self.materials_by_gltf.contains_key(&default_key) {
            let id = self.add_material(StandardMaterial {
                name: "Default material".to_string(),
                ..Default::default()
            });
            self.materials_by_gltf.insert(default_key, id);
        }

        for material in document.materials() {
            let key = GltfMaterialKey {
                file_name: file_name.to_string(),
                material_index: material.index(),
            };

            if self.materials_by_gltf.contains_key(&key) {
                continue;
            }

            let material_name = material.name().unwrap_or("Unnamed material");
            let pbr = material.pbr_metallic_roughness();
            let [r, g, b, a] = pbr.base_color_factor();

            let base_color_texture = match pbr.base_color_texture() {
                Some(info) => {
                    let image_index = info.texture().source().index();
                    let texture_id = match textures_by_image.get(&image_index) {
                        Some(id) => *id,
                        None => {
                            let Some(image) = images.get(image_index) else {
                                bail!(
                                    "glTF image index {} out of bounds in material {}",
                                    image_index,
                                    material_name
                                );
                            };
                            let texture = convert_image_data_to_rgba(
                                format!("{material_name} (base color)"),
                                image,
                            )?;
                            let id = self.add_texture(texture);
                            textures_by_image.insert(image_index, id);
                            id
                        }
                    };
                    Some(texture_id)
                }
                None => None,
            };

            let id = self.add_material(StandardMaterial {
                name: material_name.to_string(),
                // glTF color factors are already linear
                color: Vec3::new(r, g, b),
                opacity: a,
                base_color_texture,
                roughness: pbr.roughness_factor(),
                metalness: pbr.metallic_factor(),
                ..Default::default()
            });

            self.materials_by_gltf.insert(key, id);
        }

        Ok(())
    }
}

fn convert_image_data_to_rgba(
    name: String,
    data: &gltf::image::Data,
) -> anyhow::Result<TextureData> {
    use gltf::image::Format;

    let channels = match data.format {
        Format::R8G8B8A8 => 4,
        Format::R8G8B8 => 3,
        Format::R8G8 => 2,
        Format::R8 => 1,
        other => bail!("Unsupported image format {:?} in {}", other, name),
    };

    let expected = data.width as usize * data.height as usize * channels;
    if data.pixels.len() != expected {
        bail!(
            "Image {} has {} bytes, expected {} for {}x{}",
            name,
            data.pixels.len(),
            expected,
            data.width,
            data.height
        );
    }

    let pixels = match data.format {
        Format::R8G8B8 => data
            .pixels
            .chunks_exact(3)
            .flat_map(|pixel| [pixel[0], pixel[1], pixel[2], 255])
            .collect(),
        Format::R8G8 => data
            .pixels
            .chunks_exact(2)
            .flat_map(|pixel| [pixel[0], pixel[1], 0, 255])
            .collect(),
        Format::R8 => data
            .pixels
            .iter()
            .flat_map(|&value| [value, value, value, 255])
            .collect(),
        _ => data.pixels.clone(),
    };

    Ok(TextureData {
        name,
        width: data.width,
        height: data.height,
        pixels,
    })
}
