use crate::rendering::render_common::Resolution;

pub struct Texture {
    _texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    pub(crate) sampler: wgpu::Sampler,
}

impl Texture {
    pub fn from_wgpu_texture(
        texture: wgpu::Texture,
        device: &wgpu::Device,
        compare: Option<wgpu::CompareFunction>,
    ) -> Self {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            compare,
            lod_min_clamp: 0.0,
            lod_max_clamp: 100.0,
            ..Default::default()
        });

        Self {
            _texture: texture,
            view,
            sampler,
        }
    }
}

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32, label: &str) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    })
}

/// Screen-sized depth buffer. Follows the surface size.
pub struct DepthTexture {
    texture: Texture,
    label: String,
}

impl DepthTexture {
    pub fn new(device: &wgpu::Device, size: Resolution, label: impl Into<String>) -> Self {
        let label: String = label.into();
        let texture = create_depth_texture(device, size.width, size.height, &label);

        DepthTexture {
            texture: Texture::from_wgpu_texture(texture, device, None),
            label,
        }
    }

    pub fn resize(&mut self, device: &wgpu::Device, size: Resolution) {
        let texture = create_depth_texture(device, size.width, size.height, &self.label);
        self.texture = Texture::from_wgpu_texture(texture, device, None);
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.texture.view
    }
}

/// Square depth map rendered from the shadow-casting light, sampled with a comparison sampler.
pub struct ShadowMap {
    texture: Texture,
    pub size: u32,
}

impl ShadowMap {
    pub fn new(device: &wgpu::Device, size: u32) -> Self {
        let texture = create_depth_texture(device, size, size, "Shadow map");

        Self {
            texture: Texture::from_wgpu_texture(
                texture,
                device,
                Some(wgpu::CompareFunction::LessEqual),
            ),
            size: size.max(1),
        }
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.texture.view
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.texture.sampler
    }
}
