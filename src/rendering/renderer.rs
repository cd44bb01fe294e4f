use std::{collections::HashMap, sync::Arc};

use anyhow::Context;
use wgpu::CommandEncoderDescriptor;
use winit::window::Window;

use crate::{
    material_manager::MaterialId,
    rendering::{
        environment_map::RenderEnvironmentMap,
        imgui_renderer::ImguiRenderer,
        passes::{
            overlay_pass::{OverlayPass, OverlayUniformState},
            pbr_pass::{PbrPass, PbrTextureViews},
            shadow_pass::ShadowPass,
        },
        render_common::{RenderCommon, Resolution},
        render_material_manager::RenderMaterialManager,
        render_model::RenderModel,
        render_object::RenderObjects,
        scene_uniform::SceneUniformState,
        shader_loader::{PipelineCacheBuilder, ShaderLoader},
        texture::{DepthTexture, ShadowMap},
    },
    scene_graph::{ObjectId, Scene, SceneModelId},
    showroom::Showroom,
};

/// One primitive of one mesh node.
struct DrawItem {
    object: ObjectId,
    model: SceneModelId,
    primitive: usize,
    material: MaterialId,
    transparent: bool,
}

/// Visible primitives, opaque first.
fn gather_draw_items(scene: &Scene, shadow_casters_only: bool) -> Vec<DrawItem> {
    let mut items = Vec::new();

    for (id, object) in scene.objects.iter() {
        let Some(model_id) = object.model_id else {
            continue;
        };
        if shadow_casters_only && !object.cast_shadow {
            continue;
        }
        if !scene.is_visible(id) {
            continue;
        }
        let Some(scene_model) = scene.get_model(model_id) else {
            continue;
        };

        for primitive in 0..scene_model.model.primitives.len() {
            let Some(&material) = object
                .material_ids
                .get(primitive)
                .or_else(|| object.material_ids.first())
            else {
                continue;
            };

            let transparent = scene
                .materials
                .get(material)
                .is_some_and(|material| material.opacity < 1.0);

            items.push(DrawItem {
                object: id,
                model: model_id,
                primitive,
                material,
                transparent,
            });
        }
    }

    items.sort_by_key(|item| item.transparent);
    items
}

fn create_scene_bind_group(
    device: &wgpu::Device,
    common: &RenderCommon,
    environment_map: &RenderEnvironmentMap,
    shadow_map: &ShadowMap,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Scene bind group"),
        layout: &common.scene_bind_group_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: common.scene_uniform_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&environment_map.view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(&environment_map.sampler),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(shadow_map.view()),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: wgpu::BindingResource::Sampler(shadow_map.sampler()),
            },
        ],
    })
}

pub struct Renderer {
    pub window: Arc<Window>,
    pub size: Resolution,

    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,

    common: RenderCommon,
    depth_texture: DepthTexture,
    shadow_map: ShadowMap,
    environment_map: RenderEnvironmentMap,
    has_environment: bool,
    scene_bind_group: wgpu::BindGroup,

    render_models: HashMap<SceneModelId, RenderModel>,
    materials: RenderMaterialManager,
    objects: RenderObjects,

    shader_loader: ShaderLoader,

    shadow_pass: ShadowPass,
    pbr_pass: PbrPass,
    overlay_pass: OverlayPass,
    imgui_renderer: ImguiRenderer,
}

impl Renderer {
    pub async fn new(
        window: Arc<Window>,
        showroom: &Showroom,
        imgui_context: &mut imgui::Context,
    ) -> anyhow::Result<Renderer> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance
            .create_surface(window.clone())
            .context("Failed to create surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No suitable GPU adapter")?;

        log::info!("Using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                label: None,
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("Failed to create device")?;

        let config = &showroom.config;

        let common = RenderCommon::new(
            &device,
            &adapter,
            &surface,
            size,
            config.rendering.vsync,
            SceneUniformState::new(
                &showroom.camera,
                &showroom.lights,
                &showroom.fog,
                &config.rendering,
                false,
            ),
        )?;

        let depth_texture = DepthTexture::new(&device, size, "Depth Texture");
        let shadow_map_size = showroom
            .lights
            .shadow_caster()
            .and_then(|light| light.shadow.as_ref())
            .map_or(1, |shadow| shadow.map_size);
        let shadow_map = ShadowMap::new(&device, shadow_map_size);
        let environment_map = RenderEnvironmentMap::placeholder(&device, &queue);
        let scene_bind_group =
            create_scene_bind_group(&device, &common, &environment_map, &shadow_map);

        let mut cache_builder = PipelineCacheBuilder::new();

        let shadow_pass = ShadowPass::create(&device, &common, &mut cache_builder)?;
        let pbr_pass = PbrPass::create(&device, &common, &mut cache_builder)?;
        let overlay_pass = OverlayPass::create(&device, &common, &mut cache_builder)?;

        let shader_loader = ShaderLoader::new(device.clone(), &config.assets.shaders, cache_builder)
            .context("Failed to load shaders")?;

        let imgui_renderer =
            ImguiRenderer::new(&device, &queue, common.surface_format(), imgui_context);
        let materials = RenderMaterialManager::new(&device, &queue);

        Ok(Self {
            window,
            size,
            surface,
            device,
            queue,
            common,
            depth_texture,
            shadow_map,
            environment_map,
            has_environment: false,
            scene_bind_group,
            render_models: HashMap::new(),
            materials,
            objects: RenderObjects::new(),
            shader_loader,
            shadow_pass,
            pbr_pass,
            overlay_pass,
            imgui_renderer,
        })
    }

    pub fn resize(&mut self, new_size: Resolution) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }

        self.size = new_size;

        let config = {
            let Ok(mut config) = self.common.output_surface_config.write() else {
                log::error!("Surface configuration lock poisoned");
                return;
            };
            config.width = new_size.width;
            config.height = new_size.height;
            config.clone()
        };

        self.surface.configure(&self.device, &config);
        self.depth_texture.resize(&self.device, new_size);
    }

    /// Uploads whatever the showroom added since the last frame.
    fn sync_scene(&mut self, showroom: &mut Showroom) {
        if let Some(environment_map) = showroom.take_environment_map() {
            self.environment_map =
                RenderEnvironmentMap::from_environment_map(&self.device, &self.queue, &environment_map);
            self.scene_bind_group = create_scene_bind_group(
                &self.device,
                &self.common,
                &self.environment_map,
                &self.shadow_map,
            );
            self.has_environment = true;
        }

        let scene = &showroom.scene;

        for (id, scene_model) in scene.models.iter() {
            if self.render_models.contains_key(&id) {
                continue;
            }

            let render_model = RenderModel::from_model(&self.device, &scene_model.model);
            log::debug!(
                "Uploaded model {} with {} primitives",
                scene_model.model.name,
                render_model.primitives.len()
            );
            self.render_models.insert(id, render_model);
        }

        self.materials.sync(
            &self.device,
            &self.queue,
            &self.common.material_bind_group_layout,
            &scene.materials,
        );
        self.objects.sync(
            &self.device,
            &self.queue,
            &self.common.object_bind_group_layout,
            scene,
        );

        self.common.update_scene_uniform(
            &self.queue,
            SceneUniformState::new(
                &showroom.camera,
                &showroom.lights,
                &showroom.fog,
                &showroom.config.rendering,
                self.has_environment,
            ),
        );
    }

    pub fn render(
        &mut self,
        showroom: &mut Showroom,
        imgui_context: &mut imgui::Context,
    ) -> Result<(), wgpu::SurfaceError> {
        self.shader_loader.load_pending_shaders();
        self.sync_scene(showroom);

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        let pipeline_cache = &self.shader_loader.cache;
        let scene = &showroom.scene;

        if showroom.lights.shadow_caster().is_some() {
            let casters = gather_draw_items(scene, true);

            self.shadow_pass.render(
                &self.shadow_map,
                &mut encoder,
                pipeline_cache,
                |render_pass| {
                    for item in &casters {
                        let (Some(model), Some(object)) = (
                            self.render_models.get(&item.model),
                            self.objects.bind_group(item.object),
                        ) else {
                            continue;
                        };
                        let Some(primitive) = model.primitives.get(item.primitive) else {
                            continue;
                        };

                        render_pass.set_bind_group(1, object, &[]);
                        primitive.draw(render_pass);
                    }
                },
            );
        }

        let items = gather_draw_items(scene, false);

        self.pbr_pass.render(
            &PbrTextureViews {
                color: &view,
                depth: self.depth_texture.view(),
            },
            showroom.background,
            &self.scene_bind_group,
            &mut encoder,
            pipeline_cache,
            |render_pass| {
                for item in &items {
                    let (Some(model), Some(material), Some(object)) = (
                        self.render_models.get(&item.model),
                        self.materials.bind_group(item.material),
                        self.objects.bind_group(item.object),
                    ) else {
                        continue;
                    };
                    let Some(primitive) = model.primitives.get(item.primitive) else {
                        continue;
                    };

                    render_pass.set_bind_group(1, material, &[]);
                    render_pass.set_bind_group(2, object, &[]);
                    primitive.draw(render_pass);
                }
            },
        );

        self.overlay_pass.render(
            &view,
            OverlayUniformState::new(
                showroom.loading.overlay_alpha(),
                showroom.loading.loading_bar(),
                self.size,
            ),
            &self.queue,
            &mut encoder,
            pipeline_cache,
        );

        self.imgui_renderer.render(
            &view,
            imgui_context,
            &self.device,
            &self.queue,
            &mut encoder,
        );

        self.queue.submit([encoder.finish()]);
        output.present();

        Ok(())
    }
}
