use bytemuck::{Pod, Zeroable};
use wgpu::{
    util::DeviceExt, Device, MultisampleState, PipelineCompilationOptions, RenderPassDescriptor,
    ShaderSource,
};

use crate::{
    loading::LoadingBar,
    rendering::{
        render_common::{RenderCommon, Resolution},
        shader_loader::{PipelineCache, PipelineCacheBuilder, PipelineId, ShaderDefinition},
    },
};

const OVERLAY_SHADER: ShaderDefinition = ShaderDefinition {
    name: "Loading overlay",
    path: "overlay.wgsl",
};

const BAR_HEIGHT_PX: f32 = 2.0;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct OverlayUniformState {
    /// alpha, bar start, bar end, bar height in pixels
    pub params: [f32; 4],
    pub resolution: [f32; 4],
}

impl OverlayUniformState {
    pub fn new(alpha: f32, bar: LoadingBar, resolution: Resolution) -> Self {
        Self {
            params: [alpha, bar.start, bar.end, BAR_HEIGHT_PX],
            resolution: [
                resolution.width as f32,
                resolution.height as f32,
                0.0,
                0.0,
            ],
        }
    }

    /// Nothing left to draw once the overlay is transparent and the bar is gone.
    pub fn is_visible(&self) -> bool {
        self.params[0] > 0.0 || self.params[2] > self.params[1]
    }
}

/// Black fade-in curtain with the loading bar on top of the scene.
pub struct OverlayPass {
    pipeline_id: PipelineId,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl OverlayPass {
    pub fn create(
        device: &wgpu::Device,
        common: &RenderCommon,
        cache_builder: &mut PipelineCacheBuilder,
    ) -> anyhow::Result<Self> {
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Overlay uniform buffer"),
            contents: bytemuck::cast_slice(&[OverlayUniformState::zeroed()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Overlay bind group layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Overlay bind group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let render_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Overlay pipeline layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

        let format = common.surface_format();

        let pipeline_id = cache_builder.add_shader(
            OVERLAY_SHADER,
            Box::new(
                move |device: &Device, shader_def: &ShaderDefinition, source: &str| {
                    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                        label: Some(shader_def.name),
                        source: ShaderSource::Wgsl(source.into()),
                    });

                    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                        label: Some("Overlay pipeline"),
                        layout: Some(&render_pipeline_layout),
                        vertex: wgpu::VertexState {
                            module: &shader,
                            entry_point: Some("vs_main"),
                            buffers: &[],
                            compilation_options: PipelineCompilationOptions::default(),
                        },
                        fragment: Some(wgpu::FragmentState {
                            module: &shader,
                            entry_point: Some("fs_main"),
                            targets: &[Some(wgpu::ColorTargetState {
                                format,
                                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                                write_mask: wgpu::ColorWrites::ALL,
                            })],
                            compilation_options: PipelineCompilationOptions::default(),
                        }),
                        primitive: wgpu::PrimitiveState::default(),
                        depth_stencil: None,
                        multisample: MultisampleState::default(),
                        multiview: None,
                        cache: None,
                    });

                    Ok(pipeline)
                },
            ),
        );

        Ok(Self {
            pipeline_id,
            uniform_buffer,
            bind_group,
        })
    }

    pub fn render(
        &self,
        color: &wgpu::TextureView,
        state: OverlayUniformState,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        pipeline_cache: &PipelineCache,
    ) {
        if !state.is_visible() {
            return;
        }

        let Some(pipeline) = pipeline_cache.get(self.pipeline_id) else {
            return;
        };

        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[state]));

        let mut render_pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("Overlay Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, &self.bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }
}
