use std::collections::HashMap;

use wgpu::util::{DeviceExt, TextureDataOrder};

use crate::error::RenderError;
use crate::geometry::{quad_vertices, QuadVertex};
use crate::source::ImageData;

use super::context::GpuContext;

/// Draw slot for the image currently on screen.
pub(crate) const SLOT_CURRENT: usize = 0;
/// Draw slot for the full-screen masking quad used mid-fade.
pub(crate) const SLOT_OVERLAY: usize = 1;
/// Draw slot for the incoming image.
pub(crate) const SLOT_NEXT: usize = 2;

const SLOT_COUNT: usize = 3;

const QUAD_SHADER: &str = r#"
struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@location(0) position: vec2<f32>, @location(1) uv: vec2<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = vec4<f32>(position, 0.0, 1.0);
    out.uv = uv;
    return out;
}

struct FadeParams {
    alpha: vec4<f32>,
};

@group(0) @binding(0) var u_texture: texture_2d<f32>;
@group(0) @binding(1) var u_sampler: sampler;
@group(0) @binding(2) var<uniform> u_fade: FadeParams;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let color = textureSample(u_texture, u_sampler, in.uv);
    return vec4<f32>(color.rgb, color.a * u_fade.alpha.x);
}
"#;

/// A GPU-resident wallpaper texture plus the bind group that draws it.
///
/// Each texture carries its own alpha uniform so one frame can draw several
/// textures at different opacities without uniform writes clobbering each
/// other inside a submission.
pub(crate) struct GpuTexture {
    pub width: u32,
    pub height: u32,
    alpha_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    _texture: wgpu::Texture,
}

impl GpuTexture {
    pub(crate) fn set_alpha(&self, queue: &wgpu::Queue, alpha: f32) {
        let params = [alpha, 0.0, 0.0, 0.0];
        queue.write_buffer(&self.alpha_buffer, 0, bytemuck::cast_slice(&params));
    }

    pub(crate) fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// The one pipeline both backends draw with: a textured quad modulated by a
/// per-texture alpha, blended source-over onto an opaque black clear.
pub(crate) struct QuadPipeline {
    module: wgpu::ShaderModule,
    bind_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    slots: [wgpu::Buffer; SLOT_COUNT],
    pipelines: HashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
}

impl QuadPipeline {
    pub(crate) fn new(device: &wgpu::Device) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("quad shader"),
            source: wgpu::ShaderSource::Wgsl(QUAD_SHADER.into()),
        });

        let bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("quad bind layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("quad pipeline layout"),
            bind_group_layouts: &[&bind_layout],
            push_constant_ranges: &[],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("quad sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let slots = std::array::from_fn(|_| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("quad vertex slot"),
                size: (std::mem::size_of::<QuadVertex>() * 6) as u64,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });

        Self {
            module,
            bind_layout,
            pipeline_layout,
            sampler,
            slots,
            pipelines: HashMap::new(),
        }
    }

    /// Ensures a render pipeline targeting `format` exists.
    pub(crate) fn prepare(&mut self, device: &wgpu::Device, format: wgpu::TextureFormat) {
        if self.pipelines.contains_key(&format) {
            return;
        }

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("quad pipeline"),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &self.module,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<QuadVertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[
                        wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x2,
                            offset: 0,
                            shader_location: 0,
                        },
                        wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x2,
                            offset: 8,
                            shader_location: 1,
                        },
                    ],
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &self.module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState {
                        color: wgpu::BlendComponent {
                            src_factor: wgpu::BlendFactor::SrcAlpha,
                            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                            operation: wgpu::BlendOperation::Add,
                        },
                        alpha: wgpu::BlendComponent {
                            src_factor: wgpu::BlendFactor::One,
                            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                            operation: wgpu::BlendOperation::Add,
                        },
                    }),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });

        self.pipelines.insert(format, pipeline);
    }

    /// Uploads straight RGBA8 pixels and wires them into a bind group.
    pub(crate) fn upload(
        &self,
        gpu: &GpuContext,
        image: &ImageData,
        label: &str,
    ) -> Result<GpuTexture, RenderError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(RenderError::InvalidImage(format!(
                "{label}: zero-extent image"
            )));
        }
        self.upload_rgba8(gpu, image.width(), image.height(), image.pixels(), label)
    }

    /// A 2x2 solid texture; used for the opaque-black fallback and the
    /// masking overlay.
    pub(crate) fn solid(
        &self,
        gpu: &GpuContext,
        rgba: [u8; 4],
        label: &str,
    ) -> Result<GpuTexture, RenderError> {
        let pixels: Vec<u8> = rgba.iter().copied().cycle().take(2 * 2 * 4).collect();
        self.upload_rgba8(gpu, 2, 2, &pixels, label)
    }

    fn upload_rgba8(
        &self,
        gpu: &GpuContext,
        width: u32,
        height: u32,
        pixels: &[u8],
        label: &str,
    ) -> Result<GpuTexture, RenderError> {
        let texture = gpu.device.create_texture_with_data(
            &gpu.queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            TextureDataOrder::LayerMajor,
            pixels,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let alpha_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("quad alpha"),
                contents: bytemuck::cast_slice(&[1.0f32, 0.0, 0.0, 0.0]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });

        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.bind_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: alpha_buffer.as_entire_binding(),
                },
            ],
        });

        Ok(GpuTexture {
            width,
            height,
            alpha_buffer,
            bind_group,
            _texture: texture,
        })
    }

    /// Writes a slot's quad geometry for this frame.
    pub(crate) fn write_slot(&self, queue: &wgpu::Queue, slot: usize, hx: f32, hy: f32) {
        let vertices = quad_vertices(hx, hy);
        queue.write_buffer(&self.slots[slot], 0, bytemuck::cast_slice(&vertices));
    }

    /// Records one render pass: clear to opaque black, then draw each slot
    /// in order with its texture's bind group.
    pub(crate) fn encode<'a>(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        format: wgpu::TextureFormat,
        draws: impl IntoIterator<Item = (usize, &'a GpuTexture)>,
    ) {
        let pipeline = self
            .pipelines
            .get(&format)
            .expect("pipeline prepared for surface format");

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("quad pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        pass.set_pipeline(pipeline);
        for (slot, texture) in draws {
            pass.set_bind_group(0, &texture.bind_group, &[]);
            pass.set_vertex_buffer(0, self.slots[slot].slice(..));
            pass.draw(0..6, 0..1);
        }
    }
}
