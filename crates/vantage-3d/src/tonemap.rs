use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use wgpu::util::DeviceExt;
use wgpu::*;

/// Offscreen scene target format; tone mapping reads it and writes the surface.
pub const HDR_FORMAT: TextureFormat = TextureFormat::Rgba16Float;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToneMapping {
    None,
    Linear,
    #[default]
    AcesFilmic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputEncoding {
    Linear,
    #[default]
    Srgb,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    pub tone_mapping: ToneMapping,
    pub exposure: f32,
    pub output_encoding: OutputEncoding,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            tone_mapping: ToneMapping::AcesFilmic,
            exposure: 1.0,
            output_encoding: OutputEncoding::Srgb,
        }
    }
}

impl RenderSettings {
    /// Picks the surface format matching the output encoding, falling back to
    /// the first supported one.
    pub fn pick_surface_format(&self, supported: &[TextureFormat]) -> Option<TextureFormat> {
        let want_srgb = self.output_encoding == OutputEncoding::Srgb;
        supported
            .iter()
            .copied()
            .find(|f| f.is_srgb() == want_srgb)
            .or_else(|| supported.first().copied())
    }

    /// Whether the tone-mapping shader has to apply the sRGB curve itself
    /// because the surface will not.
    pub fn encode_in_shader(&self, surface_format: TextureFormat) -> bool {
        self.output_encoding == OutputEncoding::Srgb && !surface_format.is_srgb()
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ToneUniform {
    // mode, exposure, encode_srgb, unused
    params: [f32; 4],
}

pub struct ToneMapPass {
    pipeline: RenderPipeline,
    bgl: BindGroupLayout,
    bind_group: BindGroup,
    uniform: Buffer,
}

impl ToneMapPass {
    pub fn new(
        device: &Device,
        surface_format: TextureFormat,
        hdr_view: &TextureView,
        settings: &RenderSettings,
    ) -> Self {
        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("tonemap_shader"),
            source: ShaderSource::Wgsl(include_str!("shaders/tonemap.wgsl").into()),
        });

        let bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("tonemap_bgl"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        multisampled: false,
                        view_dimension: TextureViewDimension::D2,
                        sample_type: TextureSampleType::Float { filterable: false },
                    },
                    count: None,
                },
            ],
        });

        let uniform = device.create_buffer_init(&util::BufferInitDescriptor {
            label: Some("tonemap_ubo"),
            contents: bytemuck::bytes_of(&tone_uniform(settings, surface_format)),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        });

        let layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("tonemap_pipeline_layout"),
            bind_group_layouts: &[&bgl],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("tonemap_pipeline"),
            layout: Some(&layout),
            vertex: VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(ColorTargetState {
                    format: surface_format,
                    blend: None,
                    write_mask: ColorWrites::ALL,
                })],
            }),
            primitive: PrimitiveState::default(),
            depth_stencil: None,
            multisample: MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let bind_group = create_bind_group(device, &bgl, &uniform, hdr_view);

        Self {
            pipeline,
            bgl,
            bind_group,
            uniform,
        }
    }

    /// Rebinds the HDR target after it was recreated.
    pub fn rebind(&mut self, device: &Device, hdr_view: &TextureView) {
        self.bind_group = create_bind_group(device, &self.bgl, &self.uniform, hdr_view);
    }

    pub fn render(&self, encoder: &mut CommandEncoder, target_view: &TextureView) {
        let mut r_pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("tonemap_pass"),
            color_attachments: &[Some(RenderPassColorAttachment {
                view: target_view,
                depth_slice: None,
                resolve_target: None,
                ops: Operations {
                    load: LoadOp::Clear(Color::BLACK),
                    store: StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        r_pass.set_pipeline(&self.pipeline);
        r_pass.set_bind_group(0, &self.bind_group, &[]);
        r_pass.draw(0..3, 0..1);
    }
}

fn tone_uniform(settings: &RenderSettings, surface_format: TextureFormat) -> ToneUniform {
    let mode = match settings.tone_mapping {
        ToneMapping::None => 0.0,
        ToneMapping::Linear => 1.0,
        ToneMapping::AcesFilmic => 2.0,
    };
    let encode = if settings.encode_in_shader(surface_format) { 1.0 } else { 0.0 };
    ToneUniform {
        params: [mode, settings.exposure, encode, 0.0],
    }
}

fn create_bind_group(
    device: &Device,
    bgl: &BindGroupLayout,
    uniform: &Buffer,
    hdr_view: &TextureView,
) -> BindGroup {
    device.create_bind_group(&BindGroupDescriptor {
        label: Some("tonemap_bg"),
        layout: bgl,
        entries: &[
            BindGroupEntry {
                binding: 0,
                resource: uniform.as_entire_binding(),
            },
            BindGroupEntry {
                binding: 1,
                resource: BindingResource::TextureView(hdr_view),
            },
        ],
    })
}

/// Clear value for the HDR target. Alpha 0 marks background texels so the
/// tone-mapping pass leaves them untouched.
pub fn background_clear(linear: Vec3) -> Color {
    Color {
        r: linear.x as f64,
        g: linear.y as f64,
        b: linear.z as f64,
        a: 0.0,
    }
}
