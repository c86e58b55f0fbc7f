use crate::depth::DEPTH_FORMAT;
use crate::model::Vertex;
use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;
use wgpu::*;

/// Per-frame camera data, bind group 0.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    pub eye: [f32; 4],
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self {
            view_proj: glam::Mat4::IDENTITY.to_cols_array_2d(),
            eye: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

pub struct Layouts {
    pub camera_bgl: BindGroupLayout,
    pub model_bgl: BindGroupLayout,
    pub material_bgl: BindGroupLayout,
    pub environment_bgl: BindGroupLayout,
}

fn uniform_entry(binding: u32, visibility: ShaderStages) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility,
        ty: BindingType::Buffer {
            ty: BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_entry(binding: u32, filterable: bool) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::FRAGMENT,
        ty: BindingType::Texture {
            multisampled: false,
            view_dimension: TextureViewDimension::D2,
            sample_type: TextureSampleType::Float { filterable },
        },
        count: None,
    }
}

fn sampler_entry(binding: u32, ty: SamplerBindingType) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::FRAGMENT,
        ty: BindingType::Sampler(ty),
        count: None,
    }
}

pub fn create_bind_group_layouts(device: &Device) -> Layouts {
    let camera_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("camera_bgl"),
        entries: &[uniform_entry(0, ShaderStages::VERTEX_FRAGMENT)],
    });
    let model_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("model_bgl"),
        entries: &[uniform_entry(0, ShaderStages::VERTEX)],
    });
    let material_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("material_bgl"),
        entries: &[
            uniform_entry(0, ShaderStages::FRAGMENT),
            texture_entry(1, true),
            sampler_entry(2, SamplerBindingType::Filtering),
        ],
    });
    // Rgba32Float is not filterable without an optional feature.
    let environment_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("environment_bgl"),
        entries: &[
            uniform_entry(0, ShaderStages::FRAGMENT),
            texture_entry(1, false),
            sampler_entry(2, SamplerBindingType::NonFiltering),
        ],
    });

    Layouts {
        camera_bgl,
        model_bgl,
        material_bgl,
        environment_bgl,
    }
}

pub fn create_pipeline(
    device: &Device,
    target_format: TextureFormat,
    layouts: &Layouts,
) -> (RenderPipeline, BindGroup, Buffer) {
    let shader = device.create_shader_module(ShaderModuleDescriptor {
        label: Some("scene_shader"),
        source: ShaderSource::Wgsl(include_str!("shaders/scene.wgsl").into()),
    });

    let camera_buf = device.create_buffer_init(&util::BufferInitDescriptor {
        label: Some("camera_ubo"),
        contents: bytemuck::bytes_of(&CameraUniform::default()),
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
    });
    let camera_bg = device.create_bind_group(&BindGroupDescriptor {
        label: Some("camera_bg"),
        layout: &layouts.camera_bgl,
        entries: &[BindGroupEntry {
            binding: 0,
            resource: camera_buf.as_entire_binding(),
        }],
    });

    let layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some("scene_pipeline_layout"),
        bind_group_layouts: &[
            &layouts.camera_bgl,
            &layouts.model_bgl,
            &layouts.material_bgl,
            &layouts.environment_bgl,
        ],
        push_constant_ranges: &[],
    });

    let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some("scene_pipeline"),
        layout: Some(&layout),
        vertex: VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[Vertex::LAYOUT],
        },
        fragment: Some(FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(ColorTargetState {
                format: target_format,
                blend: None,
                write_mask: ColorWrites::ALL,
            })],
        }),
        primitive: PrimitiveState {
            topology: PrimitiveTopology::TriangleList,
            front_face: FrontFace::Ccw,
            // double-sided glTF materials need both faces
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: CompareFunction::Less,
            stencil: StencilState::default(),
            bias: DepthBiasState::default(),
        }),
        multisample: MultisampleState::default(),
        multiview: None,
        cache: None,
    });

    (pipeline, camera_bg, camera_buf)
}
