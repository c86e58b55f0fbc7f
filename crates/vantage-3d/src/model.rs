use crate::data::{MaterialData, ModelData};
use crate::pipeline::Layouts;
use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::util::DeviceExt;
use wgpu::*;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    const ATTRIBS: [VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    pub const LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as BufferAddress,
        step_mode: VertexStepMode::Vertex,
        attributes: &Self::ATTRIBS,
    };
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ModelUniform {
    model: [[f32; 4]; 4],
    normal: [[f32; 4]; 4],
}

impl ModelUniform {
    fn new(xform: Mat4) -> Self {
        Self {
            model: xform.to_cols_array_2d(),
            normal: xform.inverse().transpose().to_cols_array_2d(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct MaterialUniform {
    base_color: [f32; 4],
    // metallic, roughness, unused, unused
    params: [f32; 4],
}

pub struct GpuMesh {
    pub vbuf: Buffer,
    pub ibuf: Buffer,
    pub index_count: u32,
    pub material_id: usize,
}

pub struct Material {
    pub bind_group: BindGroup,
    _uniform: Buffer,
    _texture: Texture,
}

/// A model subgraph uploaded to the GPU, drawn with a single transform.
pub struct Model {
    pub name: Option<String>,
    pub meshes: Vec<GpuMesh>,
    pub materials: Vec<Material>,
    pub xform_buf: Buffer,
    pub xform_bg: BindGroup,
}

pub fn create_model_ubo(
    device: &Device,
    model_bgl: &BindGroupLayout,
    xform: Mat4,
) -> (Buffer, BindGroup) {
    let buf = device.create_buffer_init(&util::BufferInitDescriptor {
        label: Some("model_ubo"),
        contents: bytemuck::bytes_of(&ModelUniform::new(xform)),
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
    });
    let bg = device.create_bind_group(&BindGroupDescriptor {
        label: Some("model_bg"),
        layout: model_bgl,
        entries: &[BindGroupEntry {
            binding: 0,
            resource: buf.as_entire_binding(),
        }],
    });
    (buf, bg)
}

impl Model {
    pub fn upload(device: &Device, queue: &Queue, layouts: &Layouts, data: &ModelData) -> Self {
        let mut materials: Vec<Material> = data
            .materials
            .iter()
            .map(|m| create_material(device, queue, &layouts.material_bgl, m))
            .collect();
        if materials.is_empty() {
            materials.push(create_material(
                device,
                queue,
                &layouts.material_bgl,
                &MaterialData::default(),
            ));
        }

        let meshes = data
            .meshes
            .iter()
            .filter(|m| !m.indices.is_empty())
            .map(|m| {
                let vertices: Vec<Vertex> = m
                    .positions
                    .iter()
                    .enumerate()
                    .map(|(i, p)| Vertex {
                        position: *p,
                        normal: m.normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]),
                        uv: m.uvs.get(i).copied().unwrap_or([0.0, 0.0]),
                    })
                    .collect();
                let vbuf = device.create_buffer_init(&util::BufferInitDescriptor {
                    label: Some("mesh_vbuf"),
                    contents: bytemuck::cast_slice(&vertices),
                    usage: BufferUsages::VERTEX,
                });
                let ibuf = device.create_buffer_init(&util::BufferInitDescriptor {
                    label: Some("mesh_ibuf"),
                    contents: bytemuck::cast_slice(&m.indices),
                    usage: BufferUsages::INDEX,
                });
                GpuMesh {
                    vbuf,
                    ibuf,
                    index_count: m.indices.len() as u32,
                    material_id: m.material_id,
                }
            })
            .collect();

        let (xform_buf, xform_bg) = create_model_ubo(device, &layouts.model_bgl, Mat4::IDENTITY);

        Self {
            name: data.name.clone(),
            meshes,
            materials,
            xform_buf,
            xform_bg,
        }
    }

    pub fn write_transform(&self, queue: &Queue, xform: Mat4) {
        queue.write_buffer(&self.xform_buf, 0, bytemuck::bytes_of(&ModelUniform::new(xform)));
    }

    pub fn material_for(&self, mesh: &GpuMesh) -> &Material {
        &self.materials[mesh.material_id.min(self.materials.len() - 1)]
    }
}

fn create_material(
    device: &Device,
    queue: &Queue,
    bgl: &BindGroupLayout,
    data: &MaterialData,
) -> Material {
    let max_dim = device.limits().max_texture_dimension_2d;
    let fitted = data
        .base_color_texture
        .as_ref()
        .filter(|tex| tex.width > max_dim || tex.height > max_dim)
        .map(|tex| {
            log::debug!(
                "texture {}x{} exceeds {max_dim}, downsampling",
                tex.width,
                tex.height
            );
            tex.clone().downsample_to(max_dim)
        });
    let (width, height, pixels): (u32, u32, &[u8]) =
        match fitted.as_ref().or(data.base_color_texture.as_ref()) {
            Some(tex) => (tex.width, tex.height, tex.pixels.as_slice()),
            None => (1, 1, &[255u8, 255, 255, 255][..]),
        };
    let size = Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&TextureDescriptor {
        label: Some("base_color"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: TextureFormat::Rgba8UnormSrgb,
        usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: Origin3d::ZERO,
            aspect: TextureAspect::All,
        },
        pixels,
        TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        size,
    );
    let view = texture.create_view(&TextureViewDescriptor::default());
    let sampler = device.create_sampler(&SamplerDescriptor {
        label: Some("base_color_sampler"),
        address_mode_u: AddressMode::Repeat,
        address_mode_v: AddressMode::Repeat,
        mag_filter: FilterMode::Linear,
        min_filter: FilterMode::Linear,
        ..Default::default()
    });

    let uniform = device.create_buffer_init(&util::BufferInitDescriptor {
        label: Some("material_ubo"),
        contents: bytemuck::bytes_of(&MaterialUniform {
            base_color: data.base_color_factor,
            params: [data.metallic_factor, data.roughness_factor, 0.0, 0.0],
        }),
        usage: BufferUsages::UNIFORM,
    });

    let bind_group = device.create_bind_group(&BindGroupDescriptor {
        label: Some("material_bg"),
        layout: bgl,
        entries: &[
            BindGroupEntry {
                binding: 0,
                resource: uniform.as_entire_binding(),
            },
            BindGroupEntry {
                binding: 1,
                resource: BindingResource::TextureView(&view),
            },
            BindGroupEntry {
                binding: 2,
                resource: BindingResource::Sampler(&sampler),
            },
        ],
    });

    Material {
        bind_group,
        _uniform: uniform,
        _texture: texture,
    }
}
