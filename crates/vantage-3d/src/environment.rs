use crate::data::{EnvironmentData, EnvironmentMapping};
use crate::pipeline::Layouts;
use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;
use wgpu::*;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct EnvironmentUniform {
    // has_environment, intensity, unused, unused
    params: [f32; 4],
}

/// Equirectangular environment texture used for image based lighting.
pub struct EnvironmentMap {
    pub bind_group: BindGroup,
    pub width: u32,
    pub height: u32,
    pub mapping: EnvironmentMapping,
    _texture: Texture,
    _uniform: Buffer,
}

impl EnvironmentMap {
    pub fn upload(
        device: &Device,
        queue: &Queue,
        layouts: &Layouts,
        data: EnvironmentData,
    ) -> Self {
        let max_dim = device.limits().max_texture_dimension_2d;
        let (width, height) = (data.width, data.height);
        let data = data.downsample_to(max_dim);
        if (data.width, data.height) != (width, height) {
            log::debug!(
                "environment {width}x{height} exceeds {max_dim}, downsampled to {}x{}",
                data.width,
                data.height
            );
        }
        let lit = data.mapping == EnvironmentMapping::EquirectangularReflection;
        Self::create(device, queue, layouts, &data, if lit { 1.0 } else { 0.0 })
    }

    /// Black 1x1 stand-in bound until a real environment arrives.
    pub fn placeholder(device: &Device, queue: &Queue, layouts: &Layouts) -> Self {
        let data = EnvironmentData {
            width: 1,
            height: 1,
            texels: vec![[0.0, 0.0, 0.0, 1.0]],
            mapping: EnvironmentMapping::Uv,
        };
        Self::create(device, queue, layouts, &data, 0.0)
    }

    fn create(
        device: &Device,
        queue: &Queue,
        layouts: &Layouts,
        data: &EnvironmentData,
        enabled: f32,
    ) -> Self {
        let size = Extent3d {
            width: data.width,
            height: data.height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&TextureDescriptor {
            label: Some("environment"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba32Float,
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
            bytemuck::cast_slice(&data.texels),
            TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(16 * data.width),
                rows_per_image: Some(data.height),
            },
            size,
        );
        let view = texture.create_view(&TextureViewDescriptor::default());
        let sampler = device.create_sampler(&SamplerDescriptor {
            label: Some("environment_sampler"),
            address_mode_u: AddressMode::Repeat,
            address_mode_v: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Nearest,
            min_filter: FilterMode::Nearest,
            ..Default::default()
        });
        let uniform = device.create_buffer_init(&util::BufferInitDescriptor {
            label: Some("environment_ubo"),
            contents: bytemuck::bytes_of(&EnvironmentUniform {
                params: [enabled, 1.0, 0.0, 0.0],
            }),
            usage: BufferUsages::UNIFORM,
        });
        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("environment_bg"),
            layout: &layouts.environment_bgl,
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

        Self {
            bind_group,
            width: data.width,
            height: data.height,
            mapping: data.mapping,
            _texture: texture,
            _uniform: uniform,
        }
    }
}
