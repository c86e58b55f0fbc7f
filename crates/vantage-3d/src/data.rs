//! CPU-side asset data produced by the decoders and uploaded by [`crate::Model`]
//! and [`crate::EnvironmentMap`].

use glam::Vec3;

#[derive(Debug, Clone)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8, sRGB encoded.
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// Box-filters the texture until both sides fit in `max_dim`.
    pub fn downsample_to(self, max_dim: u32) -> Self {
        let texels: Vec<[u8; 4]> = self
            .pixels
            .chunks_exact(4)
            .map(|px| [px[0], px[1], px[2], px[3]])
            .collect();
        let (width, height, texels) =
            shrink_to_fit(self.width, self.height, texels, max_dim, |block| {
                let n = block.len() as u32;
                let mut sum = [0u32; 4];
                for px in block {
                    for (acc, v) in sum.iter_mut().zip(px) {
                        *acc += *v as u32;
                    }
                }
                sum.map(|c| ((c + n / 2) / n) as u8)
            });
        Self {
            width,
            height,
            pixels: texels.into_iter().flatten().collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MaterialData {
    pub name: Option<String>,
    pub base_color_factor: [f32; 4],
    pub base_color_texture: Option<TextureData>,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
}

impl Default for MaterialData {
    fn default() -> Self {
        Self {
            name: None,
            base_color_factor: [1.0; 4],
            base_color_texture: None,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
    pub material_id: usize,
}

/// A decoded model subgraph. Node transforms are already baked into the
/// vertex data, so every mesh is in model space.
#[derive(Debug, Clone, Default)]
pub struct ModelData {
    pub name: Option<String>,
    pub meshes: Vec<MeshData>,
    pub materials: Vec<MaterialData>,
}

impl ModelData {
    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|m| m.positions.len()).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(|m| m.indices.len() / 3).sum()
    }

    /// Axis-aligned bounds over every vertex, `None` for an empty model.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut points = self
            .meshes
            .iter()
            .flat_map(|m| m.positions.iter().copied().map(Vec3::from));
        let first = points.next()?;
        Some(points.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p))))
    }
}

/// How an environment texture is projected onto directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvironmentMapping {
    /// Plain 2D texture, not usable for lighting.
    #[default]
    Uv,
    EquirectangularReflection,
}

#[derive(Debug, Clone)]
pub struct EnvironmentData {
    pub width: u32,
    pub height: u32,
    /// Linear RGBA, row-major, top row first.
    pub texels: Vec<[f32; 4]>,
    pub mapping: EnvironmentMapping,
}

impl EnvironmentData {
    /// Box-filters the map until both sides fit in `max_dim`.
    pub fn downsample_to(self, max_dim: u32) -> Self {
        let (width, height, texels) =
            shrink_to_fit(self.width, self.height, self.texels, max_dim, |block| {
                let mut sum = [0.0f32; 4];
                for t in block {
                    for (acc, v) in sum.iter_mut().zip(t) {
                        *acc += v;
                    }
                }
                sum.map(|c| c / block.len() as f32)
            });
        Self {
            width,
            height,
            texels,
            mapping: self.mapping,
        }
    }
}

/// Halves each side that is over `max_dim`, independently, until both fit.
/// `average` merges the 2x1, 1x2 or 2x2 block behind every output texel.
fn shrink_to_fit<T: Copy>(
    mut width: u32,
    mut height: u32,
    mut texels: Vec<T>,
    max_dim: u32,
    average: impl Fn(&[T]) -> T,
) -> (u32, u32, Vec<T>) {
    let max_dim = max_dim.max(1);
    let mut block = Vec::with_capacity(4);
    while width > max_dim || height > max_dim {
        let sx = if width > max_dim { 2 } else { 1 };
        let sy = if height > max_dim { 2 } else { 1 };
        let (w, h) = (width / sx, height / sy);
        let mut out = Vec::with_capacity((w * h) as usize);
        for y in 0..h {
            for x in 0..w {
                block.clear();
                for dy in 0..sy {
                    for dx in 0..sx {
                        let (px, py) = (x * sx + dx, y * sy + dy);
                        block.push(texels[(py * width + px) as usize]);
                    }
                }
                out.push(average(&block));
            }
        }
        (width, height, texels) = (w, h, out);
    }
    (width, height, texels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_mesh(offset: f32) -> MeshData {
        MeshData {
            positions: vec![
                [offset, 0.0, 0.0],
                [offset + 1.0, 0.0, 0.0],
                [offset + 1.0, 2.0, 0.0],
                [offset, 2.0, -3.0],
            ],
            normals: vec![[0.0, 0.0, 1.0]; 4],
            uvs: vec![[0.0, 0.0]; 4],
            indices: vec![0, 1, 2, 0, 2, 3],
            material_id: 0,
        }
    }

    #[test]
    fn bounds_span_all_meshes() {
        let model = ModelData {
            name: None,
            meshes: vec![quad_mesh(0.0), quad_mesh(-4.0)],
            materials: vec![MaterialData::default()],
        };
        let (lo, hi) = model.bounds().unwrap();
        assert_eq!(lo, Vec3::new(-4.0, 0.0, -3.0));
        assert_eq!(hi, Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(model.vertex_count(), 8);
        assert_eq!(model.triangle_count(), 4);
    }

    #[test]
    fn empty_model_has_no_bounds() {
        assert!(ModelData::default().bounds().is_none());
    }

    fn small_env_texels() -> Vec<[f32; 4]> {
        vec![
            [1.0, 0.0, 0.0, 1.0],
            [3.0, 0.0, 0.0, 1.0],
            [0.0; 4],
            [0.0; 4],
            [1.0, 0.0, 0.0, 1.0],
            [3.0, 0.0, 0.0, 1.0],
            [0.0, 4.0, 0.0, 1.0],
            [0.0, 4.0, 0.0, 1.0],
        ]
    }

    #[test]
    fn downsample_averages_blocks() {
        let env = EnvironmentData {
            width: 4,
            height: 2,
            texels: small_env_texels(),
            mapping: EnvironmentMapping::EquirectangularReflection,
        };
        let small = env.downsample_to(1);
        assert_eq!((small.width, small.height), (1, 1));
        assert_eq!(small.texels[0], [1.0, 1.0, 0.0, 0.75]);
        assert_eq!(small.mapping, EnvironmentMapping::EquirectangularReflection);

        let env = EnvironmentData {
            width: 4,
            height: 2,
            texels: small_env_texels(),
            mapping: EnvironmentMapping::Uv,
        };
        // only the width is over the limit, so rows stay apart
        let half = env.downsample_to(2);
        assert_eq!((half.width, half.height), (2, 2));
        assert_eq!(half.texels[0], [2.0, 0.0, 0.0, 1.0]);
        assert_eq!(half.texels[1], [0.0; 4]);
        assert_eq!(half.texels[3], [0.0, 4.0, 0.0, 1.0]);
    }

    #[test]
    fn wide_strip_shrinks_to_the_limit() {
        let env = EnvironmentData {
            width: 8,
            height: 1,
            texels: (0..8).map(|i| [i as f32, 0.0, 0.0, 1.0]).collect(),
            mapping: EnvironmentMapping::Uv,
        };
        let strip = env.downsample_to(2);
        assert_eq!((strip.width, strip.height), (2, 1));
        assert_eq!(strip.texels, vec![[1.5, 0.0, 0.0, 1.0], [5.5, 0.0, 0.0, 1.0]]);
    }

    #[test]
    fn oversized_texture_is_shrunk_per_axis() {
        let tall = TextureData {
            width: 1,
            height: 4,
            pixels: vec![0, 0, 0, 255, 100, 0, 0, 255, 200, 10, 0, 255, 0, 10, 0, 255],
        };
        let fitted = tall.downsample_to(2);
        assert_eq!((fitted.width, fitted.height), (1, 2));
        assert_eq!(fitted.pixels, vec![50, 0, 0, 255, 100, 10, 0, 255]);

        let small = TextureData {
            width: 2,
            height: 2,
            pixels: vec![9; 16],
        };
        let same = small.downsample_to(4096);
        assert_eq!((same.width, same.height), (2, 2));
        assert_eq!(same.pixels, vec![9; 16]);
    }

    #[test]
    fn downsample_leaves_small_maps_alone() {
        let env = EnvironmentData {
            width: 2,
            height: 1,
            texels: vec![[1.0; 4]; 2],
            mapping: EnvironmentMapping::Uv,
        };
        let same = env.downsample_to(2048);
        assert_eq!((same.width, same.height), (2, 1));
    }
}
