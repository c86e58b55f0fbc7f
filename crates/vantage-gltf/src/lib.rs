use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use glam::{Mat4, Vec3};
use gltf::buffer::Source as BufferSource;
use gltf::image::Source as ImageSource;
use std::collections::HashMap;
use vantage_3d::{MaterialData, MeshData, ModelData, TextureData};

/// A decoded glTF file: the default scene as one model plus what else the
/// file carried.
#[derive(Debug, Clone)]
pub struct GltfAsset {
    pub model: ModelData,
    pub scene_count: usize,
    pub camera_count: usize,
    pub animation_count: usize,
}

/// A buffer or image the document points at by relative URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalRef {
    pub uri: String,
    /// `byteLength` for buffers. Images carry no size.
    pub byte_length: Option<u64>,
}

/// Lists the files a `.gltf` needs besides itself, buffers first. `data:`
/// URIs and GLB chunks are skipped, repeated URIs listed once.
pub fn external_refs(bytes: &[u8]) -> Result<Vec<ExternalRef>> {
    let gltf = gltf::Gltf::from_slice(bytes).context("parse glTF")?;
    let mut refs: Vec<ExternalRef> = Vec::new();
    let mut push = |uri: &str, byte_length: Option<u64>| {
        if !uri.starts_with("data:") && !refs.iter().any(|r| r.uri == uri) {
            refs.push(ExternalRef {
                uri: uri.to_owned(),
                byte_length,
            });
        }
    };
    for buffer in gltf.buffers() {
        if let BufferSource::Uri(uri) = buffer.source() {
            push(uri, Some(buffer.length() as u64));
        }
    }
    for image in gltf.images() {
        if let ImageSource::Uri { uri, .. } = image.source() {
            push(uri, None);
        }
    }
    Ok(refs)
}

/// Decodes `.gltf` or `.glb` bytes. External buffers and images come from
/// `external`, keyed by the URI the document uses; see [`external_refs`].
pub fn decode_gltf(bytes: &[u8], external: &HashMap<String, Vec<u8>>) -> Result<GltfAsset> {
    let gltf::Gltf { document, blob } = gltf::Gltf::from_slice(bytes).context("parse glTF")?;
    let buffers = load_buffers(&document, blob, external).context("load glTF buffers")?;

    let scene = match document.default_scene().or_else(|| document.scenes().next()) {
        Some(scene) => scene,
        None => bail!("glTF has no scenes"),
    };

    let mut builder = ModelBuilder {
        buffers: &buffers,
        external,
        textures: HashMap::new(),
        model: ModelData {
            name: scene.name().map(str::to_owned),
            meshes: Vec::new(),
            materials: Vec::new(),
        },
        material_slots: HashMap::new(),
    };
    for node in scene.nodes() {
        builder.visit(&node, Mat4::IDENTITY)?;
    }

    Ok(GltfAsset {
        model: builder.model,
        scene_count: document.scenes().len(),
        camera_count: document.cameras().len(),
        animation_count: document.animations().len(),
    })
}

fn load_buffers(
    document: &gltf::Document,
    mut blob: Option<Vec<u8>>,
    external: &HashMap<String, Vec<u8>>,
) -> Result<Vec<Vec<u8>>> {
    document
        .buffers()
        .map(|buffer| {
            let data = match buffer.source() {
                BufferSource::Bin => blob.take().context("GLB buffer without a BIN chunk")?,
                BufferSource::Uri(uri) => resolve_uri(uri, external)?,
            };
            if data.len() < buffer.length() {
                bail!(
                    "buffer {} holds {} bytes, expected {}",
                    buffer.index(),
                    data.len(),
                    buffer.length()
                );
            }
            Ok(data)
        })
        .collect()
}

fn resolve_uri(uri: &str, external: &HashMap<String, Vec<u8>>) -> Result<Vec<u8>> {
    if let Some(data) = uri.strip_prefix("data:") {
        let (_, encoded) = data
            .split_once(";base64,")
            .context("only base64 data URIs are supported")?;
        return BASE64.decode(encoded).context("decode data URI");
    }
    external
        .get(uri)
        .cloned()
        .with_context(|| format!("{uri} was not fetched"))
}

struct ModelBuilder<'a> {
    buffers: &'a [Vec<u8>],
    external: &'a HashMap<String, Vec<u8>>,
    textures: HashMap<usize, Option<TextureData>>,
    model: ModelData,
    // glTF material index (None = default material) -> slot in model.materials
    material_slots: HashMap<Option<usize>, usize>,
}

impl ModelBuilder<'_> {
    fn visit(&mut self, node: &gltf::Node, parent: Mat4) -> Result<()> {
        let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
        if let Some(mesh) = node.mesh() {
            for prim in mesh.primitives() {
                if prim.mode() != gltf::mesh::Mode::Triangles {
                    log::debug!("skipping {:?} primitive in mesh {:?}", prim.mode(), mesh.name());
                    continue;
                }
                let data = self.read_primitive(&prim, world)?;
                self.model.meshes.push(data);
            }
        }
        for child in node.children() {
            self.visit(&child, world)?;
        }
        Ok(())
    }

    fn read_primitive(&mut self, prim: &gltf::Primitive, world: Mat4) -> Result<MeshData> {
        let buffers = self.buffers;
        let reader = prim.reader(|b| buffers.get(b.index()).map(Vec::as_slice));

        let positions: Vec<[f32; 3]> = reader
            .read_positions()
            .context("primitive without POSITION")?
            .map(|p| world.transform_point3(Vec3::from(p)).to_array())
            .collect();

        let indices: Vec<u32> = match reader.read_indices() {
            Some(ix) => ix.into_u32().collect(),
            None => (0..positions.len() as u32).collect(),
        };
        if let Some(bad) = indices.iter().find(|&&i| i as usize >= positions.len()) {
            bail!("index {bad} out of range for {} vertices", positions.len());
        }

        let normal_mat = world.inverse().transpose();
        let normals: Vec<[f32; 3]> = match reader.read_normals() {
            Some(ns) => ns
                .map(|n| normal_mat.transform_vector3(Vec3::from(n)).normalize_or_zero().to_array())
                .collect(),
            None => compute_normals(&positions, &indices),
        };

        let material = prim.material();
        let uv_set = material
            .pbr_metallic_roughness()
            .base_color_texture()
            .map(|t| t.tex_coord())
            .unwrap_or(0);
        let uvs: Vec<[f32; 2]> = reader
            .read_tex_coords(uv_set)
            .map(|t| t.into_f32().collect())
            .unwrap_or_default();

        let material_id = self.material_slot(&material);

        Ok(MeshData {
            positions,
            normals,
            uvs,
            indices,
            material_id,
        })
    }

    fn material_slot(&mut self, material: &gltf::Material) -> usize {
        if let Some(&slot) = self.material_slots.get(&material.index()) {
            return slot;
        }
        let pbr = material.pbr_metallic_roughness();
        let base_color_texture = pbr
            .base_color_texture()
            .and_then(|info| self.texture(&info.texture().source()));
        let data = MaterialData {
            name: material.name().map(str::to_owned),
            base_color_factor: pbr.base_color_factor(),
            base_color_texture,
            metallic_factor: pbr.metallic_factor(),
            roughness_factor: pbr.roughness_factor(),
        };
        let slot = self.model.materials.len();
        self.model.materials.push(data);
        self.material_slots.insert(material.index(), slot);
        slot
    }

    fn texture(&mut self, image: &gltf::Image) -> Option<TextureData> {
        if let Some(cached) = self.textures.get(&image.index()) {
            return cached.clone();
        }
        let texture = match self.decode_image(image) {
            Ok(texture) => Some(texture),
            Err(err) => {
                log::warn!("skipping glTF image {}: {err:#}", image.index());
                None
            }
        };
        self.textures.insert(image.index(), texture.clone());
        texture
    }

    fn decode_image(&self, image: &gltf::Image) -> Result<TextureData> {
        let encoded = match image.source() {
            ImageSource::View { view, .. } => {
                let buffer = self
                    .buffers
                    .get(view.buffer().index())
                    .context("image view into a missing buffer")?;
                buffer
                    .get(view.offset()..view.offset() + view.length())
                    .context("image view out of range")?
                    .to_vec()
            }
            ImageSource::Uri { uri, .. } => resolve_uri(uri, self.external)?,
        };
        let rgba = image::load_from_memory(&encoded)
            .context("decode image")?
            .into_rgba8();
        Ok(TextureData {
            width: rgba.width(),
            height: rgba.height(),
            pixels: rgba.into_raw(),
        })
    }
}

/// Area-weighted smooth normals for primitives that ship without them.
pub fn compute_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut acc = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let (pa, pb, pc) = (
            Vec3::from(positions[a]),
            Vec3::from(positions[b]),
            Vec3::from(positions[c]),
        );
        let n = (pb - pa).cross(pc - pa);
        acc[a] += n;
        acc[b] += n;
        acc[c] += n;
    }
    acc.into_iter()
        .map(|n| n.normalize_or(Vec3::Y).to_array())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // one triangle: positions (0,0,0) (1,0,0) (0,1,0) then u16 indices 0 1 2
    const TRIANGLE_BASE64: &str = "AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAAAAABAAIAAAA=";
    const TRIANGLE_BUFFER: &str = concat!(
        "data:application/octet-stream;base64,",
        "AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAAAAABAAIAAAA="
    );

    fn no_files() -> HashMap<String, Vec<u8>> {
        HashMap::new()
    }

    fn with_material(json: String) -> String {
        json.replace(r#""indices": 1 }"#, r#""indices": 1, "material": 0 }"#)
    }

    fn png(width: u32, height: u32, pixels: Vec<u8>) -> Vec<u8> {
        let img = image::RgbaImage::from_raw(width, height, pixels).unwrap();
        let mut out = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    fn triangle_gltf(nodes: &str, scene_nodes: &str, extra: &str) -> String {
        format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "name": "base", "nodes": {scene_nodes} }}],
  "nodes": {nodes},
  "meshes": [{{ "primitives": [{{ "attributes": {{ "POSITION": 0 }}, "indices": 1 }}] }}],
  "buffers": [{{ "byteLength": 44, "uri": "{TRIANGLE_BUFFER}" }}],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }},
    {{ "buffer": 0, "byteOffset": 36, "byteLength": 6 }}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
       "min": [0, 0, 0], "max": [1, 1, 0] }},
    {{ "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }}
  ]{extra}
}}"#
        )
    }

    #[test]
    fn decodes_embedded_triangle() {
        let json = triangle_gltf(r#"[{ "mesh": 0, "translation": [1, 2, 3] }]"#, "[0]", "");
        let asset = decode_gltf(json.as_bytes(), &no_files()).unwrap();

        assert_eq!(asset.scene_count, 1);
        assert_eq!(asset.camera_count, 0);
        assert_eq!(asset.animation_count, 0);
        assert_eq!(asset.model.name.as_deref(), Some("base"));

        let mesh = &asset.model.meshes[0];
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.positions[0], [1.0, 2.0, 3.0]);
        assert_eq!(mesh.positions[1], [2.0, 2.0, 3.0]);
        assert_eq!(mesh.positions[2], [1.0, 3.0, 3.0]);
        // no NORMAL attribute, so the face normal is derived
        assert_eq!(mesh.normals, vec![[0.0, 0.0, 1.0]; 3]);
        // default material gets its own slot
        assert_eq!(asset.model.materials.len(), 1);
        assert_eq!(asset.model.materials[0].base_color_factor, [1.0; 4]);
    }

    #[test]
    fn node_hierarchy_is_baked() {
        let nodes = r#"[
            { "children": [1], "translation": [10, 0, 0], "scale": [2, 2, 2] },
            { "mesh": 0 },
            { "mesh": 0, "translation": [0, 0, -5] }
        ]"#;
        let json = triangle_gltf(nodes, "[0, 2]", "");
        let asset = decode_gltf(json.as_bytes(), &no_files()).unwrap();
        assert_eq!(asset.model.meshes.len(), 2);
        assert_eq!(asset.model.meshes[0].positions[1], [12.0, 0.0, 0.0]);
        assert_eq!(asset.model.meshes[1].positions[2], [0.0, 1.0, -5.0]);
        // both primitives share the default material
        assert_eq!(asset.model.materials.len(), 1);
        assert_eq!(asset.model.triangle_count(), 2);
    }

    #[test]
    fn materials_and_side_channels_are_read() {
        let extra = r#",
  "materials": [{ "name": "hull", "pbrMetallicRoughness": {
      "baseColorFactor": [0.5, 0.25, 1, 1], "metallicFactor": 0.2, "roughnessFactor": 0.7 } }],
  "cameras": [{ "type": "perspective", "perspective": { "yfov": 0.8, "znear": 0.1 } }]"#;
        let json = with_material(triangle_gltf(r#"[{ "mesh": 0 }]"#, "[0]", extra));
        let asset = decode_gltf(json.as_bytes(), &no_files()).unwrap();
        assert_eq!(asset.camera_count, 1);
        let mat = &asset.model.materials[0];
        assert_eq!(mat.name.as_deref(), Some("hull"));
        assert_eq!(mat.base_color_factor, [0.5, 0.25, 1.0, 1.0]);
        assert_eq!(mat.metallic_factor, 0.2);
        assert_eq!(mat.roughness_factor, 0.7);
        assert!(mat.base_color_texture.is_none());
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(decode_gltf(b"definitely not gltf", &no_files()).is_err());
    }

    #[test]
    fn external_buffer_comes_from_fetched_bytes() {
        let json =
            triangle_gltf(r#"[{ "mesh": 0 }]"#, "[0]", "").replace(TRIANGLE_BUFFER, "scene.bin");
        let mut files = no_files();
        files.insert("scene.bin".into(), BASE64.decode(TRIANGLE_BASE64).unwrap());

        let asset = decode_gltf(json.as_bytes(), &files).unwrap();
        assert_eq!(asset.model.meshes[0].positions[1], [1.0, 0.0, 0.0]);
        assert_eq!(asset.model.triangle_count(), 1);
    }

    #[test]
    fn missing_or_short_external_buffer_is_an_error() {
        let json =
            triangle_gltf(r#"[{ "mesh": 0 }]"#, "[0]", "").replace(TRIANGLE_BUFFER, "scene.bin");
        assert!(decode_gltf(json.as_bytes(), &no_files()).is_err());

        let mut files = no_files();
        files.insert("scene.bin".into(), vec![0; 20]);
        assert!(decode_gltf(json.as_bytes(), &files).is_err());
    }

    #[test]
    fn external_refs_skip_embedded_and_repeats() {
        let extra = r#",
  "images": [{ "uri": "tex/a.png" }, { "uri": "tex/a.png" },
             { "uri": "data:image/png;base64,AAAA" }]"#;
        let json =
            triangle_gltf(r#"[{ "mesh": 0 }]"#, "[0]", extra).replace(TRIANGLE_BUFFER, "scene.bin");

        let refs = external_refs(json.as_bytes()).unwrap();
        assert_eq!(
            refs,
            vec![
                ExternalRef {
                    uri: "scene.bin".into(),
                    byte_length: Some(44),
                },
                ExternalRef {
                    uri: "tex/a.png".into(),
                    byte_length: None,
                },
            ]
        );

        let embedded = triangle_gltf(r#"[{ "mesh": 0 }]"#, "[0]", "");
        assert!(external_refs(embedded.as_bytes()).unwrap().is_empty());
    }

    const TEXTURED: &str = r#",
  "materials": [{ "pbrMetallicRoughness": { "baseColorTexture": { "index": 0 } } }],
  "textures": [{ "source": 0 }],
  "images": [{ "uri": "tex/base.png" }]"#;

    #[test]
    fn base_color_texture_is_decoded_from_external_image() {
        let json = with_material(triangle_gltf(r#"[{ "mesh": 0 }]"#, "[0]", TEXTURED));
        let mut files = no_files();
        files.insert("tex/base.png".into(), png(2, 1, vec![255, 0, 0, 255, 0, 0, 255, 128]));

        let asset = decode_gltf(json.as_bytes(), &files).unwrap();
        let texture = asset.model.materials[0].base_color_texture.as_ref().unwrap();
        assert_eq!((texture.width, texture.height), (2, 1));
        assert_eq!(texture.pixels, vec![255, 0, 0, 255, 0, 0, 255, 128]);
    }

    #[test]
    fn broken_image_only_drops_the_texture() {
        let json = with_material(triangle_gltf(r#"[{ "mesh": 0 }]"#, "[0]", TEXTURED));
        let mut files = no_files();
        files.insert("tex/base.png".into(), b"not a png".to_vec());

        let asset = decode_gltf(json.as_bytes(), &files).unwrap();
        assert_eq!(asset.model.meshes.len(), 1);
        assert!(asset.model.materials[0].base_color_texture.is_none());
    }

    #[test]
    fn computed_normals_follow_winding() {
        let positions = [[0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [5.0, 5.0, 5.0]];
        let normals = compute_normals(&positions, &[0, 1, 2]);
        assert_eq!(normals[0], [0.0, 1.0, 0.0]);
        // unreferenced vertex falls back to +Y
        assert_eq!(normals[3], [0.0, 1.0, 0.0]);
    }
}
