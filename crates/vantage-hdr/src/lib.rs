use anyhow::{Context, Result};
use image::ImageFormat;
use vantage_3d::{EnvironmentData, EnvironmentMapping};

/// Decodes a Radiance `.hdr` file into linear RGBA texels. The result is an
/// untagged texture; callers choose how it is mapped.
pub fn decode_hdr(bytes: &[u8]) -> Result<EnvironmentData> {
    let img = image::load_from_memory_with_format(bytes, ImageFormat::Hdr)
        .context("decode Radiance HDR")?
        .into_rgba32f();
    let (width, height) = img.dimensions();
    let texels = img.pixels().map(|p| p.0).collect();
    Ok(EnvironmentData {
        width,
        height,
        texels,
        mapping: EnvironmentMapping::Uv,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_hdr() -> Vec<u8> {
        let mut bytes = b"#?RADIANCE\nFORMAT=32-bit_rle_rgbe\n\n-Y 1 +X 2\n".to_vec();
        // (1.0, 0.5, 0.25) then black
        bytes.extend_from_slice(&[128, 64, 32, 129]);
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes
    }

    #[test]
    fn decodes_rgbe_pixels() {
        let env = decode_hdr(&tiny_hdr()).unwrap();
        assert_eq!((env.width, env.height), (2, 1));
        assert_eq!(env.texels[0], [1.0, 0.5, 0.25, 1.0]);
        assert_eq!(env.texels[1], [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(env.mapping, EnvironmentMapping::Uv);
    }

    #[test]
    fn rejects_non_hdr_bytes() {
        assert!(decode_hdr(b"\x89PNG\r\n\x1a\n not really").is_err());
        assert!(decode_hdr(&[]).is_err());
    }
}
