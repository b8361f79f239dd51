//! File-to-pixels decoding.
//!
//! Wallpapers are decoded into straight RGBA8 with a top-left origin before
//! they ever reach a backend; the GPU layer only sees [`ImageData`].

use std::path::{Path, PathBuf};

/// A decoded raster image: tightly packed RGBA8 rows, top-left origin.
#[derive(Clone)]
pub struct ImageData {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("image {path} has zero extent")]
    ZeroExtent { path: PathBuf },
}

impl ImageData {
    /// Wraps an existing RGBA8 buffer. The buffer length must equal
    /// `width * height * 4`; zero-area images are a programmer error here
    /// and are rejected by the decoder before upload.
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), width as usize * height as usize * 4);
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// Decodes the file at `path` into RGBA8.
///
/// Animated formats contribute their first frame only.
pub fn load_image(path: &Path) -> Result<ImageData, DecodeError> {
    let decoded = image::open(path).map_err(|source| DecodeError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(DecodeError::ZeroExtent {
            path: path.to_path_buf(),
        });
    }

    tracing::debug!(path = %path.display(), width, height, "decoded wallpaper");
    Ok(ImageData::from_rgba8(width, height, rgba.into_raw()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();
        assert!(matches!(
            load_image(&path),
            Err(DecodeError::Decode { .. })
        ));
    }

    #[test]
    fn load_reads_a_real_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixel.png");
        let img = image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]));
        img.save(&path).unwrap();

        let data = load_image(&path).expect("decode");
        assert_eq!((data.width(), data.height()), (3, 2));
        assert_eq!(data.pixels().len(), 3 * 2 * 4);
        assert_eq!(&data.pixels()[..4], &[10, 20, 30, 255]);
    }
}
