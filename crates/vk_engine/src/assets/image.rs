//! Image loading for texture data

use std::path::Path;

use super::AssetError;

/// Decoded RGBA8 pixels ready for GPU upload
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
}

impl ImageData {
    /// Load an image from a file path, converting to RGBA8
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AssetError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AssetError::NotFound(path.display().to_string()));
        }

        let img = ::image::open(path)
            .map_err(|e| AssetError::LoadFailed(format!("{}: {}", path.display(), e)))?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();

        log::info!("Loaded image {}x{} from {}", width, height, path.display());
        Self::from_rgba8(width, height, rgba.into_raw())
    }

    /// Wrap raw RGBA8 pixels
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, AssetError> {
        if width == 0 || height == 0 {
            return Err(AssetError::InvalidData(format!("image has zero size {}x{}", width, height)));
        }
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(AssetError::InvalidData(format!(
                "expected {} bytes for {}x{} RGBA8, got {}",
                expected,
                width,
                height,
                pixels.len()
            )));
        }
        Ok(Self { pixels, width, height })
    }

    /// Pixel bytes, row-major RGBA8
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Upload size in bytes: `width * height * 4`
    pub fn device_size(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height) * 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_pixels_kept_row_major() {
        let pixels: Vec<u8> = [1, 2, 3, 4].repeat(6);
        let image = ImageData::from_rgba8(2, 3, pixels).unwrap();
        assert_eq!(image.device_size(), 24);
        assert_eq!(image.pixels().len(), 24);
        assert_eq!(&image.pixels()[20..], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let result = ImageData::from_rgba8(4, 4, vec![0; 10]);
        assert!(matches!(result, Err(AssetError::InvalidData(_))));
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(ImageData::from_rgba8(0, 4, Vec::new()).is_err());
    }

    #[test]
    fn test_bundled_texture_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../resources/textures/checker.png");
        let image = ImageData::from_file(path).unwrap();
        assert_eq!((image.width(), image.height()), (64, 64));
        assert_eq!(image.device_size(), 64 * 64 * 4);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        assert!(matches!(ImageData::from_file("nope.png"), Err(AssetError::NotFound(_))));
    }
}
