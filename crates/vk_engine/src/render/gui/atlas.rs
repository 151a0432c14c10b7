//! CPU copy of egui's font atlas
//!
//! egui sends the atlas as a full image first and patches regions of it
//! afterwards. The patched copy is re-uploaded as a whole texture.

use egui::epaint::ImageDelta;
use egui::TextureId;

use crate::assets::image::ImageData;
use crate::assets::AssetError;

/// Premultiplied RGBA8 atlas pixels
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FontAtlas {
    size: [usize; 2],
    pixels: Vec<u8>,
}

impl FontAtlas {
    /// Apply one texture delta
    ///
    /// Returns `Ok(true)` when the atlas changed and `Ok(false)` for deltas
    /// aimed at other textures.
    pub fn apply(&mut self, id: TextureId, delta: &ImageDelta) -> Result<bool, AssetError> {
        if id != TextureId::default() {
            return Ok(false);
        }

        let size = delta.image.size();
        let bytes = rgba_bytes(&delta.image);

        let Some([x, y]) = delta.pos else {
            self.size = size;
            self.pixels = bytes;
            return Ok(true);
        };

        if x + size[0] > self.size[0] || y + size[1] > self.size[1] {
            return Err(AssetError::InvalidData(format!(
                "atlas patch {}x{} at ({}, {}) outside {}x{} atlas",
                size[0], size[1], x, y, self.size[0], self.size[1]
            )));
        }

        let row_bytes = size[0] * 4;
        let stride = self.size[0] * 4;
        for (row, source) in bytes.chunks_exact(row_bytes).enumerate() {
            let start = (y + row) * stride + x * 4;
            self.pixels[start..start + row_bytes].copy_from_slice(source);
        }
        Ok(true)
    }

    /// Whether no full image has arrived yet
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Atlas size in pixels, width first
    pub fn size(&self) -> [usize; 2] {
        self.size
    }

    /// Copy out as uploadable image data
    pub fn to_image(&self) -> Result<ImageData, AssetError> {
        let width = u32::try_from(self.size[0])
            .map_err(|_| AssetError::InvalidData("atlas too wide".to_string()))?;
        let height = u32::try_from(self.size[1])
            .map_err(|_| AssetError::InvalidData("atlas too tall".to_string()))?;
        ImageData::from_rgba8(width, height, self.pixels.clone())
    }
}

/// Row-major premultiplied RGBA8 bytes of an egui image
pub fn rgba_bytes(image: &egui::ImageData) -> Vec<u8> {
    match image {
        egui::ImageData::Color(color) => color.pixels.iter().flat_map(|pixel| pixel.to_array()).collect(),
        egui::ImageData::Font(font) => font.srgba_pixels(None).flat_map(|pixel| pixel.to_array()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::{Color32, ColorImage, TextureOptions};

    fn solid(width: usize, height: usize, color: Color32) -> egui::ImageData {
        egui::ImageData::Color(std::sync::Arc::new(ColorImage::new([width, height], color)))
    }

    #[test]
    fn test_full_delta_replaces_atlas() {
        let mut atlas = FontAtlas::default();
        assert!(atlas.is_empty());

        let delta = ImageDelta::full(solid(4, 2, Color32::WHITE), TextureOptions::LINEAR);
        assert!(atlas.apply(TextureId::default(), &delta).unwrap());

        assert_eq!(atlas.size(), [4, 2]);
        let image = atlas.to_image().unwrap();
        assert_eq!((image.width(), image.height()), (4, 2));
        assert!(image.pixels().iter().all(|&byte| byte == 255));
    }

    #[test]
    fn test_partial_delta_patches_region() {
        let mut atlas = FontAtlas::default();
        let full = ImageDelta::full(solid(4, 4, Color32::TRANSPARENT), TextureOptions::LINEAR);
        atlas.apply(TextureId::default(), &full).unwrap();

        let patch = ImageDelta::partial([1, 2], solid(2, 1, Color32::RED), TextureOptions::LINEAR);
        assert!(atlas.apply(TextureId::default(), &patch).unwrap());

        let image = atlas.to_image().unwrap();
        let pixel = |x: usize, y: usize| &image.pixels()[(y * 4 + x) * 4..(y * 4 + x) * 4 + 4];
        assert_eq!(pixel(1, 2), &Color32::RED.to_array());
        assert_eq!(pixel(2, 2), &Color32::RED.to_array());
        assert_eq!(pixel(0, 2), &[0, 0, 0, 0]);
        assert_eq!(pixel(1, 1), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_patch_outside_atlas_rejected() {
        let mut atlas = FontAtlas::default();
        let full = ImageDelta::full(solid(4, 4, Color32::WHITE), TextureOptions::LINEAR);
        atlas.apply(TextureId::default(), &full).unwrap();

        let patch = ImageDelta::partial([3, 0], solid(2, 2, Color32::RED), TextureOptions::LINEAR);
        assert!(matches!(
            atlas.apply(TextureId::default(), &patch),
            Err(AssetError::InvalidData(_))
        ));
    }

    #[test]
    fn test_other_textures_ignored() {
        let mut atlas = FontAtlas::default();
        let delta = ImageDelta::full(solid(4, 4, Color32::WHITE), TextureOptions::LINEAR);
        assert!(!atlas.apply(TextureId::User(3), &delta).unwrap());
        assert!(atlas.is_empty());
    }

    #[test]
    fn test_first_egui_frame_fills_atlas() {
        let context = egui::Context::default();
        let output = context.run(egui::RawInput::default(), |ctx| {
            egui::Window::new("Stats").show(ctx, |ui| ui.label("hello"));
        });

        let mut atlas = FontAtlas::default();
        for (id, delta) in &output.textures_delta.set {
            atlas.apply(*id, delta).unwrap();
        }

        assert!(!atlas.is_empty());
        assert!(atlas.to_image().is_ok());
    }
}
