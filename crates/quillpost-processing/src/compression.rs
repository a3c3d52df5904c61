use anyhow::{anyhow, Result};
use bytes::Bytes;
use image::{DynamicImage, GenericImageView};

/// Lossy encoders the preparation pipeline needs.
///
/// Qualities are percentages (0-100).
pub trait ImageEncoder: Send + Sync {
    fn encode_webp(&self, img: &DynamicImage, quality: u8) -> Result<Bytes>;
    fn encode_jpeg(&self, img: &DynamicImage, quality: u8) -> Result<Bytes>;
}

/// Main compression service
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCompressor;

impl ImageCompressor {
    /// Compress to WebP
    fn compress_webp(img: &DynamicImage, quality: u8) -> Result<Bytes> {
        let (width, height) = img.dimensions();

        // Convert to RGBA for WebP encoding so transparency survives
        let rgba_img = img.to_rgba8();

        let encoder = webp::Encoder::from_rgba(&rgba_img, width, height);
        let webp_data = encoder
            .encode_simple(false, quality.min(100) as f32)
            .map_err(|e| anyhow!("WebP encoding failed: {:?}", e))?;

        Ok(Bytes::copy_from_slice(&webp_data))
    }

    /// Compress to JPEG using mozjpeg
    fn compress_jpeg(img: &DynamicImage, quality: u8) -> Result<Bytes> {
        let rgb_img = img.to_rgb8();
        let (width, height) = rgb_img.dimensions();

        let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
        comp.set_size(width as usize, height as usize);
        comp.set_quality(quality.min(100) as f32);
        comp.set_progressive_mode();
        comp.set_optimize_coding(true);

        let mut comp = comp.start_compress(Vec::new())?;
        comp.write_scanlines(&rgb_img)?;
        let jpeg_data = comp.finish()?;

        Ok(Bytes::from(jpeg_data))
    }
}

impl ImageEncoder for ImageCompressor {
    fn encode_webp(&self, img: &DynamicImage, quality: u8) -> Result<Bytes> {
        Self::compress_webp(img, quality)
    }

    fn encode_jpeg(&self, img: &DynamicImage, quality: u8) -> Result<Bytes> {
        Self::compress_jpeg(img, quality)
    }
}
