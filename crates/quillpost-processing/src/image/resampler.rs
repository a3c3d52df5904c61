//! Resampling capability used when the pipeline shrinks an image.
//!
//! The high-quality Lanczos resampler is preferred; when it is turned off or
//! refuses a job, a nearest-neighbour redraw of the source takes its place.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView};
use quillpost_core::PipelineConfig;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ResampleError {
    #[error("Invalid target dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Output of {pixels} pixels exceeds the resampler budget of {budget}")]
    OverBudget { pixels: u64, budget: u64 },
}

/// Redraws a source raster at new dimensions.
pub trait Resampler: Send + Sync {
    fn name(&self) -> &'static str;

    fn resample(
        &self,
        src: &DynamicImage,
        width: u32,
        height: u32,
    ) -> Result<DynamicImage, ResampleError>;
}

fn check_dimensions(width: u32, height: u32) -> Result<(), ResampleError> {
    if width == 0 || height == 0 {
        return Err(ResampleError::InvalidDimensions { width, height });
    }
    Ok(())
}

/// Lanczos3 resampling with alpha preserved.
#[derive(Debug, Clone, Copy)]
pub struct LanczosResampler {
    pixel_budget: u64,
}

impl LanczosResampler {
    pub fn new(pixel_budget: u64) -> Self {
        Self { pixel_budget }
    }
}

impl Resampler for LanczosResampler {
    fn name(&self) -> &'static str {
        "lanczos3"
    }

    fn resample(
        &self,
        src: &DynamicImage,
        width: u32,
        height: u32,
    ) -> Result<DynamicImage, ResampleError> {
        check_dimensions(width, height)?;
        let pixels = width as u64 * height as u64;
        if pixels > self.pixel_budget {
            return Err(ResampleError::OverBudget {
                pixels,
                budget: self.pixel_budget,
            });
        }
        let resized = imageops::resize(&src.to_rgba8(), width, height, FilterType::Lanczos3);
        Ok(DynamicImage::ImageRgba8(resized))
    }
}

/// Plain redraw of the source at the new size.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeRedraw;

impl Resampler for NativeRedraw {
    fn name(&self) -> &'static str {
        "nearest"
    }

    fn resample(
        &self,
        src: &DynamicImage,
        width: u32,
        height: u32,
    ) -> Result<DynamicImage, ResampleError> {
        check_dimensions(width, height)?;
        Ok(src.resize_exact(width, height, FilterType::Nearest))
    }
}

/// Tries `primary` and redraws natively when it fails.
pub struct FallbackResampler {
    primary: Arc<dyn Resampler>,
    fallback: NativeRedraw,
}

impl FallbackResampler {
    pub fn new(primary: Arc<dyn Resampler>) -> Self {
        Self {
            primary,
            fallback: NativeRedraw,
        }
    }
}

impl Resampler for FallbackResampler {
    fn name(&self) -> &'static str {
        self.primary.name()
    }

    fn resample(
        &self,
        src: &DynamicImage,
        width: u32,
        height: u32,
    ) -> Result<DynamicImage, ResampleError> {
        match self.primary.resample(src, width, height) {
            Ok(img) => Ok(img),
            Err(e) => {
                let (src_width, src_height) = src.dimensions();
                tracing::warn!(
                    resampler = self.primary.name(),
                    error = %e,
                    src_width,
                    src_height,
                    width,
                    height,
                    "Resampling failed, falling back to native redraw"
                );
                self.fallback.resample(src, width, height)
            }
        }
    }
}

/// Pick the resampler for this configuration.
pub fn select_resampler(config: &PipelineConfig) -> Arc<dyn Resampler> {
    if config.high_quality_resize {
        Arc::new(FallbackResampler::new(Arc::new(LanczosResampler::new(
            config.high_quality_pixel_budget,
        ))))
    } else {
        tracing::debug!("High-quality resampling disabled, using native redraw");
        Arc::new(NativeRedraw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn checker(size: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(size, size, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 128])
            }
        }))
    }

    #[test]
    fn lanczos_resizes_and_keeps_alpha() {
        let out = LanczosResampler::new(1_000_000)
            .resample(&checker(40), 36, 20)
            .unwrap();
        assert_eq!(out.dimensions(), (36, 20));
        assert!(out.color().has_alpha());
    }

    #[test]
    fn lanczos_refuses_over_budget() {
        let err = LanczosResampler::new(100)
            .resample(&checker(40), 36, 36)
            .unwrap_err();
        assert!(matches!(err, ResampleError::OverBudget { pixels: 1296, budget: 100 }));
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        assert!(NativeRedraw.resample(&checker(4), 0, 3).is_err());
        assert!(LanczosResampler::new(100).resample(&checker(4), 3, 0).is_err());
    }

    #[test]
    fn fallback_redraws_when_primary_fails() {
        let resampler = FallbackResampler::new(Arc::new(LanczosResampler::new(10)));
        let out = resampler.resample(&checker(40), 30, 30).unwrap();
        assert_eq!(out.dimensions(), (30, 30));
    }

    #[test]
    fn select_resampler_honours_config() {
        let config = PipelineConfig::default();
        assert_eq!(select_resampler(&config).name(), "lanczos3");

        let config = PipelineConfig {
            high_quality_resize: false,
            ..PipelineConfig::default()
        };
        assert_eq!(select_resampler(&config).name(), "nearest");
    }
}
