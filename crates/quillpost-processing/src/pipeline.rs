//! Media preparation pipeline: validate → (images) re-encode toward a target size.
//!
//! The image search is a small state machine. Every WebP encoding that lands
//! above `target × overshoot` shrinks both dimensions and lowers quality by a
//! step; once quality reaches the floor, a single fixed-quality JPEG encoding
//! of the last tried raster is the fallback.

use image::{DynamicImage, GenericImageView, ImageReader};
use quillpost_core::models::{MediaAsset, MediaKind, PreparedAsset, PreparedFormat};
use quillpost_core::{CompressionError, PipelineConfig, PipelineError};
use std::io::Cursor;
use std::sync::Arc;

use crate::compression::{ImageCompressor, ImageEncoder};
use crate::image::{select_resampler, Resampler};
use crate::validator::MediaValidator;

enum CompressState {
    Encoding {
        raster: DynamicImage,
        width: f64,
        height: f64,
        quality: u8,
        iteration: u32,
    },
    Shrinking {
        raster: DynamicImage,
        width: f64,
        height: f64,
        quality: u8,
        iteration: u32,
    },
    Fallback {
        raster: DynamicImage,
    },
    Done(PreparedAsset),
    Failed(CompressionError),
}

/// Validates selections and prepares them for upload.
#[derive(Clone)]
pub struct MediaPipeline {
    config: PipelineConfig,
    resampler: Arc<dyn Resampler>,
    encoder: Arc<dyn ImageEncoder>,
}

impl MediaPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let resampler = select_resampler(&config);
        Self {
            config,
            resampler,
            encoder: Arc::new(ImageCompressor),
        }
    }

    pub fn with_components(
        config: PipelineConfig,
        resampler: Arc<dyn Resampler>,
        encoder: Arc<dyn ImageEncoder>,
    ) -> Self {
        Self {
            config,
            resampler,
            encoder,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Validate `file` for `kind` and prepare it.
    ///
    /// Videos pass through unchanged. Images are re-encoded; this is CPU
    /// bound, so async callers should use [`MediaPipeline::prepare_async`].
    pub fn prepare(
        &self,
        file: Option<&MediaAsset>,
        kind: MediaKind,
    ) -> Result<PreparedAsset, PipelineError> {
        let file = MediaValidator::for_kind(kind, &self.config).validate(file)?;

        match kind {
            MediaKind::Video => Ok(PreparedAsset::original(file.clone())),
            MediaKind::Image => Ok(self.compress_to_target(file)?),
        }
    }

    /// Same as [`MediaPipeline::prepare`], with decoding and encoding moved
    /// off the async runtime.
    pub async fn prepare_async(
        &self,
        file: Option<MediaAsset>,
        kind: MediaKind,
    ) -> Result<PreparedAsset, PipelineError> {
        let file = MediaValidator::for_kind(kind, &self.config).validate_owned(file)?;
        if kind == MediaKind::Video {
            return Ok(PreparedAsset::original(file));
        }

        let name = file.name.clone();
        let pipeline = self.clone();
        tokio::task::spawn_blocking(move || pipeline.compress_to_target(&file))
            .await
            .map_err(|e| CompressionError::Worker {
                name,
                reason: e.to_string(),
            })?
            .map_err(PipelineError::from)
    }

    fn decode(file: &MediaAsset) -> Result<DynamicImage, CompressionError> {
        let decode_error = |e: &dyn std::fmt::Display| CompressionError::Decode {
            name: file.name.clone(),
            reason: e.to_string(),
        };
        let reader = ImageReader::new(Cursor::new(&file.data[..]))
            .with_guessed_format()
            .map_err(|e| decode_error(&e))?;
        reader.decode().map_err(|e| decode_error(&e))
    }

    /// Re-encode an image toward the configured target size.
    pub fn compress_to_target(&self, file: &MediaAsset) -> Result<PreparedAsset, CompressionError> {
        let original = Self::decode(file)?;
        let (natural_width, natural_height) = original.dimensions();
        let ceiling = self.config.accept_ceiling_bytes();

        tracing::debug!(
            name = %file.name,
            width = natural_width,
            height = natural_height,
            size_bytes = file.size_bytes(),
            ceiling_bytes = ceiling,
            resampler = self.resampler.name(),
            "Preparing image"
        );

        let mut state = CompressState::Encoding {
            width: natural_width as f64,
            height: natural_height as f64,
            raster: original.clone(),
            quality: self.config.initial_quality,
            iteration: 1,
        };

        loop {
            state = match state {
                CompressState::Encoding {
                    raster,
                    width,
                    height,
                    quality,
                    iteration,
                } => {
                    if iteration > self.config.max_iterations {
                        tracing::warn!(
                            name = %file.name,
                            max_iterations = self.config.max_iterations,
                            "Iteration cap reached before quality floor"
                        );
                        CompressState::Fallback { raster }
                    } else {
                        match self.encoder.encode_webp(&raster, quality) {
                            Err(e) => CompressState::Failed(CompressionError::Encode {
                                name: file.name.clone(),
                                reason: e.to_string(),
                            }),
                            Ok(data) if data.is_empty() => {
                                CompressState::Failed(CompressionError::Encode {
                                    name: file.name.clone(),
                                    reason: "Failed to create WebP output".to_string(),
                                })
                            }
                            Ok(data) => {
                                let (w, h) = raster.dimensions();
                                tracing::debug!(
                                    iteration,
                                    quality,
                                    width = w,
                                    height = h,
                                    size_bytes = data.len(),
                                    "Encoded WebP candidate"
                                );
                                if data.len() <= ceiling {
                                    CompressState::Done(PreparedAsset::encoded(
                                        &file.name,
                                        PreparedFormat::WebP,
                                        data,
                                    ))
                                } else {
                                    CompressState::Shrinking {
                                        raster,
                                        width,
                                        height,
                                        quality,
                                        iteration,
                                    }
                                }
                            }
                        }
                    }
                }
                CompressState::Shrinking {
                    raster,
                    width,
                    height,
                    quality,
                    iteration,
                } => {
                    let next_quality = quality.saturating_sub(self.config.quality_step);
                    if next_quality <= self.config.min_quality {
                        CompressState::Fallback { raster }
                    } else {
                        let width = width * self.config.shrink_factor;
                        let height = height * self.config.shrink_factor;
                        let target_w = (width.floor() as u32).max(1);
                        let target_h = (height.floor() as u32).max(1);
                        match self.resampler.resample(&original, target_w, target_h) {
                            Ok(raster) => CompressState::Encoding {
                                raster,
                                width,
                                height,
                                quality: next_quality,
                                iteration: iteration + 1,
                            },
                            Err(e) => CompressState::Failed(CompressionError::Encode {
                                name: file.name.clone(),
                                reason: e.to_string(),
                            }),
                        }
                    }
                }
                CompressState::Fallback { raster } => {
                    let (w, h) = raster.dimensions();
                    tracing::info!(
                        name = %file.name,
                        width = w,
                        height = h,
                        quality = self.config.fallback_quality,
                        "WebP search exhausted, falling back to JPEG"
                    );
                    match self.encoder.encode_jpeg(&raster, self.config.fallback_quality) {
                        Ok(data) if !data.is_empty() => CompressState::Done(
                            PreparedAsset::encoded(&file.name, PreparedFormat::Jpeg, data),
                        ),
                        Ok(_) => CompressState::Failed(CompressionError::Exhausted {
                            name: file.name.clone(),
                        }),
                        Err(e) => {
                            tracing::warn!(name = %file.name, error = %e, "JPEG fallback failed");
                            CompressState::Failed(CompressionError::Exhausted {
                                name: file.name.clone(),
                            })
                        }
                    }
                }
                CompressState::Done(prepared) => {
                    tracing::debug!(
                        name = %prepared.name,
                        mime_type = prepared.mime_type(),
                        size_bytes = prepared.size_bytes(),
                        "Image prepared"
                    );
                    return Ok(prepared);
                }
                CompressState::Failed(err) => return Err(err),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::NativeRedraw;
    use bytes::Bytes;
    use image::{ImageFormat, Rgba, RgbaImage};
    use quillpost_core::ValidationError;
    use std::sync::Mutex;

    /// Encoder whose output size is scripted from quality and pixel count.
    struct ScriptedEncoder {
        webp_size: Box<dyn Fn(u8, u32, u32) -> usize + Send + Sync>,
        jpeg_size: usize,
        calls: Mutex<Vec<(&'static str, u8, u32, u32)>>,
    }

    impl ScriptedEncoder {
        fn new(webp_size: impl Fn(u8, u32, u32) -> usize + Send + Sync + 'static) -> Self {
            Self {
                webp_size: Box::new(webp_size),
                jpeg_size: 1000,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(&'static str, u8, u32, u32)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ImageEncoder for ScriptedEncoder {
        fn encode_webp(&self, img: &DynamicImage, quality: u8) -> anyhow::Result<Bytes> {
            let (w, h) = img.dimensions();
            self.calls.lock().unwrap().push(("webp", quality, w, h));
            Ok(Bytes::from(vec![0u8; (self.webp_size)(quality, w, h)]))
        }

        fn encode_jpeg(&self, img: &DynamicImage, quality: u8) -> anyhow::Result<Bytes> {
            let (w, h) = img.dimensions();
            self.calls.lock().unwrap().push(("jpeg", quality, w, h));
            Ok(Bytes::from(vec![0u8; self.jpeg_size]))
        }
    }

    fn png_asset(name: &str, width: u32, height: u32) -> MediaAsset {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
        });
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        MediaAsset::new(name, "image/png", buffer)
    }

    fn scripted_pipeline(encoder: Arc<ScriptedEncoder>) -> MediaPipeline {
        MediaPipeline::with_components(
            PipelineConfig::default(),
            Arc::new(NativeRedraw),
            encoder,
        )
    }

    #[test]
    fn accepts_first_encoding_under_ceiling() {
        let encoder = Arc::new(ScriptedEncoder::new(|_, _, _| 40 * 1024));
        let pipeline = scripted_pipeline(encoder.clone());

        let prepared = pipeline
            .prepare(Some(&png_asset("shot.png", 100, 80)), MediaKind::Image)
            .unwrap();

        assert_eq!(prepared.format, PreparedFormat::WebP);
        assert_eq!(prepared.name, "shot.webp");
        assert_eq!(encoder.calls(), vec![("webp", 90, 100, 80)]);
    }

    #[test]
    fn accepts_overshoot_up_to_twenty_percent() {
        let encoder = Arc::new(ScriptedEncoder::new(|_, _, _| 61_440));
        let pipeline = scripted_pipeline(encoder.clone());
        let prepared = pipeline
            .prepare(Some(&png_asset("a.png", 10, 10)), MediaKind::Image)
            .unwrap();
        assert_eq!(prepared.format, PreparedFormat::WebP);
        assert_eq!(encoder.calls().len(), 1);
    }

    #[test]
    fn shrinks_and_lowers_quality_until_it_fits() {
        // Fits once quality drops to 60.
        let encoder = Arc::new(ScriptedEncoder::new(|q, _, _| {
            if q <= 60 {
                10 * 1024
            } else {
                200 * 1024
            }
        }));
        let pipeline = scripted_pipeline(encoder.clone());

        let prepared = pipeline
            .prepare(Some(&png_asset("wide.png", 1000, 500)), MediaKind::Image)
            .unwrap();

        assert_eq!(prepared.format, PreparedFormat::WebP);
        assert_eq!(
            encoder.calls(),
            vec![
                ("webp", 90, 1000, 500),
                ("webp", 80, 900, 450),
                ("webp", 70, 810, 405),
                ("webp", 60, 729, 364),
            ]
        );
    }

    #[test]
    fn falls_back_to_jpeg_after_eight_webp_attempts() {
        let encoder = Arc::new(ScriptedEncoder::new(|_, _, _| 500 * 1024));
        let pipeline = scripted_pipeline(encoder.clone());

        let prepared = pipeline
            .prepare(Some(&png_asset("huge.gif.png", 200, 100)), MediaKind::Image)
            .unwrap();

        assert_eq!(prepared.format, PreparedFormat::Jpeg);
        assert_eq!(prepared.name, "huge.gif.jpg");

        let calls = encoder.calls();
        let webp: Vec<u8> = calls
            .iter()
            .filter(|c| c.0 == "webp")
            .map(|c| c.1)
            .collect();
        assert_eq!(webp, vec![90, 80, 70, 60, 50, 40, 30, 20]);

        // JPEG fallback at the last tried dimensions.
        let last_webp = calls[calls.len() - 2];
        let jpeg = calls[calls.len() - 1];
        assert_eq!(jpeg.0, "jpeg");
        assert_eq!(jpeg.1, 80);
        assert_eq!((jpeg.2, jpeg.3), (last_webp.2, last_webp.3));
    }

    #[test]
    fn empty_fallback_is_a_compression_error() {
        let mut encoder = ScriptedEncoder::new(|_, _, _| 500 * 1024);
        encoder.jpeg_size = 0;
        let pipeline = scripted_pipeline(Arc::new(encoder));

        let err = pipeline
            .prepare(Some(&png_asset("x.png", 20, 20)), MediaKind::Image)
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::Compression(CompressionError::Exhausted {
                name: "x.png".to_string()
            })
        );
    }

    #[test]
    fn iteration_cap_forces_fallback() {
        let encoder = Arc::new(ScriptedEncoder::new(|_, _, _| 500 * 1024));
        let config = PipelineConfig {
            max_iterations: 3,
            ..PipelineConfig::default()
        };
        let pipeline =
            MediaPipeline::with_components(config, Arc::new(NativeRedraw), encoder.clone());

        let prepared = pipeline
            .prepare(Some(&png_asset("x.png", 50, 50)), MediaKind::Image)
            .unwrap();
        assert_eq!(prepared.format, PreparedFormat::Jpeg);
        let webp_calls = encoder.calls().iter().filter(|c| c.0 == "webp").count();
        assert_eq!(webp_calls, 3);
    }

    #[test]
    fn tiny_images_never_shrink_below_one_pixel() {
        let encoder = Arc::new(ScriptedEncoder::new(|_, _, _| 500 * 1024));
        let pipeline = scripted_pipeline(encoder.clone());
        pipeline
            .prepare(Some(&png_asset("dot.png", 1, 1)), MediaKind::Image)
            .unwrap();
        assert!(encoder.calls().iter().all(|c| c.2 == 1 && c.3 == 1));
    }

    #[test]
    fn oversize_input_does_no_encoding_work() {
        let encoder = Arc::new(ScriptedEncoder::new(|_, _, _| 1));
        let pipeline = scripted_pipeline(encoder.clone());
        let big = MediaAsset::new("big.png", "image/png", vec![0u8; 3 * 1024 * 1024]);

        let err = pipeline.prepare(Some(&big), MediaKind::Image).unwrap_err();
        assert_eq!(err.to_string(), "File size exceeds 2MB");
        assert!(encoder.calls().is_empty());
    }

    #[test]
    fn undecodable_image_is_a_compression_error() {
        let pipeline = MediaPipeline::new(PipelineConfig::default());
        let junk = MediaAsset::new("junk.png", "image/png", b"definitely not a png".to_vec());
        let err = pipeline.prepare(Some(&junk), MediaKind::Image).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Compression(CompressionError::Decode { .. })
        ));
    }

    #[test]
    fn videos_pass_through_unchanged() {
        let pipeline = MediaPipeline::new(PipelineConfig::default());
        let clip = MediaAsset::new("clip.webm", "video/webm", vec![7u8; 4096]);
        let prepared = pipeline.prepare(Some(&clip), MediaKind::Video).unwrap();
        assert_eq!(prepared.name, "clip.webm");
        assert_eq!(prepared.mime_type(), "video/webm");
        assert_eq!(prepared.data, clip.data);
    }

    #[test]
    fn missing_file_is_a_validation_error() {
        let pipeline = MediaPipeline::new(PipelineConfig::default());
        assert_eq!(
            pipeline.prepare(None, MediaKind::Video).unwrap_err(),
            PipelineError::Validation(ValidationError::NoFile)
        );
    }

    #[tokio::test]
    async fn prepare_async_matches_sync() {
        let pipeline = MediaPipeline::new(PipelineConfig::default());
        let asset = png_asset("async.png", 64, 64);

        let prepared = pipeline
            .prepare_async(Some(asset.clone()), MediaKind::Image)
            .await
            .unwrap();
        assert_eq!(prepared.format, PreparedFormat::WebP);
        assert!(prepared.size_bytes() <= pipeline.config().accept_ceiling_bytes());

        let err = pipeline.prepare_async(None, MediaKind::Image).await.unwrap_err();
        assert_eq!(err, PipelineError::Validation(ValidationError::NoFile));

        let clip = MediaAsset::new("clip.mp4", "video/mp4", vec![7u8; 32]);
        let passed = pipeline
            .prepare_async(Some(clip.clone()), MediaKind::Video)
            .await
            .unwrap();
        assert_eq!(passed, PreparedAsset::original(clip));
    }
}
