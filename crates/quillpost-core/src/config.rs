//! Configuration module
//!
//! Backend endpoints and media limits are injected through these structs
//! rather than baked into the upload and preparation logic. Both load from
//! `QUILLPOST_*` environment variables (after reading a `.env` file, if any).

use std::env;

// Common constants
const KIB: usize = 1024;
const MIB: usize = 1024 * 1024;
const IMAGE_TARGET_KB: usize = 50;
const MAX_IMAGE_SIZE_MB: usize = 2;
const MAX_VIDEO_SIZE_MB: usize = 50;
const REQUEST_TIMEOUT_SECS: u64 = 60;
const UPLOAD_MAX_ATTEMPTS: u32 = 3;
const BACKOFF_STEP_MS: u64 = 1000;

/// Media preparation limits and re-encode tuning.
///
/// Qualities are percentages (0-100) so the re-encode loop steps in whole
/// numbers and always runs the same number of iterations.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    /// Size the WebP search aims for
    pub image_target_bytes: usize,
    /// An encoding up to `target × overshoot_factor` is accepted
    pub overshoot_factor: f64,
    pub initial_quality: u8,
    pub quality_step: u8,
    /// The search stops once quality drops to this value or below
    pub min_quality: u8,
    /// Quality of the one-shot JPEG fallback
    pub fallback_quality: u8,
    /// Applied to both dimensions after every rejected encoding
    pub shrink_factor: f64,
    pub max_image_bytes: usize,
    pub max_video_bytes: usize,
    /// Hard cap on encode iterations, independent of the quality schedule
    pub max_iterations: u32,
    /// Prefer the Lanczos resampler over a nearest-neighbour redraw
    pub high_quality_resize: bool,
    /// Largest output (in pixels) the high-quality resampler will take on
    pub high_quality_pixel_budget: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            image_target_bytes: IMAGE_TARGET_KB * KIB,
            overshoot_factor: 1.2,
            initial_quality: 90,
            quality_step: 10,
            min_quality: 10,
            fallback_quality: 80,
            shrink_factor: 0.9,
            max_image_bytes: MAX_IMAGE_SIZE_MB * MIB,
            max_video_bytes: MAX_VIDEO_SIZE_MB * MIB,
            max_iterations: 16,
            high_quality_resize: true,
            high_quality_pixel_budget: 40_000_000,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let image_target_kb = parse_or(&lookup, "QUILLPOST_IMAGE_TARGET_KB", IMAGE_TARGET_KB)?;
        let max_image_mb = parse_or(&lookup, "QUILLPOST_MAX_IMAGE_SIZE_MB", MAX_IMAGE_SIZE_MB)?;
        let max_video_mb = parse_or(&lookup, "QUILLPOST_MAX_VIDEO_SIZE_MB", MAX_VIDEO_SIZE_MB)?;

        let high_quality_resize = match lookup("QUILLPOST_RESAMPLER") {
            None => defaults.high_quality_resize,
            Some(value) => match value.trim().to_lowercase().as_str() {
                "lanczos" | "high" => true,
                "nearest" | "native" => false,
                other => {
                    return Err(anyhow::anyhow!(
                        "QUILLPOST_RESAMPLER must be 'lanczos' or 'nearest', got '{}'",
                        other
                    ))
                }
            },
        };

        let config = Self {
            image_target_bytes: image_target_kb * KIB,
            max_image_bytes: max_image_mb * MIB,
            max_video_bytes: max_video_mb * MIB,
            high_quality_resize,
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.image_target_bytes == 0 {
            return Err(anyhow::anyhow!("Image target size must be greater than zero"));
        }
        if !(0.0..1.0).contains(&self.shrink_factor) || self.shrink_factor == 0.0 {
            return Err(anyhow::anyhow!(
                "Shrink factor must be between 0 and 1, got {}",
                self.shrink_factor
            ));
        }
        if self.overshoot_factor < 1.0 {
            return Err(anyhow::anyhow!(
                "Overshoot factor must be at least 1.0, got {}",
                self.overshoot_factor
            ));
        }
        if self.quality_step == 0 || self.initial_quality > 100 || self.fallback_quality > 100 {
            return Err(anyhow::anyhow!("Quality settings must lie within 0-100 with a non-zero step"));
        }
        if self.max_iterations == 0 {
            return Err(anyhow::anyhow!("max_iterations must be at least 1"));
        }
        Ok(())
    }

    /// Largest encoding the WebP search accepts.
    pub fn accept_ceiling_bytes(&self) -> usize {
        (self.image_target_bytes as f64 * self.overshoot_factor).round() as usize
    }
}

/// Backend client configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientConfig {
    /// Base URL every backend path is joined to
    pub api_url: String,
    pub presign_path: String,
    pub metadata_path: String,
    pub create_post_path: String,
    pub request_timeout_secs: u64,
    pub max_attempts: u32,
    /// Delay before attempt k+1 is `k × backoff_step_ms`
    pub backoff_step_ms: u64,
    /// Session token sent as a bearer credential
    pub api_token: Option<String>,
    /// Uploader id recorded with metadata; "anonymous" when unset
    pub user_id: Option<String>,
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            presign_path: "/get-presigned-url".to_string(),
            metadata_path: "/store-metadata".to_string(),
            create_post_path: "/posts".to_string(),
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            max_attempts: UPLOAD_MAX_ATTEMPTS,
            backoff_step_ms: BACKOFF_STEP_MS,
            api_token: None,
            user_id: None,
        }
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup("QUILLPOST_API_URL")
            .ok_or_else(|| anyhow::anyhow!("QUILLPOST_API_URL must be set"))?;

        let mut config = Self::new(api_url);
        if let Some(path) = lookup("QUILLPOST_PRESIGN_PATH") {
            config.presign_path = path;
        }
        if let Some(path) = lookup("QUILLPOST_METADATA_PATH") {
            config.metadata_path = path;
        }
        if let Some(path) = lookup("QUILLPOST_CREATE_POST_PATH") {
            config.create_post_path = path;
        }
        config.request_timeout_secs =
            parse_or(&lookup, "QUILLPOST_REQUEST_TIMEOUT_SECS", REQUEST_TIMEOUT_SECS)?;
        config.max_attempts = parse_or(&lookup, "QUILLPOST_UPLOAD_MAX_ATTEMPTS", UPLOAD_MAX_ATTEMPTS)?;
        config.backoff_step_ms = parse_or(&lookup, "QUILLPOST_BACKOFF_STEP_MS", BACKOFF_STEP_MS)?;
        config.api_token = lookup("QUILLPOST_API_TOKEN").filter(|t| !t.trim().is_empty());
        config.user_id = lookup("QUILLPOST_USER_ID").filter(|u| !u.trim().is_empty());

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(anyhow::anyhow!(
                "QUILLPOST_API_URL must be an http(s) URL, got '{}'",
                self.api_url
            ));
        }
        if self.max_attempts == 0 {
            return Err(anyhow::anyhow!(
                "QUILLPOST_UPLOAD_MAX_ATTEMPTS must be at least 1"
            ));
        }
        for path in [&self.presign_path, &self.metadata_path, &self.create_post_path] {
            if !path.starts_with('/') {
                return Err(anyhow::anyhow!("Endpoint path '{}' must start with '/'", path));
            }
        }
        Ok(())
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, anyhow::Error>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number, got '{}'", key, raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn pipeline_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.image_target_bytes, 50 * 1024);
        assert_eq!(config.accept_ceiling_bytes(), 61_440);
        assert_eq!(config.max_image_bytes, 2 * 1024 * 1024);
        assert_eq!(config.max_video_bytes, 50 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn pipeline_from_lookup_overrides() {
        let config = PipelineConfig::from_lookup(lookup_from(&[
            ("QUILLPOST_IMAGE_TARGET_KB", "100"),
            ("QUILLPOST_RESAMPLER", "nearest"),
        ]))
        .unwrap();
        assert_eq!(config.image_target_bytes, 100 * 1024);
        assert!(!config.high_quality_resize);
        assert_eq!(config.max_image_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn pipeline_from_lookup_rejects_garbage() {
        assert!(PipelineConfig::from_lookup(lookup_from(&[(
            "QUILLPOST_IMAGE_TARGET_KB",
            "lots"
        )]))
        .is_err());
        assert!(
            PipelineConfig::from_lookup(lookup_from(&[("QUILLPOST_RESAMPLER", "bicubic")])).is_err()
        );
        assert!(
            PipelineConfig::from_lookup(lookup_from(&[("QUILLPOST_IMAGE_TARGET_KB", "0")])).is_err()
        );
    }

    #[test]
    fn client_requires_api_url() {
        let err = ClientConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("QUILLPOST_API_URL"));
    }

    #[test]
    fn client_from_lookup() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("QUILLPOST_API_URL", "https://api.example.com/prod/"),
            ("QUILLPOST_UPLOAD_MAX_ATTEMPTS", "5"),
            ("QUILLPOST_USER_ID", "user-42"),
            ("QUILLPOST_API_TOKEN", ""),
        ]))
        .unwrap();
        assert_eq!(config.api_url, "https://api.example.com/prod");
        assert_eq!(
            config.endpoint(&config.presign_path),
            "https://api.example.com/prod/get-presigned-url"
        );
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.backoff_step_ms, 1000);
        assert_eq!(config.user_id.as_deref(), Some("user-42"));
        assert_eq!(config.api_token, None);
    }

    #[test]
    fn client_validate_rejects_bad_values() {
        let mut config = ClientConfig::new("ftp://example.com");
        assert!(config.validate().is_err());

        config = ClientConfig::new("http://localhost:3000");
        config.max_attempts = 0;
        assert!(config.validate().is_err());

        config = ClientConfig::new("http://localhost:3000");
        config.metadata_path = "store-metadata".to_string();
        assert!(config.validate().is_err());
    }
}
