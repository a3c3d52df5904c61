use quillpost_core::models::{MediaAsset, MediaKind};
use quillpost_core::{PipelineConfig, ValidationError};

/// Media file validator
///
/// Checks run in a fixed order and stop at the first failure: presence,
/// size ceiling, content type, then emptiness.
pub struct MediaValidator {
    kind: MediaKind,
    max_file_size: usize,
    allowed_content_types: &'static [&'static str],
}

impl MediaValidator {
    pub fn new(kind: MediaKind, max_file_size: usize) -> Self {
        Self {
            kind,
            max_file_size,
            allowed_content_types: kind.allowed_mime_types(),
        }
    }

    /// Validator with the configured ceiling for `kind`.
    pub fn for_kind(kind: MediaKind, config: &PipelineConfig) -> Self {
        let max = match kind {
            MediaKind::Image => config.max_image_bytes,
            MediaKind::Video => config.max_video_bytes,
        };
        Self::new(kind, max)
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    /// Validate file size
    pub fn validate_file_size(&self, size: usize) -> Result<(), ValidationError> {
        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }
        Ok(())
    }

    /// Validate content type
    pub fn validate_content_type(&self, content_type: &str) -> Result<(), ValidationError> {
        let normalized = content_type.trim().to_lowercase();

        if !self.allowed_content_types.iter().any(|ct| *ct == normalized) {
            return Err(ValidationError::UnsupportedFormat {
                kind: self.kind,
                mime_type: content_type.to_string(),
            });
        }
        Ok(())
    }

    /// Validate all aspects of a selection.
    pub fn validate<'a>(
        &self,
        file: Option<&'a MediaAsset>,
    ) -> Result<&'a MediaAsset, ValidationError> {
        let file = file.ok_or(ValidationError::NoFile)?;
        self.validate_present(file)?;
        Ok(file)
    }

    /// Like [`MediaValidator::validate`], handing the owned file back.
    pub fn validate_owned(
        &self,
        file: Option<MediaAsset>,
    ) -> Result<MediaAsset, ValidationError> {
        let file = file.ok_or(ValidationError::NoFile)?;
        self.validate_present(&file)?;
        Ok(file)
    }

    fn validate_present(&self, file: &MediaAsset) -> Result<(), ValidationError> {
        self.validate_file_size(file.size_bytes())?;
        self.validate_content_type(&file.mime_type)?;
        if file.size_bytes() == 0 {
            return Err(ValidationError::EmptyFile);
        }
        Ok(())
    }
}
