//! Quillpost Core Library
//!
//! This crate provides the domain models, error types, configuration, content
//! hashing and snippet sanitization shared across all Quillpost components.

pub mod config;
pub mod error;
pub mod hash;
pub mod models;
pub mod sanitize;

// Re-export commonly used types
pub use config::{ClientConfig, PipelineConfig};
pub use error::{CompressionError, LogLevel, PipelineError, UploadError, ValidationError};
pub use hash::ContentHash;
pub use models::{
    MediaAsset, MediaKind, MediaRef, PostDraft, PostPayload, PreparedAsset, PreparedFormat,
    UploadAttempt, UploadResult,
};
pub use sanitize::sanitize_code_snippet;
