//! Error types module
//!
//! Three failure families reach the author: bad input ([`ValidationError`]),
//! a re-encode search that produced nothing usable ([`CompressionError`]) and
//! an upload that failed on every attempt ([`UploadError`]). Only the last one
//! is ever retried, and that happens inside the coordinator before it surfaces.

use crate::models::MediaKind;

const MIB: usize = 1024 * 1024;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected errors like validation failures
    Debug,
    /// Recoverable issues the author can fix by picking another file
    Warn,
    /// Unexpected failures
    Error,
}

/// Rejection of a selected file before any encoding or network work.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("No file selected")]
    NoFile,

    #[error("File size exceeds {}MB", .max / MIB)]
    FileTooLarge { size: usize, max: usize },

    #[error("Invalid {kind} format")]
    UnsupportedFormat { kind: MediaKind, mime_type: String },

    #[error("Empty file")]
    EmptyFile,
}

/// The re-encode pipeline could not produce output.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompressionError {
    #[error("Failed to load image: {name}: {reason}")]
    Decode { name: String, reason: String },

    #[error("Compression failed for {name}: {reason}")]
    Encode { name: String, reason: String },

    #[error("Failed to compress {name} to target size")]
    Exhausted { name: String },

    #[error("Image processing failed for {name}: {reason}")]
    Worker { name: String, reason: String },
}

/// Upload failed on every attempt of the retry budget.
///
/// `message` is the most specific text available from the last attempt: a
/// backend-provided error message when there was one, otherwise the
/// transport or status description.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct UploadError {
    pub message: String,
    pub attempts: u32,
}

impl UploadError {
    pub fn new(message: impl Into<String>, attempts: u32) -> Self {
        Self {
            message: message.into(),
            attempts,
        }
    }
}

/// Everything `prepare` can fail with.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Compression(#[from] CompressionError),
}

impl PipelineError {
    /// Log level for this error
    pub fn log_level(&self) -> LogLevel {
        match self {
            PipelineError::Validation(_) => LogLevel::Debug,
            PipelineError::Compression(CompressionError::Worker { .. }) => LogLevel::Error,
            PipelineError::Compression(_) => LogLevel::Warn,
        }
    }
}
