//! Quillpost Media Preparation Library
//!
//! This crate turns a selected file into something worth uploading: it
//! validates the file for its media kind and, for images, re-encodes it
//! toward a byte budget.

pub mod compression;
pub mod image;
pub mod pipeline;
pub mod validator;

// Re-export commonly used types
pub use compression::{ImageCompressor, ImageEncoder};
pub use crate::image::{
    select_resampler, FallbackResampler, LanczosResampler, NativeRedraw, Resampler,
};
pub use pipeline::MediaPipeline;
pub use validator::MediaValidator;
