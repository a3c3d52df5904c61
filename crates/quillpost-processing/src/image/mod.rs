//! Image raster helpers for the preparation pipeline.

pub mod resampler;

pub use resampler::{
    select_resampler, FallbackResampler, LanczosResampler, NativeRedraw, ResampleError, Resampler,
};
