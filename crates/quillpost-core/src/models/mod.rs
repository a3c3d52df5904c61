//! Data models for the application
//!
//! Media values flow one way: a selected [`MediaAsset`] becomes a
//! [`PreparedAsset`], which is uploaded into an [`UploadResult`]. The post
//! models describe the draft an author edits and the payload it turns into.

mod media;
mod post;
mod upload;

pub use media::*;
pub use post::*;
pub use upload::*;
