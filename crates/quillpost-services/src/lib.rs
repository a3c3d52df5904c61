//! Quillpost Services Layer
//!
//! Orchestration on top of the preparation pipeline and the upload
//! coordinator: media slots (prepare, preview, upload, error reporting,
//! stale-result discard) and post submission. Front ends depend on this
//! facade rather than wiring the pieces themselves.

pub mod media;
pub mod post;

pub use media::{MediaService, MediaSlot, SlotOutcome, SlotSnapshot};
pub use post::{PostService, SubmitError};
pub use quillpost_api_client::{
    HttpPostDispatcher, PostDispatcher, PreviewRegistry, RetryPolicy, UploadCoordinator,
};
pub use quillpost_processing::MediaPipeline;
