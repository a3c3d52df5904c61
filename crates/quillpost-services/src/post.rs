//! Post submission: upload local media referenced by a draft, assemble the
//! payload and hand it to the dispatcher.

use quillpost_api_client::PostDispatcher;
use quillpost_core::models::{guess_mime_type, DraftError, MediaAsset, MediaRef, MediaSource};
use quillpost_core::PostDraft;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::media::{MediaService, MediaSlot, SlotOutcome};

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Draft(#[from] DraftError),

    #[error("Failed to read {}: {reason}", .path.display())]
    Read { path: PathBuf, reason: String },

    #[error("{0}")]
    Media(String),

    #[error("Error adding post: {0}")]
    Dispatch(String),
}

pub struct PostService {
    media: MediaService,
    dispatcher: Arc<dyn PostDispatcher>,
}

impl PostService {
    pub fn new(media: MediaService, dispatcher: Arc<dyn PostDispatcher>) -> Self {
        Self { media, dispatcher }
    }

    pub fn media(&self) -> &MediaService {
        &self.media
    }

    /// Upload every media field of `draft` that still points at a local file,
    /// replacing it with the uploaded reference. Relative paths resolve
    /// against `base_dir`.
    pub async fn resolve_local_media(
        &self,
        draft: &mut PostDraft,
        base_dir: &Path,
        uploader_id: Option<&str>,
    ) -> Result<usize, SubmitError> {
        let category = draft.category.clone();
        let mut uploaded = 0;

        for (index, (kind, field)) in draft.media_fields_mut().into_iter().enumerate() {
            let Some(MediaSource::Local { path }) = field.as_ref() else {
                continue;
            };
            let full_path = base_dir.join(path);
            let asset = read_asset(&full_path).await?;

            let slot = MediaSlot::new(format!("media[{}]", index), kind);
            match self
                .media
                .select(&slot, Some(asset), &category, uploader_id)
                .await
            {
                SlotOutcome::Uploaded(result) => {
                    *field = Some(MediaSource::Uploaded(MediaRef::from(result)));
                    uploaded += 1;
                }
                SlotOutcome::Failed(message) => return Err(SubmitError::Media(message)),
                SlotOutcome::Superseded => {
                    return Err(SubmitError::Media(format!(
                        "Upload of {} was superseded",
                        full_path.display()
                    )))
                }
            }
        }

        Ok(uploaded)
    }

    /// Validate, upload pending media, dispatch, then reset the draft to a
    /// blank form. The draft is left untouched apart from resolved media
    /// when any step fails.
    #[tracing::instrument(skip(self, draft, base_dir), fields(title = %draft.title))]
    pub async fn submit(
        &self,
        draft: &mut PostDraft,
        base_dir: &Path,
        user_id: Option<&str>,
    ) -> Result<serde_json::Value, SubmitError> {
        draft.validate_for_submit(user_id)?;

        let uploaded = self.resolve_local_media(draft, base_dir, user_id).await?;
        tracing::debug!(uploaded, "Local media resolved");

        let payload = draft.clone().into_payload()?;
        let response = self
            .dispatcher
            .dispatch(&payload)
            .await
            .map_err(|e| SubmitError::Dispatch(e.most_specific_message()))?;

        tracing::info!(category = %payload.category, "Post submitted");
        *draft = PostDraft::new();
        Ok(response)
    }
}

async fn read_asset(path: &Path) -> Result<MediaAsset, SubmitError> {
    let data = tokio::fs::read(path).await.map_err(|e| SubmitError::Read {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mime_type = guess_mime_type(&name).unwrap_or("application/octet-stream");
    Ok(MediaAsset::new(name, mime_type, data))
}
