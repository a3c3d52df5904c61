//! Media slots: one per media field of the post form.
//!
//! Selecting a file runs validate → prepare → preview → upload and leaves
//! either an [`UploadResult`] or a single human-readable error in the slot.
//! Every selection takes a ticket; a result whose ticket is no longer the
//! slot's current one belongs to a superseded selection and is dropped.

use quillpost_api_client::{PreviewHandle, UploadCoordinator};
use quillpost_core::models::{MediaAsset, MediaKind, UploadResult};
use quillpost_core::{ClientConfig, LogLevel, PipelineConfig, PipelineError};
use quillpost_processing::MediaPipeline;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ticket(u64);

#[derive(Debug, Default)]
struct SlotState {
    generation: u64,
    preview: Option<PreviewHandle>,
    result: Option<UploadResult>,
    error: Option<String>,
    in_flight: bool,
}

/// Point-in-time view of a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSnapshot {
    pub path: String,
    pub kind: MediaKind,
    pub preview_url: Option<String>,
    pub result: Option<UploadResult>,
    pub error: Option<String>,
    pub in_flight: bool,
}

/// A media field of the form, e.g. `titleImage` or `subtitles[0].image`.
#[derive(Debug)]
pub struct MediaSlot {
    path: String,
    kind: MediaKind,
    state: Mutex<SlotState>,
}

impl MediaSlot {
    pub fn new(path: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            path: path.into(),
            kind,
            state: Mutex::new(SlotState::default()),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn begin(&self) -> Ticket {
        let mut state = self.lock();
        state.generation += 1;
        state.error = None;
        state.in_flight = true;
        Ticket(state.generation)
    }

    /// Runs `register` and keeps its handle only while `ticket` is current.
    /// The slot stays locked across both, so a superseded selection never
    /// touches the preview registry.
    fn attach_preview_with<F>(&self, ticket: Ticket, register: F) -> bool
    where
        F: FnOnce() -> PreviewHandle,
    {
        let mut state = self.lock();
        if state.generation != ticket.0 {
            return false;
        }
        state.preview = Some(register());
        true
    }

    fn finish(&self, ticket: Ticket, outcome: Result<UploadResult, String>) -> bool {
        let mut state = self.lock();
        if state.generation != ticket.0 {
            return false;
        }
        state.in_flight = false;
        match outcome {
            Ok(result) => {
                state.result = Some(result);
                state.error = None;
            }
            Err(message) => state.error = Some(message),
        }
        true
    }

    /// Forget the selection, releasing its preview. In-flight work for
    /// this slot is discarded when it completes.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.generation += 1;
        state.preview = None;
        state.result = None;
        state.error = None;
        state.in_flight = false;
    }

    pub fn result(&self) -> Option<UploadResult> {
        self.lock().result.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    pub fn snapshot(&self) -> SlotSnapshot {
        let state = self.lock();
        SlotSnapshot {
            path: self.path.clone(),
            kind: self.kind,
            preview_url: state.preview.as_ref().map(PreviewHandle::url),
            result: state.result.clone(),
            error: state.error.clone(),
            in_flight: state.in_flight,
        }
    }
}

/// How a selection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotOutcome {
    Uploaded(UploadResult),
    Failed(String),
    /// A newer selection took over the slot; this result was dropped.
    Superseded,
}

/// Runs selections through the pipeline and the coordinator.
#[derive(Clone)]
pub struct MediaService {
    pipeline: MediaPipeline,
    coordinator: UploadCoordinator,
}

impl MediaService {
    pub fn new(pipeline: MediaPipeline, coordinator: UploadCoordinator) -> Self {
        Self {
            pipeline,
            coordinator,
        }
    }

    pub fn from_config(
        pipeline_config: PipelineConfig,
        client_config: &ClientConfig,
    ) -> anyhow::Result<Self> {
        Ok(Self::new(
            MediaPipeline::new(pipeline_config),
            UploadCoordinator::from_config(client_config)?,
        ))
    }

    pub fn pipeline(&self) -> &MediaPipeline {
        &self.pipeline
    }

    pub fn coordinator(&self) -> &UploadCoordinator {
        &self.coordinator
    }

    /// Handle a file picked for `slot`.
    #[tracing::instrument(
        skip(self, slot, file, uploader_id),
        fields(slot = %slot.path(), kind = %slot.kind())
    )]
    pub async fn select(
        &self,
        slot: &MediaSlot,
        file: Option<MediaAsset>,
        category: &str,
        uploader_id: Option<&str>,
    ) -> SlotOutcome {
        let ticket = slot.begin();
        let kind = slot.kind();
        let name = file.as_ref().map(|f| f.name.clone()).unwrap_or_default();

        let prepared = match self.pipeline.prepare_async(file, kind).await {
            Ok(prepared) => prepared,
            Err(err) => {
                let message = match &err {
                    PipelineError::Validation(e) => e.to_string(),
                    PipelineError::Compression(e) => {
                        format!("Error compressing {} {}: {}", kind, name, e)
                    }
                };
                match err.log_level() {
                    LogLevel::Debug => tracing::debug!(error = %err, "Selection rejected"),
                    LogLevel::Warn => tracing::warn!(error = %err, "Media preparation failed"),
                    LogLevel::Error => tracing::error!(error = %err, "Media preparation failed"),
                }
                return Self::settle(slot, ticket, Err(message));
            }
        };

        let attached = slot.attach_preview_with(ticket, || {
            self.coordinator.preview(slot.path(), &prepared)
        });
        if !attached {
            tracing::debug!("Discarding preview of superseded selection");
            return SlotOutcome::Superseded;
        }

        let outcome = self
            .coordinator
            .upload(&prepared, kind, category, uploader_id)
            .await
            .map_err(|e| {
                tracing::warn!(attempts = e.attempts, error = %e, "Upload failed");
                format!("Error uploading {} {}: {}", kind, name, e)
            });
        Self::settle(slot, ticket, outcome)
    }

    fn settle(
        slot: &MediaSlot,
        ticket: Ticket,
        outcome: Result<UploadResult, String>,
    ) -> SlotOutcome {
        if !slot.finish(ticket, outcome.clone()) {
            tracing::debug!("Discarding result of superseded selection");
            return SlotOutcome::Superseded;
        }
        match outcome {
            Ok(result) => SlotOutcome::Uploaded(result),
            Err(message) => SlotOutcome::Failed(message),
        }
    }
}
