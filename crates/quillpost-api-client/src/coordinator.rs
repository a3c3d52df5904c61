//! Upload coordinator: hash, presign, transfer, register, verify, with retry.

use quillpost_core::models::{
    MediaKind, MetadataRecord, PreparedAsset, PresignRequest, UploadAttempt, UploadResult,
};
use quillpost_core::{ClientConfig, ContentHash, UploadError};
use std::sync::Arc;

use crate::backend::{HttpUploadBackend, UploadBackend};
use crate::error::ClientError;
use crate::preview::{PreviewHandle, PreviewRegistry};
use crate::retry::{retry_with_observer, RetryExhausted, RetryPolicy};

const ANONYMOUS_USER: &str = "anonymous";

/// Moves prepared media to object storage through the backend.
#[derive(Clone)]
pub struct UploadCoordinator {
    backend: Arc<dyn UploadBackend>,
    policy: RetryPolicy,
    previews: PreviewRegistry,
}

impl UploadCoordinator {
    pub fn new(backend: Arc<dyn UploadBackend>, policy: RetryPolicy) -> Self {
        Self {
            backend,
            policy,
            previews: PreviewRegistry::new(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> anyhow::Result<Self> {
        Ok(Self::new(
            Arc::new(HttpUploadBackend::from_config(config)?),
            RetryPolicy::from_config(config),
        ))
    }

    pub fn with_previews(mut self, previews: PreviewRegistry) -> Self {
        self.previews = previews;
        self
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Register a local preview for `prepared` in `slot`. Call this before
    /// starting the upload so the author sees the file immediately.
    pub fn preview(&self, slot: &str, prepared: &PreparedAsset) -> PreviewHandle {
        self.previews.register(slot, prepared)
    }

    /// Upload `prepared`, retrying the whole sequence per the policy.
    ///
    /// The content hash is computed once and shared by every attempt.
    pub async fn upload(
        &self,
        prepared: &PreparedAsset,
        kind: MediaKind,
        category: &str,
        uploader_id: Option<&str>,
    ) -> Result<UploadResult, UploadError> {
        self.upload_observed(prepared, kind, category, uploader_id, |_| {})
            .await
    }

    /// Same as [`UploadCoordinator::upload`], reporting every attempt.
    pub async fn upload_observed<O>(
        &self,
        prepared: &PreparedAsset,
        kind: MediaKind,
        category: &str,
        uploader_id: Option<&str>,
        observer: O,
    ) -> Result<UploadResult, UploadError>
    where
        O: FnMut(&UploadAttempt),
    {
        let content_hash = ContentHash::of(&prepared.data);
        let user_id = uploader_id
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(ANONYMOUS_USER);

        tracing::info!(
            name = %prepared.name,
            kind = %kind,
            size_bytes = prepared.size_bytes(),
            hash = %content_hash,
            "Starting upload"
        );

        let result = retry_with_observer(
            &self.policy,
            |attempt| {
                self.attempt(prepared, kind, category, user_id, &content_hash, attempt)
            },
            observer,
        )
        .await;

        match result {
            Ok(public_url) => {
                tracing::info!(name = %prepared.name, public_url = %public_url, "Upload complete");
                Ok(UploadResult {
                    public_url,
                    content_hash,
                })
            }
            Err(RetryExhausted {
                last_error,
                attempts,
            }) => Err(UploadError::new(
                last_error.most_specific_message(),
                attempts,
            )),
        }
    }

    async fn attempt(
        &self,
        prepared: &PreparedAsset,
        kind: MediaKind,
        category: &str,
        user_id: &str,
        content_hash: &ContentHash,
        attempt: u32,
    ) -> Result<String, ClientError> {
        let file_type = prepared.mime_type().to_string();

        let location = self
            .backend
            .request_write_location(&PresignRequest {
                file_type: file_type.clone(),
                folder: kind.folder().to_string(),
                category: category.to_string(),
            })
            .await?;
        tracing::debug!(attempt, key = %location.key, "Write location issued");

        self.backend
            .transfer(&location.signed_url, &file_type, prepared.data.clone())
            .await?;

        self.backend
            .store_metadata(&MetadataRecord {
                file_key: location.key.clone(),
                file_hash: content_hash.clone(),
                file_type: kind.folder().to_string(),
                category: category.to_string(),
                user_id: user_id.to_string(),
            })
            .await?;

        self.backend.check_reachable(&location.public_url).await?;
        Ok(location.public_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use quillpost_core::models::{PreparedFormat, PresignResponse};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Backend whose reachability answers are scripted; every other call
    /// succeeds unless `presign_error` is set.
    #[derive(Default)]
    struct ScriptedBackend {
        presign_error: Option<ClientError>,
        reachability: Mutex<VecDeque<u16>>,
        calls: Mutex<Vec<String>>,
        metadata: Mutex<Vec<MetadataRecord>>,
    }

    impl ScriptedBackend {
        fn with_reachability(statuses: &[u16]) -> Self {
            Self {
                reachability: Mutex::new(statuses.iter().copied().collect()),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl UploadBackend for ScriptedBackend {
        async fn request_write_location(
            &self,
            request: &PresignRequest,
        ) -> Result<PresignResponse, ClientError> {
            self.calls.lock().unwrap().push(format!("presign {}", request.folder));
            if let Some(err) = &self.presign_error {
                return Err(err.clone());
            }
            Ok(PresignResponse {
                signed_url: "http://store/put".to_string(),
                public_url: "http://cdn/a.webp".to_string(),
                key: "images/a.webp".to_string(),
            })
        }

        async fn transfer(
            &self,
            _signed_url: &str,
            content_type: &str,
            _data: Bytes,
        ) -> Result<(), ClientError> {
            self.calls.lock().unwrap().push(format!("put {}", content_type));
            Ok(())
        }

        async fn store_metadata(&self, record: &MetadataRecord) -> Result<(), ClientError> {
            self.calls.lock().unwrap().push("metadata".to_string());
            self.metadata.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn check_reachable(&self, public_url: &str) -> Result<(), ClientError> {
            self.calls.lock().unwrap().push("get".to_string());
            let status = self.reachability.lock().unwrap().pop_front().unwrap_or(200);
            if status == 200 {
                Ok(())
            } else {
                Err(ClientError::Unreachable {
                    url: public_url.to_string(),
                    status,
                })
            }
        }
    }

    fn webp() -> PreparedAsset {
        PreparedAsset::encoded("a.png", PreparedFormat::WebP, Bytes::from_static(b"RIFFxxxxWEBP"))
    }

    #[tokio::test]
    async fn happy_path_runs_the_four_steps_in_order() {
        let backend = Arc::new(ScriptedBackend::default());
        let coordinator = UploadCoordinator::new(backend.clone(), RetryPolicy::immediate(3));

        let result = coordinator
            .upload(&webp(), MediaKind::Image, "Rust", None)
            .await
            .unwrap();

        assert_eq!(result.public_url, "http://cdn/a.webp");
        assert_eq!(result.content_hash, ContentHash::of(b"RIFFxxxxWEBP"));
        assert_eq!(
            backend.calls(),
            vec!["presign images", "put image/webp", "metadata", "get"]
        );

        let record = backend.metadata.lock().unwrap()[0].clone();
        assert_eq!(record.user_id, "anonymous");
        assert_eq!(record.file_type, "images");
        assert_eq!(record.file_key, "images/a.webp");
        assert_eq!(record.file_hash, result.content_hash);
    }

    #[tokio::test]
    async fn uploader_id_is_recorded() {
        let backend = Arc::new(ScriptedBackend::default());
        let coordinator = UploadCoordinator::new(backend.clone(), RetryPolicy::immediate(3));
        coordinator
            .upload(&webp(), MediaKind::Image, "Rust", Some("user-42"))
            .await
            .unwrap();
        assert_eq!(backend.metadata.lock().unwrap()[0].user_id, "user-42");
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_twice_then_success_on_third_attempt() {
        let backend = Arc::new(ScriptedBackend::with_reachability(&[404, 404, 200]));
        let coordinator = UploadCoordinator::new(backend.clone(), RetryPolicy::default());
        let mut attempts = Vec::new();

        let start = tokio::time::Instant::now();
        let result = coordinator
            .upload_observed(&webp(), MediaKind::Image, "Rust", None, |a| {
                attempts.push(a.clone())
            })
            .await
            .unwrap();

        assert_eq!(result.public_url, "http://cdn/a.webp");
        assert_eq!(attempts.len(), 3);
        assert!(attempts[0].error.is_some());
        assert!(attempts[2].error.is_none());
        assert_eq!(start.elapsed(), std::time::Duration::from_secs(3));

        let metadata = backend.metadata.lock().unwrap();
        assert_eq!(metadata.len(), 3);
        assert!(metadata.iter().all(|r| r.file_hash == result.content_hash));
    }

    #[tokio::test]
    async fn failed_presign_stops_the_attempt() {
        let backend = Arc::new(ScriptedBackend {
            presign_error: Some(ClientError::from_status(
                403,
                r#"{"error":"Access denied"}"#.to_string(),
            )),
            ..ScriptedBackend::default()
        });
        let coordinator = UploadCoordinator::new(backend.clone(), RetryPolicy::immediate(3));

        let err = coordinator
            .upload(&webp(), MediaKind::Video, "Rust", None)
            .await
            .unwrap_err();

        assert_eq!(err, UploadError::new("Access denied", 3));
        assert_eq!(backend.calls(), vec!["presign videos"; 3]);
    }

    #[tokio::test]
    async fn preview_is_registered_per_slot() {
        let coordinator =
            UploadCoordinator::new(Arc::new(ScriptedBackend::default()), RetryPolicy::immediate(1));
        let handle = coordinator.preview("titleImage", &webp());
        assert_eq!(coordinator.previews().len(), 1);
        drop(handle);
        assert!(coordinator.previews().is_empty());
    }
}
