use async_trait::async_trait;
use bytes::Bytes;
use quillpost_core::models::{MetadataRecord, PresignRequest, PresignResponse};
use quillpost_core::ClientConfig;

use crate::error::ClientError;
use crate::ApiClient;

/// The four backend calls an upload attempt is made of.
#[async_trait]
pub trait UploadBackend: Send + Sync {
    /// Ask for a one-time write location.
    async fn request_write_location(
        &self,
        request: &PresignRequest,
    ) -> Result<PresignResponse, ClientError>;

    /// Write the bytes to the location handed out by the backend.
    async fn transfer(
        &self,
        signed_url: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<(), ClientError>;

    async fn store_metadata(&self, record: &MetadataRecord) -> Result<(), ClientError>;

    /// Succeeds only when the public address answers with a success status.
    async fn check_reachable(&self, public_url: &str) -> Result<(), ClientError>;
}

/// [`UploadBackend`] over HTTP.
#[derive(Clone, Debug)]
pub struct HttpUploadBackend {
    client: ApiClient,
    presign_path: String,
    metadata_path: String,
}

impl HttpUploadBackend {
    pub fn new(client: ApiClient, config: &ClientConfig) -> Self {
        Self {
            client,
            presign_path: config.presign_path.clone(),
            metadata_path: config.metadata_path.clone(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> anyhow::Result<Self> {
        Ok(Self::new(ApiClient::from_config(config)?, config))
    }
}

#[async_trait]
impl UploadBackend for HttpUploadBackend {
    async fn request_write_location(
        &self,
        request: &PresignRequest,
    ) -> Result<PresignResponse, ClientError> {
        self.client.post_json(&self.presign_path, request).await
    }

    async fn transfer(
        &self,
        signed_url: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<(), ClientError> {
        self.client.put_bytes(signed_url, content_type, data).await
    }

    async fn store_metadata(&self, record: &MetadataRecord) -> Result<(), ClientError> {
        self.client
            .post_json_discard(&self.metadata_path, record)
            .await
    }

    async fn check_reachable(&self, public_url: &str) -> Result<(), ClientError> {
        let status = self.client.get_status(public_url).await?;
        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(ClientError::Unreachable {
                url: public_url.to_string(),
                status,
            })
        }
    }
}
