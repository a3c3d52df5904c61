use async_trait::async_trait;
use quillpost_core::{ClientConfig, PostPayload};

use crate::error::ClientError;
use crate::ApiClient;

/// Hands an assembled post on to whoever stores it.
#[async_trait]
pub trait PostDispatcher: Send + Sync {
    /// Returns the receiver's response body.
    async fn dispatch(&self, payload: &PostPayload) -> Result<serde_json::Value, ClientError>;
}

/// Posts the payload as JSON to the backend's create-post endpoint.
#[derive(Clone, Debug)]
pub struct HttpPostDispatcher {
    client: ApiClient,
    path: String,
}

impl HttpPostDispatcher {
    pub fn new(client: ApiClient, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> anyhow::Result<Self> {
        Ok(Self::new(
            ApiClient::from_config(config)?,
            config.create_post_path.clone(),
        ))
    }
}

#[async_trait]
impl PostDispatcher for HttpPostDispatcher {
    async fn dispatch(&self, payload: &PostPayload) -> Result<serde_json::Value, ClientError> {
        tracing::info!(title = %payload.title, category = %payload.category, "Dispatching post");
        self.client.post_json(&self.path, payload).await
    }
}
