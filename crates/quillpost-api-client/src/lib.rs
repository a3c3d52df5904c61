//! HTTP client for the Quillpost backend.
//!
//! Provides a minimal client with optional bearer auth and JSON helpers, the
//! upload backend seam with its HTTP implementation, the retry combinator,
//! the upload coordinator, the preview registry and the post dispatcher.
//! The CLI and the service layer use these directly.

pub mod backend;
pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod preview;
pub mod retry;

use anyhow::{Context, Result};
use bytes::Bytes;
use quillpost_core::ClientConfig;
use reqwest::{header, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

pub use backend::{HttpUploadBackend, UploadBackend};
pub use coordinator::UploadCoordinator;
pub use dispatch::{HttpPostDispatcher, PostDispatcher};
pub use error::ClientError;
pub use preview::{Preview, PreviewHandle, PreviewRegistry};
pub use retry::{retry_with_backoff, retry_with_observer, RetryExhausted, RetryPolicy};

/// HTTP client for the backend API.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(
            &config.api_url,
            config.api_token.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header(header::AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }

    async fn check_status(response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(ClientError::from_status(status.as_u16(), body))
    }

    /// POST a JSON body to a backend path and deserialize the JSON response.
    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let request = self.apply_auth(self.client.post(self.build_url(path)).json(body));
        let response = Self::check_status(request.send().await?).await?;
        Ok(response.json().await?)
    }

    /// POST a JSON body to a backend path; the response body is ignored.
    pub async fn post_json_discard<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), ClientError> {
        let request = self.apply_auth(self.client.post(self.build_url(path)).json(body));
        Self::check_status(request.send().await?).await?;
        Ok(())
    }

    /// PUT raw bytes to an absolute URL.
    ///
    /// Used for presigned write locations, which carry their own signature,
    /// so no credentials are attached.
    pub async fn put_bytes(
        &self,
        url: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<(), ClientError> {
        let request = self
            .client
            .put(url)
            .header(header::CONTENT_TYPE, content_type)
            .body(data);
        Self::check_status(request.send().await?).await?;
        Ok(())
    }

    /// GET an absolute URL and report its status code.
    pub async fn get_status(&self, url: &str) -> Result<u16, ClientError> {
        let response = self.client.get(url).send().await?;
        Ok(response.status().as_u16())
    }

    /// Raw client for custom requests.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client_for(server: &mockito::ServerGuard, token: Option<&str>) -> ApiClient {
        ApiClient::new(
            &format!("{}/", server.url()),
            token.map(str::to_string),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn post_json_sends_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/echo")
            .match_header("authorization", "Bearer s3cret")
            .match_body(Matcher::Json(serde_json::json!({ "a": 1 })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let client = client_for(&server, Some("s3cret"));
        let body: serde_json::Value = client
            .post_json("/echo", &serde_json::json!({ "a": 1 }))
            .await
            .unwrap();

        assert_eq!(body["ok"], true);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn error_status_carries_backend_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/fail")
            .with_status(400)
            .with_body(r#"{"error":"Invalid category"}"#)
            .create_async()
            .await;

        let client = client_for(&server, None);
        let err = client
            .post_json::<serde_json::Value, _>("/fail", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.most_specific_message(), "Invalid category");
    }

    #[tokio::test]
    async fn put_bytes_sets_content_type_without_auth() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/bucket/key")
            .match_header("content-type", "image/webp")
            .match_header("authorization", Matcher::Missing)
            .match_body(Matcher::Exact("RIFF".to_string()))
            .with_status(200)
            .create_async()
            .await;

        let client = client_for(&server, Some("s3cret"));
        client
            .put_bytes(
                &format!("{}/bucket/key", server.url()),
                "image/webp",
                Bytes::from_static(b"RIFF"),
            )
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[test]
    fn build_url_trims_trailing_slash() {
        let client =
            ApiClient::new("http://localhost:5000/", None, Duration::from_secs(1)).unwrap();
        assert_eq!(client.build_url("/posts"), "http://localhost:5000/posts");
    }
}
