use serde::{Deserialize, Serialize};

use crate::hash::ContentHash;

/// Request for a one-time write location (`POST /get-presigned-url`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignRequest {
    /// MIME type the object will be written with
    pub file_type: String,
    /// Logical folder: "images" or "videos"
    pub folder: String,
    pub category: String,
}

/// Write location handed out by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignResponse {
    /// Time-limited URL accepting a single direct PUT
    pub signed_url: String,
    /// Durable address the object is served from
    pub public_url: String,
    /// Opaque storage key
    pub key: String,
}

/// Metadata registered after a transfer (`POST /store-metadata`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord {
    pub file_key: String,
    pub file_hash: ContentHash,
    /// Same value as the presign folder: "images" or "videos"
    pub file_type: String,
    pub category: String,
    pub user_id: String,
}

/// Error body some backend endpoints return on failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl BackendErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.error
            .or(self.message)
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
    }
}

/// What a successful upload leaves behind in form state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub public_url: String,
    pub content_hash: ContentHash,
}

/// One try of the upload sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadAttempt {
    /// 1-based
    pub number: u32,
    pub error: Option<String>,
}
