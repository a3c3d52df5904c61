use quillpost_core::models::BackendErrorBody;

/// Failure of a single backend call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Non-success status. `backend_message` is the `error`/`message` field
    /// of a JSON error body, when the backend sent one.
    #[error("API request failed with status {status}: {body}")]
    Status {
        status: u16,
        body: String,
        backend_message: Option<String>,
    },

    #[error("Failed to send request: {0}")]
    Transport(String),

    #[error("Failed to parse response: {0}")]
    Decode(String),

    #[error("Uploaded file is not reachable at {url} (status {status})")]
    Unreachable { url: String, status: u16 },
}

impl ClientError {
    /// Build a status error, picking the backend's message out of a JSON body.
    pub fn from_status(status: u16, body: String) -> Self {
        let backend_message = serde_json::from_str::<BackendErrorBody>(&body)
            .ok()
            .and_then(BackendErrorBody::into_message);
        ClientError::Status {
            status,
            body,
            backend_message,
        }
    }

    /// The message an author should see: the backend's own wording when
    /// available, otherwise the transport or status description.
    pub fn most_specific_message(&self) -> String {
        match self {
            ClientError::Status {
                backend_message: Some(message),
                ..
            } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } | ClientError::Unreachable { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}
