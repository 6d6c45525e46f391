use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::auth::StoreError;

/// Message used when a `401` body carries no `error` field
const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";

/// Maximum length for response bodies echoed into logs
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Failure side of a request outcome.
///
/// `Display` is the human-readable message a view shows to the user.
#[derive(Error, Debug)]
pub enum ApiError {
    /// `401` from the backend; the session has already been cleared
    #[error("{message}")]
    Unauthorized { message: String },

    /// Any other non-2xx status
    #[error("{message}")]
    Status { status: StatusCode, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Login response did not include a token")]
    MissingToken,

    #[error("Failed to store session: {0}")]
    Store(#[from] StoreError),
}

impl ApiError {
    /// Build the failure for a non-2xx response from its parsed payload.
    /// The message comes from the conventional `error` field when present.
    pub fn from_status(status: StatusCode, payload: &Value) -> Self {
        let server_message = payload
            .get("error")
            .and_then(Value::as_str)
            .filter(|m| !m.trim().is_empty())
            .map(str::to_string);

        if status == StatusCode::UNAUTHORIZED {
            ApiError::Unauthorized {
                message: server_message.unwrap_or_else(|| UNAUTHORIZED_MESSAGE.to_string()),
            }
        } else {
            ApiError::Status {
                status,
                message: server_message
                    .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16())),
            }
        }
    }

    /// HTTP status that produced this failure, when there was one
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED),
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Network(e) => e.status(),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }
}
