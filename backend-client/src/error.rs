use reqwest::StatusCode;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BackendError>;

/// Structured body returned with quota/authorization rejections. Carried
/// through verbatim so callers can render plan and usage details.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuotaPayload {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

#[derive(Debug, Error)]
pub enum BackendError {
    /// No bearer credential was available; the request was never sent.
    #[error("no credentials available for backend request")]
    MissingCredentials,

    /// The configured bearer token contains characters that cannot appear
    /// in an HTTP header; the request was never sent.
    #[error("bearer token is not a valid header value")]
    InvalidCredentials,

    /// Quota or plan rejection with a structured payload. Not retried.
    #[error("quota exceeded: {}", .0.error)]
    Quota(QuotaPayload),

    /// Non-success status without a structured payload.
    #[error("backend request failed: {status} - {body}")]
    Status { status: StatusCode, body: String },

    /// Connection, TLS, timeout, or body-read failure.
    #[error("backend transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A non-streaming response body failed to deserialize.
    #[error("backend response malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl BackendError {
    /// True for failures a caller may reasonably retry or degrade on
    /// (e.g. the job tracker falling back to polling). Quota and missing
    /// credentials are deliberate rejections and are not retried.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            BackendError::Transport(_) | BackendError::Status { .. }
        )
    }
}
