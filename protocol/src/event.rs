use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::lead::QualifiedLead;
use crate::lead::TierSummary;

/// One event decoded from a stream frame.
///
/// Events are delivered once, in order, within one stream; none is ever
/// retracted. Frames carrying a discriminator not listed here parse to
/// `None` and are skipped, so newer backends can add event types without
/// breaking older clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Init {
        total: u32,
    },
    Progress(ProgressUpdate),
    Result {
        company: QualifiedLead,
    },
    Error {
        error: String,
        #[serde(default)]
        fatal: bool,
    },
    Complete {
        #[serde(default)]
        summary: TierSummary,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        search_id: Option<String>,
    },
}

/// Payload of a `progress` event: the last known position in the batch,
/// replaced wholesale each time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub index: u32,
    pub total: u32,

    /// Sub-phase label, e.g. `"crawling"` or `"qualifying"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    /// Descriptor of the target currently being worked on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<Value>,
}

#[derive(Debug, Error)]
pub enum FrameParseError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame payload is not a JSON object")]
    NotAnObject,
    #[error("frame is missing a string `type` field")]
    MissingType,
}

/// Parse the JSON payload of one frame.
///
/// Returns `Ok(None)` for a well-formed object whose `type` is not a known
/// discriminator; those frames are ignored. Any other shape problem is an
/// error, and the caller drops the frame without aborting the stream.
pub fn parse_frame_payload(payload: &str) -> Result<Option<StreamEvent>, FrameParseError> {
    let value: Value = serde_json::from_str(payload)?;
    if !value.is_object() {
        return Err(FrameParseError::NotAnObject);
    }
    let Some(kind) = value.get("type").and_then(Value::as_str) else {
        return Err(FrameParseError::MissingType);
    };
    match kind {
        "init" | "progress" | "result" | "error" | "complete" => {
            Ok(Some(serde_json::from_value(value)?))
        }
        _ => Ok(None),
    }
}
