//! Storage trigger events.
//!
//! An upload reaches the pipeline in one of three shapes:
//! - the object resource itself (background functions, Eventarc binary mode)
//! - a CloudEvents structured envelope with the object under `data`
//! - a Pub/Sub push envelope with the object base64-encoded in `message.data`

use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::is_supported_content_type;

/// Errors decoding a trigger payload.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("Invalid event JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid base64 in Pub/Sub message: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Event does not describe a storage object")]
    NotAStorageObject,
}

/// The uploaded object that triggered an invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageEvent {
    pub bucket: String,
    pub name: String,
    #[serde(default)]
    pub content_type: String,
}

#[derive(Deserialize)]
struct PushEnvelope {
    message: PushMessage,
}

#[derive(Deserialize)]
struct PushMessage {
    #[serde(default)]
    data: Option<String>,
}

#[derive(Deserialize)]
struct CloudEventEnvelope {
    data: StorageEvent,
}

impl StorageEvent {
    pub fn new(
        bucket: impl Into<String>,
        name: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            name: name.into(),
            content_type: content_type.into(),
        }
    }

    /// Decode any of the accepted trigger body shapes.
    pub fn from_trigger_body(body: &[u8]) -> Result<Self, EventError> {
        let value: serde_json::Value = serde_json::from_slice(body)?;

        if value.get("message").is_some() {
            let envelope: PushEnvelope = serde_json::from_value(value)?;
            let data = envelope.message.data.ok_or(EventError::NotAStorageObject)?;
            let decoded = base64::engine::general_purpose::STANDARD.decode(data.trim())?;
            return Ok(serde_json::from_slice(&decoded)?);
        }

        if value.get("data").is_some_and(|d| d.is_object()) {
            let envelope: CloudEventEnvelope = serde_json::from_value(value)?;
            return Ok(envelope.data);
        }

        if value.get("bucket").is_none() || value.get("name").is_none() {
            return Err(EventError::NotAStorageObject);
        }
        Ok(serde_json::from_value(value)?)
    }

    /// `gs://` URI of the uploaded object.
    pub fn gcs_uri(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.name)
    }

    /// Whether the processor accepts this object's MIME type.
    pub fn is_supported(&self) -> bool {
        is_supported_content_type(&self.content_type)
    }
}
