//! HTTP response wrappers.

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::gcp::GcpError;

/// HTTP response wrapper.
pub struct HttpResponse {
    pub status: StatusCode,
    pub(crate) response: Response,
}

/// Error body returned by Google APIs.
#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

impl HttpResponse {
    pub(crate) fn from_reqwest(response: Response) -> Self {
        Self {
            status: response.status(),
            response,
        }
    }

    /// Check if the response is successful.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Check if the response is 409 Conflict.
    pub fn is_conflict(&self) -> bool {
        self.status == StatusCode::CONFLICT
    }

    /// Get response body as bytes.
    pub async fn bytes(self) -> Result<Vec<u8>, reqwest::Error> {
        self.response.bytes().await.map(|b| b.to_vec())
    }

    /// Get response body as text.
    pub async fn text(self) -> Result<String, reqwest::Error> {
        self.response.text().await
    }

    /// Decode the body as JSON, attributing failures to `service`.
    pub async fn json<T: DeserializeOwned>(self, service: &'static str) -> Result<T, GcpError> {
        let bytes = self.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|source| GcpError::Decode { service, source })
    }

    /// Pass successful responses through; turn anything else into an API error.
    pub async fn error_for_status(self, service: &'static str) -> Result<Self, GcpError> {
        if self.is_success() {
            return Ok(self);
        }
        let status = self.status.as_u16();
        let body = self.text().await.unwrap_or_default();
        Err(GcpError::Api {
            service,
            status,
            message: google_error_message(&body),
        })
    }
}

/// Pull the human-readable message out of a Google API error body.
pub fn google_error_message(body: &str) -> String {
    match serde_json::from_str::<GoogleErrorBody>(body) {
        Ok(parsed) => match parsed.error.status {
            Some(status) if !parsed.error.message.is_empty() => {
                format!("{}: {}", status, parsed.error.message)
            }
            _ => parsed.error.message,
        },
        Err(_) => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_google_error_message_with_status() {
        let body = r#"{"error": {"code": 404, "message": "Not found: Dataset acme:invoices", "status": "NOT_FOUND"}}"#;
        assert_eq!(
            google_error_message(body),
            "NOT_FOUND: Not found: Dataset acme:invoices"
        );
    }

    #[test]
    fn test_google_error_message_without_status() {
        let body = r#"{"error": {"code": 403, "message": "Forbidden"}}"#;
        assert_eq!(google_error_message(body), "Forbidden");
    }

    #[test]
    fn test_google_error_message_plain_body() {
        assert_eq!(google_error_message("  upstream timeout \n"), "upstream timeout");
    }
}
