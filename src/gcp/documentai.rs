//! Document AI batch processing.
//!
//! Batch processing reads the input from Cloud Storage and writes one JSON
//! `Document` per input (or per shard) under the output URI. Submission
//! returns a long-running operation that is polled until done.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::http_client::HttpClient;
use super::GcpError;

const SERVICE: &str = "Document AI";

/// Input and output locations for one batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchProcessRequest {
    /// `gs://` URI of the document to process.
    pub input_uri: String,
    pub mime_type: String,
    /// `gs://` URI prefix for the JSON output.
    pub output_uri: String,
}

/// Observed state of a long-running operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationState {
    Running,
    Succeeded,
    Failed(String),
}

/// A document-understanding service that runs batch jobs.
#[async_trait]
pub trait DocumentProcessor: Send + Sync {
    /// Submit a batch job; returns the operation name.
    async fn start_batch(&self, request: &BatchProcessRequest) -> Result<String, GcpError>;

    /// Current state of a submitted operation.
    async fn operation_state(&self, operation: &str) -> Result<OperationState, GcpError>;
}

/// Poll `operation` every `poll_interval` until it finishes, failing after
/// `timeout`.
pub async fn wait_for_operation(
    processor: &dyn DocumentProcessor,
    operation: &str,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<(), GcpError> {
    let poll = async {
        loop {
            match processor.operation_state(operation).await? {
                OperationState::Succeeded => return Ok::<(), GcpError>(()),
                OperationState::Failed(message) => {
                    return Err(GcpError::OperationFailed {
                        name: operation.to_string(),
                        message,
                    })
                }
                OperationState::Running => {
                    debug!("Operation {} still running", operation);
                    tokio::time::sleep(poll_interval).await;
                }
            }
        }
    };

    tokio::time::timeout(timeout, poll)
        .await
        .map_err(|_| GcpError::OperationTimeout {
            name: operation.to_string(),
            timeout,
        })?
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchProcessBody {
    input_documents: BatchDocumentsInputConfig,
    document_output_config: DocumentOutputConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchDocumentsInputConfig {
    gcs_documents: GcsDocuments,
}

#[derive(Debug, Serialize)]
struct GcsDocuments {
    documents: Vec<GcsDocument>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GcsDocument {
    gcs_uri: String,
    mime_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentOutputConfig {
    gcs_output_config: GcsOutputConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GcsOutputConfig {
    gcs_uri: String,
}

#[derive(Debug, Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<OperationError>,
    #[serde(default)]
    metadata: Option<BatchProcessMetadata>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchProcessMetadata {
    #[serde(default)]
    individual_process_statuses: Vec<IndividualProcessStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndividualProcessStatus {
    #[serde(default)]
    input_gcs_source: String,
    #[serde(default)]
    status: Option<OperationError>,
}

impl Operation {
    fn state(self) -> OperationState {
        if !self.done {
            return OperationState::Running;
        }
        if let Some(error) = self.error {
            return OperationState::Failed(format!("code {}: {}", error.code, error.message));
        }
        for status in self.metadata.iter().flat_map(|m| &m.individual_process_statuses) {
            if let Some(err) = status.status.as_ref().filter(|s| s.code != 0) {
                warn!(
                    "Document AI could not process {}: {}",
                    status.input_gcs_source, err.message
                );
            }
        }
        OperationState::Succeeded
    }
}

/// Document AI REST client for one processor.
pub struct DocumentAiClient {
    http: HttpClient,
    endpoint: String,
    processor_name: String,
}

impl DocumentAiClient {
    pub fn new(http: HttpClient, endpoint: impl Into<String>, processor_name: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            processor_name: processor_name.into(),
        }
    }
}

#[async_trait]
impl DocumentProcessor for DocumentAiClient {
    async fn start_batch(&self, request: &BatchProcessRequest) -> Result<String, GcpError> {
        let body = BatchProcessBody {
            input_documents: BatchDocumentsInputConfig {
                gcs_documents: GcsDocuments {
                    documents: vec![GcsDocument {
                        gcs_uri: request.input_uri.clone(),
                        mime_type: request.mime_type.clone(),
                    }],
                },
            },
            document_output_config: DocumentOutputConfig {
                gcs_output_config: GcsOutputConfig {
                    gcs_uri: request.output_uri.clone(),
                },
            },
        };

        let url = format!("{}/v1/{}:batchProcess", self.endpoint, self.processor_name);
        let operation: Operation = self
            .http
            .post_json(&url, &body)
            .await?
            .error_for_status(SERVICE)
            .await?
            .json(SERVICE)
            .await?;

        info!(
            "Submitted {} to Document AI as {}",
            request.input_uri, operation.name
        );
        Ok(operation.name)
    }

    async fn operation_state(&self, operation: &str) -> Result<OperationState, GcpError> {
        let url = format!("{}/v1/{}", self.endpoint, operation);
        let operation: Operation = self
            .http
            .get(&url)
            .await?
            .error_for_status(SERVICE)
            .await?
            .json(SERVICE)
            .await?;
        Ok(operation.state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reports `Running` for the first `running_polls` polls, then `last`.
    struct ScriptedProcessor {
        running_polls: usize,
        last: OperationState,
        polls: AtomicUsize,
    }

    #[async_trait]
    impl DocumentProcessor for ScriptedProcessor {
        async fn start_batch(&self, _request: &BatchProcessRequest) -> Result<String, GcpError> {
            Ok("operations/1".to_string())
        }

        async fn operation_state(&self, _operation: &str) -> Result<OperationState, GcpError> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst);
            if n < self.running_polls {
                Ok(OperationState::Running)
            } else {
                Ok(self.last.clone())
            }
        }
    }

    fn scripted(running_polls: usize, last: OperationState) -> ScriptedProcessor {
        ScriptedProcessor {
            running_polls,
            last,
            polls: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn test_wait_until_succeeded() {
        let processor = scripted(2, OperationState::Succeeded);
        wait_for_operation(
            &processor,
            "operations/1",
            Duration::from_millis(1),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(processor.polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_wait_reports_failure() {
        let processor = scripted(0, OperationState::Failed("code 3: bad input".to_string()));
        let err = wait_for_operation(
            &processor,
            "operations/1",
            Duration::from_millis(1),
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GcpError::OperationFailed { .. }));
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let processor = scripted(usize::MAX, OperationState::Succeeded);
        let err = wait_for_operation(
            &processor,
            "operations/1",
            Duration::from_millis(5),
            Duration::from_millis(30),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GcpError::OperationTimeout { .. }));
    }

    #[test]
    fn test_operation_states() {
        let running: Operation =
            serde_json::from_str(r#"{"name": "operations/1"}"#).unwrap();
        assert_eq!(running.state(), OperationState::Running);

        let done: Operation = serde_json::from_str(
            r#"{"name": "operations/1", "done": true, "metadata": {
                "individualProcessStatuses": [{"inputGcsSource": "gs://in/a.pdf", "status": {}}]
            }}"#,
        )
        .unwrap();
        assert_eq!(done.state(), OperationState::Succeeded);

        let failed: Operation = serde_json::from_str(
            r#"{"name": "operations/1", "done": true, "error": {"code": 3, "message": "Unsupported input"}}"#,
        )
        .unwrap();
        assert_eq!(
            failed.state(),
            OperationState::Failed("code 3: Unsupported input".to_string())
        );
    }

    #[test]
    fn test_request_body_shape() {
        let body = BatchProcessBody {
            input_documents: BatchDocumentsInputConfig {
                gcs_documents: GcsDocuments {
                    documents: vec![GcsDocument {
                        gcs_uri: "gs://in/a.pdf".to_string(),
                        mime_type: "application/pdf".to_string(),
                    }],
                },
            },
            document_output_config: DocumentOutputConfig {
                gcs_output_config: GcsOutputConfig {
                    gcs_uri: "gs://out/processed/".to_string(),
                },
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json["inputDocuments"]["gcsDocuments"]["documents"][0]["gcsUri"],
            "gs://in/a.pdf"
        );
        assert_eq!(
            json["documentOutputConfig"]["gcsOutputConfig"]["gcsUri"],
            "gs://out/processed/"
        );
    }
}
