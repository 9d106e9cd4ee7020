//! Invoice processing pipeline.
//!
//! One storage event is taken end to end: the upload is sent to Document AI,
//! each JSON artifact it writes becomes one BigQuery row (plus a geocode
//! request when an address was found), the operation's output is cleared and the
//! upload is moved to the archive bucket.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::naming::{input_file_name_for, is_json_artifact, operation_output_prefix, parse_gs_uri};
use super::publish::{PendingPublishes, PublishSummary};
use crate::config::Settings;
use crate::extract::{ExtractError, FieldExtractor, LabelTable, TableSchema};
use crate::gcp::{
    token_source, wait_for_operation, BatchProcessRequest, BigQueryClient, DocumentAiClient,
    DocumentProcessor, GcpError, GcsClient, HttpClient, ObjectStore, PubSubClient, Publisher,
    Warehouse,
};
use crate::models::{Document, StorageEvent};

/// Errors that abort an invocation.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Gcp(#[from] GcpError),

    #[error("Cannot extract fields from {artifact}: {source}")]
    Extract {
        artifact: String,
        #[source]
        source: ExtractError,
    },

    #[error("Artifact {artifact} is not a Document AI document: {source}")]
    Artifact {
        artifact: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cannot encode geocode request: {0}")]
    Message(#[source] serde_json::Error),

    #[error("Invalid Cloud Storage URI: {0}")]
    InvalidUri(String),
}

/// Names and limits the pipeline runs with.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// `gs://bucket/prefix/` the processor writes to.
    pub output_uri: String,
    pub archive_bucket: String,
    /// Full topic path for geocode requests.
    pub geocode_topic: String,
    pub operation_timeout: Duration,
    pub poll_interval: Duration,
    pub publish_timeout: Duration,
}

impl PipelineConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            output_uri: settings.destination_uri(),
            archive_bucket: settings.archive_bucket.clone(),
            geocode_topic: settings.topic_path(),
            operation_timeout: settings.timeout,
            poll_interval: settings.poll_interval,
            publish_timeout: settings.publish_timeout,
        }
    }
}

/// External services the pipeline drives.
#[derive(Clone)]
pub struct Collaborators {
    pub processor: Arc<dyn DocumentProcessor>,
    pub storage: Arc<dyn ObjectStore>,
    pub warehouse: Arc<dyn Warehouse>,
    pub publisher: Arc<dyn Publisher>,
}

impl Collaborators {
    /// REST clients for the configured project.
    pub fn from_settings(settings: &Settings) -> Result<Self, GcpError> {
        let http = HttpClient::new(token_source(settings))?;
        let endpoints = &settings.endpoints;
        Ok(Self {
            processor: Arc::new(DocumentAiClient::new(
                http.clone(),
                &endpoints.document_ai,
                settings.processor_name(),
            )),
            storage: Arc::new(GcsClient::new(http.clone(), &endpoints.storage)),
            warehouse: Arc::new(BigQueryClient::new(
                http.clone(),
                &endpoints.bigquery,
                &settings.project_id,
                &settings.dataset,
                &settings.table,
            )),
            publisher: Arc::new(PubSubClient::new(http, &endpoints.pubsub)),
        })
    }
}

/// One row written to the warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenRow {
    pub artifact: String,
    pub input_file_name: String,
    /// Keys removed because the table does not declare them.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dropped_keys: Vec<String>,
    pub geocode_requested: bool,
}

/// What one processed upload produced.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessReport {
    pub input_uri: String,
    pub operation: String,
    pub rows: Vec<WrittenRow>,
    /// Output objects that were not Document JSON.
    pub skipped_artifacts: Vec<String>,
    pub cleaned_up: usize,
    pub archived_to: String,
    pub publishes: PublishSummary,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ProcessReport {
    /// Rows were written but some geocode requests were not published.
    pub fn is_partial(&self) -> bool {
        !self.publishes.is_complete()
    }
}

/// Result of handling one event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProcessOutcome {
    /// Content type the processor does not accept; nothing was touched.
    Skipped { content_type: String },
    Processed(ProcessReport),
}

impl ProcessOutcome {
    pub fn is_partial(&self) -> bool {
        matches!(self, ProcessOutcome::Processed(report) if report.is_partial())
    }
}

/// What a finished operation produced before publishes settle.
struct OperationOutput {
    rows: Vec<WrittenRow>,
    skipped_artifacts: Vec<String>,
    cleaned_up: usize,
    archived_to: String,
}

/// The invoice pipeline.
pub struct InvoicePipeline {
    config: PipelineConfig,
    services: Collaborators,
    schema: TableSchema,
    extractor: FieldExtractor,
    table_ready: OnceCell<()>,
}

impl InvoicePipeline {
    pub fn new(
        config: PipelineConfig,
        services: Collaborators,
        schema: TableSchema,
        extractor: FieldExtractor,
    ) -> Self {
        Self {
            config,
            services,
            schema,
            extractor,
            table_ready: OnceCell::new(),
        }
    }

    /// Pipeline wired to the real services for `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self, GcpError> {
        let labels = LabelTable::builtin().with_aliases(settings.aliases.iter());
        Ok(Self::new(
            PipelineConfig::from_settings(settings),
            Collaborators::from_settings(settings)?,
            TableSchema::invoice(),
            FieldExtractor::new(labels),
        ))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process one uploaded object.
    pub async fn process_event(
        &self,
        event: &StorageEvent,
    ) -> Result<ProcessOutcome, PipelineError> {
        info!(
            "Received gs://{}/{} ({})",
            event.bucket, event.name, event.content_type
        );
        if !event.is_supported() {
            warn!(
                "Cannot parse content type {:?}, skipping {}",
                event.content_type, event.name
            );
            return Ok(ProcessOutcome::Skipped {
                content_type: event.content_type.clone(),
            });
        }

        let started_at = Utc::now();
        let (output_bucket, output_prefix) = parse_gs_uri(&self.config.output_uri)
            .ok_or_else(|| PipelineError::InvalidUri(self.config.output_uri.clone()))?;

        let request = BatchProcessRequest {
            input_uri: event.gcs_uri(),
            mime_type: event.content_type.clone(),
            output_uri: self.config.output_uri.clone(),
        };
        let operation = self.services.processor.start_batch(&request).await?;
        let scope = operation_output_prefix(&output_prefix, &operation);

        // Every spawned publish is settled before returning, on failure too.
        let mut pending =
            PendingPublishes::new(self.services.publisher.clone(), &self.config.geocode_topic);
        let result = self
            .run_operation(event, &operation, &output_bucket, &scope, &mut pending)
            .await;
        let publishes = pending.settle(self.config.publish_timeout).await;
        if !publishes.is_complete() {
            warn!(
                "{} of {} geocode requests for {} were not published",
                publishes.failures.len(),
                publishes.failures.len() + publishes.published,
                event.name
            );
        }

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                self.discard_output(&output_bucket, &scope).await;
                return Err(err);
            }
        };

        let report = ProcessReport {
            input_uri: request.input_uri,
            operation,
            rows: output.rows,
            skipped_artifacts: output.skipped_artifacts,
            cleaned_up: output.cleaned_up,
            archived_to: output.archived_to,
            publishes,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            "Processed {}: {} rows in {}ms",
            report.input_uri,
            report.rows.len(),
            (report.finished_at - report.started_at).num_milliseconds()
        );
        Ok(ProcessOutcome::Processed(report))
    }

    /// Wait for the operation, write a row per artifact under `scope`, then
    /// clear the output and archive the upload.
    async fn run_operation(
        &self,
        event: &StorageEvent,
        operation: &str,
        bucket: &str,
        scope: &str,
        pending: &mut PendingPublishes,
    ) -> Result<OperationOutput, PipelineError> {
        wait_for_operation(
            self.services.processor.as_ref(),
            operation,
            self.config.poll_interval,
            self.config.operation_timeout,
        )
        .await?;
        info!("Operation {} finished", operation);

        self.ensure_table().await?;

        let mut rows = Vec::new();
        let mut skipped_artifacts = Vec::new();
        for object in self.services.storage.list(bucket, scope).await? {
            if !is_json_artifact(&object.name) {
                warn!("Skipping non-supported file type {}", object.name);
                skipped_artifacts.push(object.name);
                continue;
            }
            rows.push(self.process_artifact(bucket, &object.name, pending).await?);
        }

        let cleaned_up = self.clear_output(bucket, scope).await?;
        let archived_to = self.archive(event).await?;
        Ok(OperationOutput {
            rows,
            skipped_artifacts,
            cleaned_up,
            archived_to,
        })
    }

    async fn ensure_table(&self) -> Result<(), GcpError> {
        self.table_ready
            .get_or_try_init(|| self.services.warehouse.ensure_table(&self.schema))
            .await?;
        Ok(())
    }

    async fn process_artifact(
        &self,
        bucket: &str,
        artifact: &str,
        pending: &mut PendingPublishes,
    ) -> Result<WrittenRow, PipelineError> {
        let input_file_name = input_file_name_for(artifact);
        debug!("Fetching {} for {}", artifact, input_file_name);

        let bytes = self.services.storage.download(bucket, artifact).await?;
        let document = Document::from_json(&bytes).map_err(|source| PipelineError::Artifact {
            artifact: artifact.to_string(),
            source,
        })?;

        let extraction = self
            .extractor
            .extract(&document, &input_file_name)
            .map_err(|source| PipelineError::Extract {
                artifact: artifact.to_string(),
                source,
            })?;

        let geocode_requested = match &extraction.geocode_request {
            Some(request) => {
                pending.spawn(request).map_err(PipelineError::Message)?;
                true
            }
            None => false,
        };

        let mut record = extraction.record;
        let dropped_keys = self.schema.sanitize(&mut record);
        debug!("Writing {} columns for {}", record.len(), input_file_name);
        self.services.warehouse.append_row(&record).await?;

        Ok(WrittenRow {
            artifact: artifact.to_string(),
            input_file_name,
            dropped_keys,
            geocode_requested,
        })
    }

    /// Delete everything the processor wrote under the output prefix.
    async fn clear_output(&self, bucket: &str, prefix: &str) -> Result<usize, GcpError> {
        let storage = self.services.storage.as_ref();
        let objects = storage.list(bucket, prefix).await?;
        for object in &objects {
            storage.delete(bucket, &object.name).await?;
        }
        debug!("Deleted {} objects under gs://{}/{}", objects.len(), bucket, prefix);
        Ok(objects.len())
    }

    /// Remove whatever a failed run left under `prefix`. The upload stays in
    /// place, so a retry starts a new operation with its own output.
    async fn discard_output(&self, bucket: &str, prefix: &str) {
        match self.clear_output(bucket, prefix).await {
            Ok(0) => {}
            Ok(count) => info!(
                "Discarded {} objects of failed run under gs://{}/{}",
                count, bucket, prefix
            ),
            Err(err) => warn!("Cannot discard gs://{}/{}: {}", bucket, prefix, err),
        }
    }

    /// Move the upload into the archive bucket.
    async fn archive(&self, event: &StorageEvent) -> Result<String, GcpError> {
        let storage = self.services.storage.as_ref();
        let archive_bucket = &self.config.archive_bucket;
        storage
            .copy(&event.bucket, &event.name, archive_bucket, &event.name)
            .await?;
        storage.delete(&event.bucket, &event.name).await?;

        let archived = format!("gs://{}/{}", archive_bucket, event.name);
        info!("Archived {} to {}", event.gcs_uri(), archived);
        Ok(archived)
    }
}
