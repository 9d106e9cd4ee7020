//! Configuration for the invoice pipeline.
//!
//! Settings come from an optional TOML file, overridden by environment
//! variables (a `.env` file is loaded by the binary before this runs). The
//! variable names match the ones the deployed function has always used.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Default BigQuery dataset.
pub const DEFAULT_DATASET: &str = "invoice_parser_results";

/// Default BigQuery table.
pub const DEFAULT_TABLE: &str = "doc_ai_extracted_entities";

const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;
const DEFAULT_PUBLISH_TIMEOUT_SECS: u64 = 30;

const DEFAULT_STORAGE_ENDPOINT: &str = "https://storage.googleapis.com";
const DEFAULT_BIGQUERY_ENDPOINT: &str = "https://bigquery.googleapis.com";
const DEFAULT_PUBSUB_ENDPOINT: &str = "https://pubsub.googleapis.com";

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Invalid value {value:?} for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Contents of the optional TOML config file. Every field may be overridden
/// by its environment variable.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub project_id: Option<String>,
    pub location: Option<String>,
    pub processor_id: Option<String>,
    pub output_prefix: Option<String>,
    pub geocode_topic: Option<String>,
    pub timeout_secs: Option<u64>,
    pub output_bucket: Option<String>,
    pub archive_bucket: Option<String>,
    pub dataset: Option<String>,
    pub table: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub publish_timeout_secs: Option<u64>,
    #[serde(default)]
    pub endpoints: EndpointConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

/// REST endpoint overrides, mainly for emulators and tests.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointConfig {
    pub document_ai: Option<String>,
    pub storage: Option<String>,
    pub bigquery: Option<String>,
    pub pubsub: Option<String>,
}

/// Extraction tuning.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractionConfig {
    /// Extra label -> column mappings, e.g. `"vendor:" = "supplier"`.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

impl FileConfig {
    /// Read and parse a TOML config file.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Resolved REST endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub document_ai: String,
    pub storage: String,
    pub bigquery: String,
    pub pubsub: String,
}

/// Validated application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub project_id: String,
    /// Processor location (`us`, `eu`).
    pub location: String,
    pub processor_id: String,
    /// Object prefix the processor writes its output under.
    pub output_prefix: String,
    pub geocode_topic: String,
    /// Upper bound on waiting for the batch operation.
    pub timeout: Duration,
    pub output_bucket: String,
    pub archive_bucket: String,
    pub dataset: String,
    pub table: String,
    pub poll_interval: Duration,
    /// Upper bound on settling geocode publishes at the end of an invocation.
    pub publish_timeout: Duration,
    pub endpoints: Endpoints,
    pub aliases: BTreeMap<String, String>,
    /// Pre-issued OAuth token; the metadata server is used when absent.
    pub access_token: Option<String>,
}

impl Settings {
    /// Load settings from an optional config file and the process environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match config_path {
            Some(path) => FileConfig::read(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(file, |name| std::env::var(name).ok())
    }

    /// Merge file values with variables from `env` and validate.
    pub fn resolve<F>(file: FileConfig, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        let project_id = required("GCP_PROJECT", var("GCP_PROJECT").or(file.project_id))?;
        let location = required("PARSER_LOCATION", var("PARSER_LOCATION").or(file.location))?;
        let processor_id = required("PROCESSOR_ID", var("PROCESSOR_ID").or(file.processor_id))?;
        let output_prefix = required(
            "GCS_OUTPUT_URI_PREFIX",
            var("GCS_OUTPUT_URI_PREFIX").or(file.output_prefix),
        )?
        .trim_matches('/')
        .to_string();
        let geocode_topic = required(
            "GEOCODE_REQUEST_TOPICNAME",
            var("GEOCODE_REQUEST_TOPICNAME").or(file.geocode_topic),
        )?;

        let timeout_secs = match var("TIMEOUT") {
            Some(value) => parse_u64("TIMEOUT", &value)?,
            None => file.timeout_secs.ok_or(ConfigError::Missing("TIMEOUT"))?,
        };
        let poll_interval_ms = match var("POLL_INTERVAL_MS") {
            Some(value) => parse_u64("POLL_INTERVAL_MS", &value)?,
            None => file.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS),
        };
        let publish_timeout_secs = match var("PUBLISH_TIMEOUT") {
            Some(value) => parse_u64("PUBLISH_TIMEOUT", &value)?,
            None => file
                .publish_timeout_secs
                .unwrap_or(DEFAULT_PUBLISH_TIMEOUT_SECS),
        };

        let output_bucket = var("OUTPUT_BUCKET")
            .or(file.output_bucket)
            .unwrap_or_else(|| format!("{}-output-invoices", project_id));
        let archive_bucket = var("ARCHIVE_BUCKET")
            .or(file.archive_bucket)
            .unwrap_or_else(|| format!("{}-archived-invoices", project_id));
        let dataset = var("BQ_DATASET")
            .or(file.dataset)
            .unwrap_or_else(|| DEFAULT_DATASET.to_string());
        let table = var("BQ_TABLE")
            .or(file.table)
            .unwrap_or_else(|| DEFAULT_TABLE.to_string());

        let pubsub_default = match var("PUBSUB_EMULATOR_HOST") {
            Some(host) => format!("http://{}", host),
            None => DEFAULT_PUBSUB_ENDPOINT.to_string(),
        };
        let endpoints = Endpoints {
            document_ai: endpoint(
                "DOCUMENTAI_ENDPOINT",
                var("DOCUMENTAI_ENDPOINT").or(file.endpoints.document_ai),
                format!("https://{}-documentai.googleapis.com", location),
            )?,
            storage: endpoint(
                "STORAGE_ENDPOINT",
                var("STORAGE_ENDPOINT").or(file.endpoints.storage),
                DEFAULT_STORAGE_ENDPOINT.to_string(),
            )?,
            bigquery: endpoint(
                "BIGQUERY_ENDPOINT",
                var("BIGQUERY_ENDPOINT").or(file.endpoints.bigquery),
                DEFAULT_BIGQUERY_ENDPOINT.to_string(),
            )?,
            pubsub: endpoint(
                "PUBSUB_ENDPOINT",
                var("PUBSUB_ENDPOINT").or(file.endpoints.pubsub),
                pubsub_default,
            )?,
        };

        Ok(Self {
            project_id,
            location,
            processor_id,
            output_prefix,
            geocode_topic,
            timeout: Duration::from_secs(timeout_secs),
            output_bucket,
            archive_bucket,
            dataset,
            table,
            poll_interval: Duration::from_millis(poll_interval_ms),
            publish_timeout: Duration::from_secs(publish_timeout_secs),
            endpoints,
            aliases: file.extraction.aliases,
            access_token: var("GOOGLE_OAUTH_ACCESS_TOKEN"),
        })
    }

    /// Full resource name of the processor.
    pub fn processor_name(&self) -> String {
        format!(
            "projects/{}/locations/{}/processors/{}",
            self.project_id, self.location, self.processor_id
        )
    }

    /// Where the processor writes its JSON output.
    pub fn destination_uri(&self) -> String {
        format!("gs://{}/{}/", self.output_bucket, self.output_prefix)
    }

    /// Full resource name of the geocode topic.
    pub fn topic_path(&self) -> String {
        format!("projects/{}/topics/{}", self.project_id, self.geocode_topic)
    }

    /// Bucket uploads land in by convention; used by the `process` command.
    pub fn default_input_bucket(&self) -> String {
        format!("{}-input-invoices", self.project_id)
    }
}

fn required(name: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn parse_u64(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn endpoint(
    name: &'static str,
    value: Option<String>,
    default: String,
) -> Result<String, ConfigError> {
    let value = value.unwrap_or(default);
    url::Url::parse(&value).map_err(|e| ConfigError::Invalid {
        name,
        value: value.clone(),
        reason: e.to_string(),
    })?;
    Ok(value.trim_end_matches('/').to_string())
}
