//! Google Cloud REST clients.
//!
//! Each service the pipeline talks to sits behind a trait so the pipeline
//! can be driven by in-memory doubles in tests.

pub mod auth;
pub mod bigquery;
pub mod documentai;
pub mod http_client;
pub mod pubsub;
pub mod storage;
#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

use thiserror::Error;

pub use auth::{token_source, MetadataServerToken, StaticToken, TokenSource};
pub use bigquery::{BigQueryClient, Warehouse};
pub use documentai::{
    wait_for_operation, BatchProcessRequest, DocumentAiClient, DocumentProcessor, OperationState,
};
pub use http_client::HttpClient;
pub use pubsub::{PubSubClient, Publisher};
pub use storage::{GcsClient, ObjectInfo, ObjectStore};

/// Errors talking to Google Cloud APIs.
#[derive(Debug, Error)]
pub enum GcpError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned {status}: {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid {service} response: {source}")]
    Decode {
        service: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Operation {name} failed: {message}")]
    OperationFailed { name: String, message: String },

    #[error("Operation {name} did not finish within {timeout:?}")]
    OperationTimeout { name: String, timeout: Duration },

    #[error("Row insert rejected: {0}")]
    InsertRejected(String),
}
