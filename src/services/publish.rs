//! Geocode request publishing.
//!
//! Publishes run as spawned tasks so artifact processing does not wait on
//! Pub/Sub. The handles belong to one invocation and are settled before it
//! returns.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use crate::extract::GeocodeRequest;
use crate::gcp::{GcpError, Publisher};

/// A publish that did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishFailure {
    pub input_file_name: String,
    pub error: String,
}

/// Outcome of settling an invocation's publishes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishSummary {
    pub published: usize,
    pub failures: Vec<PublishFailure>,
}

impl PublishSummary {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

struct Pending {
    input_file_name: String,
    handle: JoinHandle<Result<String, GcpError>>,
}

/// Publishes started during one invocation.
pub struct PendingPublishes {
    publisher: Arc<dyn Publisher>,
    topic: String,
    pending: Vec<Pending>,
}

impl PendingPublishes {
    pub fn new(publisher: Arc<dyn Publisher>, topic: impl Into<String>) -> Self {
        Self {
            publisher,
            topic: topic.into(),
            pending: Vec::new(),
        }
    }

    /// Start publishing `request` in the background.
    pub fn spawn(&mut self, request: &GeocodeRequest) -> Result<(), serde_json::Error> {
        let data = request.to_message_data()?;
        let publisher = Arc::clone(&self.publisher);
        let topic = self.topic.clone();
        let handle = tokio::spawn(async move { publisher.publish(&topic, data).await });

        debug!("Queued geocode request for {}", request.input_file_name);
        self.pending.push(Pending {
            input_file_name: request.input_file_name.clone(),
            handle,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Wait for every publish, giving up on those still running after
    /// `limit`. Unfinished tasks are aborted and reported as failures.
    pub async fn settle(self, limit: Duration) -> PublishSummary {
        let deadline = Instant::now() + limit;

        let outcomes = join_all(self.pending.into_iter().map(|mut pending| async move {
            let waited = timeout_at(deadline, &mut pending.handle).await;
            let outcome = match waited {
                Ok(Ok(Ok(id))) => Ok(id),
                Ok(Ok(Err(e))) => Err(e.to_string()),
                Ok(Err(join_error)) => Err(format!("publish task failed: {}", join_error)),
                Err(_) => {
                    pending.handle.abort();
                    Err(format!("not published within {:?}", limit))
                }
            };
            (pending.input_file_name, outcome)
        }))
        .await;

        let mut summary = PublishSummary::default();
        for (input_file_name, outcome) in outcomes {
            match outcome {
                Ok(id) => {
                    debug!("Geocode request for {} published as {}", input_file_name, id);
                    summary.published += 1;
                }
                Err(error) => {
                    warn!(
                        "Geocode request for {} was not published: {}",
                        input_file_name, error
                    );
                    summary.failures.push(PublishFailure {
                        input_file_name,
                        error,
                    });
                }
            }
        }
        summary
    }
}
