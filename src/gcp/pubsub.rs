//! Pub/Sub publishing.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http_client::HttpClient;
use super::GcpError;

const SERVICE: &str = "Pub/Sub";

/// Sends messages to a topic.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish `data` to `topic` (`projects/{p}/topics/{t}`); returns the
    /// server-assigned message id.
    async fn publish(&self, topic: &str, data: Vec<u8>) -> Result<String, GcpError>;
}

#[derive(Debug, Serialize)]
struct PublishRequest {
    messages: Vec<PubsubMessage>,
}

#[derive(Debug, Serialize)]
struct PubsubMessage {
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    #[serde(default)]
    message_ids: Vec<String>,
}

impl PublishRequest {
    fn single(data: &[u8]) -> Self {
        Self {
            messages: vec![PubsubMessage {
                data: STANDARD.encode(data),
            }],
        }
    }
}

/// Pub/Sub REST client.
pub struct PubSubClient {
    http: HttpClient,
    endpoint: String,
}

impl PubSubClient {
    pub fn new(http: HttpClient, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Publisher for PubSubClient {
    async fn publish(&self, topic: &str, data: Vec<u8>) -> Result<String, GcpError> {
        let url = format!("{}/v1/{}:publish", self.endpoint, topic);
        let response: PublishResponse = self
            .http
            .post_json(&url, &PublishRequest::single(&data))
            .await?
            .error_for_status(SERVICE)
            .await?
            .json(SERVICE)
            .await?;

        let id = response.message_ids.into_iter().next().ok_or_else(|| GcpError::Api {
            service: SERVICE,
            status: 200,
            message: "publish response carried no message id".to_string(),
        })?;
        debug!("Published message {} to {}", id, topic);
        Ok(id)
    }
}
