//! Cloud Storage via the JSON API.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use urlencoding::encode;

use super::http_client::HttpClient;
use super::GcpError;

const SERVICE: &str = "Cloud Storage";

/// Listing entry for a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectInfo {
    pub name: String,
    #[serde(default)]
    pub content_type: Option<String>,
    /// Size in bytes; the API encodes it as a string.
    #[serde(default)]
    pub size: Option<String>,
}

impl ObjectInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            size: None,
        }
    }
}

/// Object storage operations used by the pipeline.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// All objects in `bucket` whose name starts with `prefix`.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectInfo>, GcpError>;

    async fn download(&self, bucket: &str, name: &str) -> Result<Vec<u8>, GcpError>;

    async fn delete(&self, bucket: &str, name: &str) -> Result<(), GcpError>;

    /// Server-side copy of `src_bucket/name` to `dst_bucket/dst_name`.
    async fn copy(
        &self,
        src_bucket: &str,
        name: &str,
        dst_bucket: &str,
        dst_name: &str,
    ) -> Result<(), GcpError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage {
    #[serde(default)]
    items: Vec<ObjectInfo>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Cloud Storage JSON API client.
pub struct GcsClient {
    http: HttpClient,
    endpoint: String,
}

impl GcsClient {
    pub fn new(http: HttpClient, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    fn object_url(&self, bucket: &str, name: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.endpoint,
            encode(bucket),
            encode(name)
        )
    }
}

#[async_trait]
impl ObjectStore for GcsClient {
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectInfo>, GcpError> {
        let mut objects = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = format!(
                "{}/storage/v1/b/{}/o?prefix={}",
                self.endpoint,
                encode(bucket),
                encode(prefix)
            );
            if let Some(token) = &page_token {
                url.push_str("&pageToken=");
                url.push_str(&encode(token));
            }

            let page: ListPage = self
                .http
                .get(&url)
                .await?
                .error_for_status(SERVICE)
                .await?
                .json(SERVICE)
                .await?;
            objects.extend(page.items);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!("Listed {} objects under gs://{}/{}", objects.len(), bucket, prefix);
        Ok(objects)
    }

    async fn download(&self, bucket: &str, name: &str) -> Result<Vec<u8>, GcpError> {
        let url = format!("{}?alt=media", self.object_url(bucket, name));
        let bytes = self
            .http
            .get(&url)
            .await?
            .error_for_status(SERVICE)
            .await?
            .bytes()
            .await?;
        Ok(bytes)
    }

    async fn delete(&self, bucket: &str, name: &str) -> Result<(), GcpError> {
        self.http
            .delete(&self.object_url(bucket, name))
            .await?
            .error_for_status(SERVICE)
            .await?;
        Ok(())
    }

    async fn copy(
        &self,
        src_bucket: &str,
        name: &str,
        dst_bucket: &str,
        dst_name: &str,
    ) -> Result<(), GcpError> {
        let url = format!(
            "{}/copyTo/b/{}/o/{}",
            self.object_url(src_bucket, name),
            encode(dst_bucket),
            encode(dst_name)
        );
        self.http
            .post_json(&url, &serde_json::json!({}))
            .await?
            .error_for_status(SERVICE)
            .await?;
        Ok(())
    }
}
