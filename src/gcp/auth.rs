//! OAuth access tokens for Google APIs.
//!
//! On Cloud Functions / Cloud Run the metadata server hands out tokens for
//! the attached service account. Locally a token can be supplied through
//! `GOOGLE_OAUTH_ACCESS_TOKEN` (e.g. from `gcloud auth print-access-token`).

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use super::GcpError;
use crate::config::Settings;

const METADATA_TOKEN_PATH: &str =
    "/computeMetadata/v1/instance/service-accounts/default/token";
const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";

/// Refresh this long before the reported expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// A source of bearer tokens.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, GcpError>;
}

/// A fixed token.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, GcpError> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

/// Tokens from the instance metadata server, cached until near expiry.
pub struct MetadataServerToken {
    client: reqwest::Client,
    url: String,
    cached: Mutex<Option<CachedToken>>,
}

impl MetadataServerToken {
    /// Use `GCE_METADATA_HOST` if set, otherwise the standard host.
    pub fn new() -> Self {
        let host = std::env::var("GCE_METADATA_HOST")
            .unwrap_or_else(|_| DEFAULT_METADATA_HOST.to_string());
        Self::with_host(&host)
    }

    pub fn with_host(host: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("http://{}{}", host, METADATA_TOKEN_PATH),
            cached: Mutex::new(None),
        }
    }

    async fn fetch(&self) -> Result<MetadataToken, GcpError> {
        let response = self
            .client
            .get(&self.url)
            .header("Metadata-Flavor", "Google")
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| GcpError::Auth(format!("metadata server unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(GcpError::Auth(format!(
                "metadata server returned {}",
                response.status()
            )));
        }

        response
            .json::<MetadataToken>()
            .await
            .map_err(|e| GcpError::Auth(format!("invalid token response: {}", e)))
    }
}

impl Default for MetadataServerToken {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenSource for MetadataServerToken {
    async fn access_token(&self) -> Result<String, GcpError> {
        let mut cached = self.cached.lock().await;
        if let Some(entry) = cached.as_ref() {
            if Instant::now() < entry.refresh_at {
                return Ok(entry.token.clone());
            }
        }

        let fetched = self.fetch().await?;
        let lifetime = Duration::from_secs(fetched.expires_in).saturating_sub(EXPIRY_MARGIN);
        debug!("Fetched access token from metadata server (valid {:?})", lifetime);

        let token = fetched.access_token;
        *cached = Some(CachedToken {
            token: token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(token)
    }
}

/// Pick a token source for the configured environment.
pub fn token_source(settings: &Settings) -> Arc<dyn TokenSource> {
    match &settings.access_token {
        Some(token) => Arc::new(StaticToken::new(token.clone())),
        None => Arc::new(MetadataServerToken::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token() {
        let source = StaticToken::new("ya29.test");
        assert_eq!(source.access_token().await.unwrap(), "ya29.test");
    }

    #[tokio::test]
    async fn test_cached_metadata_token_is_reused() {
        let source = MetadataServerToken::with_host("127.0.0.1:9");
        *source.cached.lock().await = Some(CachedToken {
            token: "cached".to_string(),
            refresh_at: Instant::now() + Duration::from_secs(300),
        });
        assert_eq!(source.access_token().await.unwrap(), "cached");
    }

    #[test]
    fn test_metadata_url() {
        let source = MetadataServerToken::with_host("localhost:8080");
        assert_eq!(
            source.url,
            "http://localhost:8080/computeMetadata/v1/instance/service-accounts/default/token"
        );
    }
}
