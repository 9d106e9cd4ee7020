//! Authenticated HTTP client shared by the Google API clients.

mod response;

pub use response::{google_error_message, HttpResponse};

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use tracing::debug;

use super::auth::TokenSource;
use super::GcpError;

pub const USER_AGENT: &str = concat!("invoice-capture/", env!("CARGO_PKG_VERSION"));

/// Per-request timeout for API calls. Long-running work is polled, so no
/// single request should take long.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP client that attaches a bearer token to every request.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    tokens: Arc<dyn TokenSource>,
}

impl HttpClient {
    /// Create a new HTTP client.
    pub fn new(tokens: Arc<dyn TokenSource>) -> Result<Self, GcpError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .gzip(true)
            .build()?;
        Ok(Self { client, tokens })
    }

    /// Make a GET request.
    pub async fn get(&self, url: &str) -> Result<HttpResponse, GcpError> {
        self.send("GET", url, self.client.get(url)).await
    }

    /// Make a DELETE request.
    pub async fn delete(&self, url: &str) -> Result<HttpResponse, GcpError> {
        self.send("DELETE", url, self.client.delete(url)).await
    }

    /// POST a JSON body.
    pub async fn post_json<T: serde::Serialize + ?Sized>(
        &self,
        url: &str,
        json: &T,
    ) -> Result<HttpResponse, GcpError> {
        self.send("POST", url, self.client.post(url).json(json))
            .await
    }

    async fn send(
        &self,
        method: &str,
        url: &str,
        request: RequestBuilder,
    ) -> Result<HttpResponse, GcpError> {
        let token = self.tokens.access_token().await?;
        debug!("{} {}", method, url);
        let response = request.bearer_auth(token).send().await?;
        debug!("{} {} -> {}", method, url, response.status());
        Ok(HttpResponse::from_reqwest(response))
    }
}
