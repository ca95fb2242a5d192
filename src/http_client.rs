//! HTTP client abstraction for registry lookups.
//!
//! Keeps `reqwest` behind a trait so the registry search can be tested
//! without touching the network.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Trait for HTTP communication with external APIs.
///
/// # Example
///
/// ```ignore
/// use yeoman_mcp::http_client::{HttpClient, ReqwestHttpClient};
///
/// let client = ReqwestHttpClient::new();
/// let body = client
///     .get("https://registry.npmjs.org/-/v1/search", &[("text", "keywords:yeoman-generator")])
///     .await?;
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a GET request with the given query pairs and returns the body.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the server answers with a
    /// non-success status, or the body cannot be read.
    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<String>;
}

/// HTTP client implementation using reqwest.
pub struct ReqwestHttpClient {
    client: Client,
    timeout: Duration,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            timeout: REQUEST_TIMEOUT,
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<String> {
        let response = self
            .client
            .get(url)
            .query(query)
            .header("Accept", "application/json")
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("{} answered with HTTP {}", url, status);
        }
        Ok(response.text().await?)
    }
}
