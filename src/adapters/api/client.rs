//! Data HTTP Client - Concurrency-limited REST Client
//!
//! Wraps reqwest with a concurrency limit and status checking for the
//! exchange's public data endpoint (tickers, candles) and for GraphQL
//! POSTs to the token subgraph. Requests are never retried here; the
//! reconciler's poll loop is the retry.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Response};
use tokio::sync::Semaphore;
use tracing::debug;

/// Configuration for the data HTTP client.
#[derive(Debug, Clone)]
pub struct DataClientConfig {
  /// Base URL of the data endpoint.
  pub base_url: String,
  /// Transport timeout.
  pub timeout: Duration,
  /// Maximum concurrent requests.
  pub max_concurrent: usize,
}

impl Default for DataClientConfig {
  fn default() -> Self {
    Self {
      base_url: "http://localhost:3000".to_string(),
      timeout: Duration::from_secs(30),
      max_concurrent: 4,
    }
  }
}

/// HTTP client for the public data endpoint.
pub struct DataClient {
  /// Underlying HTTP client.
  http: Client,
  /// Client configuration.
  config: DataClientConfig,
  /// Concurrency limiter.
  semaphore: Arc<Semaphore>,
}

impl DataClient {
  /// Create a new data client.
  pub fn new(config: DataClientConfig) -> Result<Self> {
    let http = Client::builder()
      .timeout(config.timeout)
      .pool_max_idle_per_host(5)
      .build()
      .context("Failed to build HTTP client")?;

    let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));

    Ok(Self {
      http,
      config,
      semaphore,
    })
  }

  /// Full URL for a path relative to the base URL.
  pub fn url(&self, path: &str) -> String {
    format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
  }

  /// Execute a GET request; non-2xx statuses are errors.
  pub async fn get(&self, path: &str) -> Result<Response> {
    let _permit = self
      .semaphore
      .acquire()
      .await
      .context("Semaphore closed")?;

    let url = self.url(path);
    debug!(url = %url, "GET");

    let response = self
      .http
      .get(&url)
      .send()
      .await
      .with_context(|| format!("GET {path} failed"))?;

    check_status(response, path).await
  }

  /// POST a JSON body to an absolute URL; non-2xx statuses are errors.
  pub async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<Response> {
    let _permit = self
      .semaphore
      .acquire()
      .await
      .context("Semaphore closed")?;

    debug!(url = %url, "POST");

    let response = self
      .http
      .post(url)
      .json(body)
      .send()
      .await
      .with_context(|| format!("POST {url} failed"))?;

    check_status(response, url).await
  }
}

async fn check_status(response: Response, target: &str) -> Result<Response> {
  let status = response.status();
  if !status.is_success() {
    let body = response.text().await.unwrap_or_default();
    anyhow::bail!("API error {status} on {target}: {body}");
  }
  Ok(response)
}
