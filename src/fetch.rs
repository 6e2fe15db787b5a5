//! Downloading attachment content from a resolved URL.

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, instrument};

use crate::error::FetchError;

/// Fetches the binary content behind an attachment URL.
#[async_trait]
pub trait AttachmentFetcher: Send + Sync {
  async fn fetch(&self, url: &str) -> Result<Bytes, FetchError>;
}

/// Fetcher for `http(s)://` URLs (via reqwest), `file://` URLs and plain file paths.
#[derive(Debug, Clone, Default)]
pub struct DefaultFetcher {
  client: reqwest::Client,
}

impl DefaultFetcher {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_client(client: reqwest::Client) -> Self {
    Self { client }
  }

  async fn fetch_http(&self, url: &str) -> Result<Bytes, FetchError> {
    let response = self
      .client
      .get(url)
      .send()
      .await
      .map_err(|e| FetchError::Transport(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
      return Err(FetchError::Status {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("").to_string(),
      });
    }
    response
      .bytes()
      .await
      .map_err(|e| FetchError::Transport(e.to_string()))
  }
}

#[async_trait]
impl AttachmentFetcher for DefaultFetcher {
  #[instrument(level = "trace", skip(self))]
  async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
    if url.starts_with("http://") || url.starts_with("https://") {
      let body = self.fetch_http(url).await?;
      debug!(bytes = body.len(), "downloaded");
      return Ok(body);
    }
    let path = match url.strip_prefix("file://") {
      Some(p) => p,
      None if url.contains("://") => return Err(FetchError::UnsupportedUrl(url.to_string())),
      None => url,
    };
    let content = tokio::fs::read(path).await?;
    Ok(Bytes::from(content))
  }
}
