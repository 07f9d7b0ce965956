//! Source document retrieval: HTTP download plus PDF text extraction.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use tracing::{info, instrument};

use crate::error::{ExtractError, FetchError};

#[async_trait]
pub trait ContentFetcher: Send + Sync {
  async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
  async fn extract_text(&self, bytes: Vec<u8>) -> Result<String, ExtractError>;
}

/// Plain GET over reqwest. No size or content-type checks: callers pass trusted URLs.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
  client: reqwest::Client,
}

impl HttpFetcher {
  pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Self { client })
  }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
  #[instrument(level = "info", skip(self))]
  async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
    let transport = |source: reqwest::Error| FetchError::Transport { url: url.to_string(), source };

    let res = self.client.get(url)
      .header(USER_AGENT, "quizgen-backend/0.1")
      .send().await.map_err(transport)?;

    let status = res.status();
    if !status.is_success() {
      return Err(FetchError::Status { url: url.to_string(), status });
    }

    let bytes = res.bytes().await.map_err(transport)?;
    info!(len = bytes.len(), "Source document downloaded");
    Ok(bytes.to_vec())
  }
}

/// `pdf-extract` on the blocking pool. A panicking decoder counts as a malformed PDF.
#[derive(Clone, Copy, Debug, Default)]
pub struct PdfTextExtractor;

#[async_trait]
impl TextExtractor for PdfTextExtractor {
  #[instrument(level = "info", skip_all, fields(len = bytes.len()))]
  async fn extract_text(&self, bytes: Vec<u8>) -> Result<String, ExtractError> {
    let joined = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes)).await;
    match joined {
      Ok(Ok(text)) => {
        info!(chars = text.chars().count(), "PDF text extracted");
        Ok(text)
      }
      Ok(Err(e)) => Err(ExtractError(e.to_string())),
      Err(e) => Err(ExtractError(format!("decoder aborted: {e}"))),
    }
  }
}
