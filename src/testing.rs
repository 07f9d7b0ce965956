//! Scripted collaborators and helpers shared by unit tests.

use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Mutex,
};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;

use crate::config::{GenerationMode, Limits, McqParsePolicy, ModelSettings, Prompts, ServiceConfig};
use crate::error::{ExtractError, FetchError, ModelError};
use crate::fetcher::{ContentFetcher, TextExtractor};
use crate::model::CompletionModel;

pub fn test_config() -> ServiceConfig {
  ServiceConfig {
    port: 0,
    model: ModelSettings {
      api_key: "test-key".into(),
      base_url: "http://127.0.0.1:1".into(),
      model: "gemini-test".into(),
      temperature: 0.0,
      timeout: Duration::from_secs(5),
    },
    limits: Limits { request_timeout: Duration::from_secs(10), ..Limits::default() },
    generation_mode: GenerationMode::Batched,
    mcq_parse_policy: McqParsePolicy::Lenient,
    prompts: Prompts::default(),
  }
}

/// Serve `app` on an ephemeral local port; returns the base URL.
pub async fn serve(app: Router) -> String {
  let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
  format!("http://{addr}")
}

/// Replies from a fixed script, recording every prompt it receives.
/// A `None` entry makes that call fail.
pub struct ScriptedModel {
  replies: Vec<Option<String>>,
  delays_ms: Vec<u64>,
  calls: AtomicUsize,
  prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
  pub fn always(reply: &str) -> Self {
    Self::sequence(vec![reply.to_string()])
  }

  pub fn sequence(replies: Vec<String>) -> Self {
    Self::script(replies.into_iter().map(Some).collect())
  }

  /// Call `n` gets `replies[n]`; the last entry repeats.
  pub fn script(replies: Vec<Option<String>>) -> Self {
    Self { replies, delays_ms: Vec::new(), calls: AtomicUsize::new(0), prompts: Mutex::new(Vec::new()) }
  }

  pub fn failing() -> Self {
    Self::script(vec![None])
  }

  /// Call `n` sleeps `delays_ms[n]` before answering.
  pub fn with_delays(mut self, delays_ms: Vec<u64>) -> Self {
    self.delays_ms = delays_ms;
    self
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn prompts(&self) -> Vec<String> {
    self.prompts.lock().unwrap().clone()
  }
}

#[async_trait]
impl CompletionModel for ScriptedModel {
  async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
    let n = self.calls.fetch_add(1, Ordering::SeqCst);
    self.prompts.lock().unwrap().push(prompt.to_string());
    if let Some(ms) = self.delays_ms.get(n) {
      tokio::time::sleep(Duration::from_millis(*ms)).await;
    }
    self.replies.get(n).or_else(|| self.replies.last()).cloned().flatten().ok_or(ModelError::EmptyContent)
  }
}

pub struct StaticFetcher {
  result: Result<Vec<u8>, u16>,
}

impl StaticFetcher {
  pub fn ok(bytes: &[u8]) -> Self {
    Self { result: Ok(bytes.to_vec()) }
  }

  pub fn status(code: u16) -> Self {
    Self { result: Err(code) }
  }
}

#[async_trait]
impl ContentFetcher for StaticFetcher {
  async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
    match &self.result {
      Ok(bytes) => Ok(bytes.clone()),
      Err(code) => Err(FetchError::Status {
        url: url.to_string(),
        status: reqwest::StatusCode::from_u16(*code).unwrap(),
      }),
    }
  }
}

pub struct StaticExtractor {
  result: Result<String, String>,
}

impl StaticExtractor {
  pub fn ok(text: &str) -> Self {
    Self { result: Ok(text.to_string()) }
  }

  pub fn failing(reason: &str) -> Self {
    Self { result: Err(reason.to_string()) }
  }
}

#[async_trait]
impl TextExtractor for StaticExtractor {
  async fn extract_text(&self, _bytes: Vec<u8>) -> Result<String, ExtractError> {
    self.result.clone().map_err(ExtractError)
  }
}
