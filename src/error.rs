//! Error taxonomy for collaborators and the request-level `ApiError`.
//!
//! Collaborator errors keep their full detail for server-side logs. `ApiError`
//! turns them into a status code plus a short fixed message for the client.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use thiserror::Error;
use tracing::{error, warn};

use crate::protocol::ErrorOut;

/// Retrieving the source document over HTTP failed.
#[derive(Debug, Error)]
pub enum FetchError {
  #[error("request to {url} failed: {source}")]
  Transport {
    url: String,
    #[source]
    source: reqwest::Error,
  },
  #[error("{url} answered with HTTP {status}")]
  Status { url: String, status: reqwest::StatusCode },
}

/// The fetched bytes could not be decoded as a PDF.
#[derive(Debug, Error)]
#[error("PDF text extraction failed: {0}")]
pub struct ExtractError(pub String);

/// The language-model round trip failed.
#[derive(Debug, Error)]
pub enum ModelError {
  #[error("model request failed: {0}")]
  Transport(#[source] reqwest::Error),
  #[error("model HTTP {status}: {message}")]
  Status { status: reqwest::StatusCode, message: String },
  #[error("model response could not be decoded: {0}")]
  Decode(#[source] reqwest::Error),
  #[error("model returned no content")]
  EmptyContent,
}

/// Model output was not the JSON shape we asked for.
#[derive(Debug, Error)]
pub enum ParseError {
  #[error("model output is not valid JSON: {0}")]
  Json(#[from] serde_json::Error),
  #[error("model output is a JSON {found}, expected {expected}")]
  Shape { expected: &'static str, found: &'static str },
}

#[derive(Debug, Error)]
pub enum AssemblyError {
  #[error("workbook has no sheets to encode")]
  EmptyWorkbook,
  #[error("table exceeds xlsx row/column limits")]
  TooLarge,
  #[error("xlsx encoding failed: {0}")]
  Encode(#[from] rust_xlsxwriter::XlsxError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("environment variable {0} is not set")]
  MissingVar(&'static str),
  #[error("environment variable {name}={value:?} is invalid: expected {expected}")]
  InvalidVar { name: &'static str, value: String, expected: &'static str },
}

/// Which pipeline a model or parse failure belongs to. The two paths answer
/// with different client messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Task {
  Generation,
  Analysis,
}

impl Task {
  fn public_message(self) -> &'static str {
    match self {
      Task::Generation => "Error generating questions",
      Task::Analysis => "Failed to analyze questions",
    }
  }
}

/// Request-level failure returned by handlers.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("invalid request: {0}")]
  BadRequest(String),
  #[error(transparent)]
  Fetch(#[from] FetchError),
  #[error(transparent)]
  Extract(#[from] ExtractError),
  #[error("{task:?}: {source}")]
  Model {
    task: Task,
    #[source]
    source: ModelError,
  },
  #[error("{task:?}: {source}")]
  Parse {
    task: Task,
    #[source]
    source: ParseError,
  },
  #[error(transparent)]
  Assembly(#[from] AssemblyError),
  #[error("deadline exceeded during {stage}")]
  Timeout { stage: &'static str },
}

impl ApiError {
  pub fn model(task: Task) -> impl FnOnce(ModelError) -> Self {
    move |source| ApiError::Model { task, source }
  }

  pub fn parse(task: Task) -> impl FnOnce(ParseError) -> Self {
    move |source| ApiError::Parse { task, source }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  /// Message shown to the client. Underlying detail stays in the logs.
  pub fn public_message(&self) -> String {
    match self {
      ApiError::BadRequest(msg) => msg.clone(),
      ApiError::Fetch(_) | ApiError::Extract(_) => "Error fetching PDF content".into(),
      ApiError::Model { task, .. } | ApiError::Parse { task, .. } => task.public_message().into(),
      ApiError::Assembly(_) => "Error creating Excel file".into(),
      ApiError::Timeout { .. } => "Request timed out".into(),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      error!(target: "quizgen_backend", %status, error = %self, "Request failed");
    } else {
      warn!(target: "quizgen_backend", %status, error = %self, "Request rejected");
    }
    (status, Json(ErrorOut { error: self.public_message() })).into_response()
  }
}
