//! Request pipelines shared by the HTTP handlers.
//!
//!   generate: [fetch + extract] -> prompt -> model (1 or `count` calls) -> normalize -> xlsx
//!   analyze:  prompt -> model -> normalize -> report
//!
//! Every collaborator call runs under the request's `Deadline`. Nothing is retried.

use futures::{stream, StreamExt, TryStreamExt};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::{GenerationMode, McqParsePolicy};
use crate::domain::{AnalysisRecord, AnalysisReport, DescriptiveItem, McqItem, QuestionKind, QuestionRequest};
use crate::error::{ApiError, ParseError, Task};
use crate::normalize::{normalize_analysis, normalize_descriptive, normalize_mcq};
use crate::prompts::{build_analysis_prompt, build_generation_prompt, PromptMode};
use crate::protocol::{AnalyzeQuestionsIn, GenerateQuestionsIn};
use crate::report::build_spreadsheet;
use crate::state::AppState;
use crate::util::{trunc_for_log, Deadline};

/// Generation parameters after validation, before the source document is fetched.
#[derive(Clone, Debug)]
pub struct GenerationInput {
  pub kind: QuestionKind,
  pub count: u32,
  pub topic: String,
  pub file_url: Option<String>,
}

impl GenerationInput {
  pub fn from_body(body: GenerateQuestionsIn, max_questions: u32) -> Result<Self, ApiError> {
    let count = parse_count(&body.number_of_questions, max_questions)?;
    Ok(Self {
      kind: QuestionKind::from_label(body.question_type.as_deref().unwrap_or_default()),
      count,
      topic: body.topic.unwrap_or_default(),
      file_url: body.file_url.filter(|u| !u.trim().is_empty()),
    })
  }
}

/// `numberOfQuestions` must be a whole number in `1..=max`, given as a JSON
/// integer or an integer string.
fn parse_count(raw: &Value, max: u32) -> Result<u32, ApiError> {
  let n = match raw {
    Value::Number(n) => n.as_u64(),
    Value::String(s) => s.trim().parse::<u64>().ok(),
    _ => None,
  };
  match n {
    Some(n) if n >= 1 && n <= u64::from(max) => Ok(n as u32),
    _ => Err(ApiError::BadRequest(format!(
      "Invalid input: 'numberOfQuestions' must be an integer between 1 and {max}"
    ))),
  }
}

pub fn records_from_body(body: AnalyzeQuestionsIn) -> Result<Vec<AnalysisRecord>, ApiError> {
  match body.questions {
    Some(Value::Array(items)) => Ok(items.into_iter().map(AnalysisRecord).collect()),
    _ => Err(ApiError::BadRequest("Invalid input: 'questions' should be an array".into())),
  }
}

/// Download the document at `url` and extract its text.
#[instrument(level = "info", skip(state, deadline))]
pub async fn fetch_text(state: &AppState, url: &str, deadline: &Deadline) -> Result<String, ApiError> {
  let bytes = deadline
    .run("fetch", async { state.fetcher.fetch_bytes(url).await.map_err(ApiError::from) })
    .await?;
  deadline
    .run("extract", async { state.extractor.extract_text(bytes).await.map_err(ApiError::from) })
    .await
}

async fn complete(state: &AppState, prompt: &str, task: Task, deadline: &Deadline) -> Result<String, ApiError> {
  deadline
    .run("model", async { state.model.complete(prompt).await.map_err(ApiError::model(task)) })
    .await
}

/// Full generation pipeline; returns the xlsx buffer.
#[instrument(
  level = "info",
  skip(state, input),
  fields(request_id = %Uuid::new_v4(), kind = ?input.kind, count = input.count, has_file = input.file_url.is_some())
)]
pub async fn generate_questions(state: &AppState, input: GenerationInput) -> Result<Vec<u8>, ApiError> {
  let deadline = Deadline::after(state.limits.request_timeout);

  let source_text = match &input.file_url {
    Some(url) => Some(fetch_text(state, url, &deadline).await?),
    None => None,
  };

  let req = QuestionRequest { kind: input.kind, count: input.count, topic: input.topic, source_text };
  let replies = request_replies(state, &req, &deadline).await?;

  let (mcq, descriptive) = normalize_replies(req.kind, &replies, state.mcq_parse_policy)?;
  info!(
    target: "generation",
    requested = req.count,
    mcq = mcq.len(),
    descriptive = descriptive.len(),
    remaining = ?deadline.remaining(),
    "Questions normalized"
  );
  if let Some(first) = mcq.first().and_then(McqItem::question) {
    debug!(target: "generation", first = %trunc_for_log(first, 80), "First MCQ");
  }
  let off_schema = mcq.iter().filter(|m| m.options().len() != 4 || m.correct_option_index().is_none()).count();
  if off_schema > 0 {
    warn!(target: "generation", off_schema, "MCQ items kept despite missing options or answer index");
  }
  if mcq.len() + descriptive.len() < req.count as usize {
    warn!(target: "generation", requested = req.count, got = mcq.len() + descriptive.len(), "Model produced fewer questions than requested");
  }

  Ok(build_spreadsheet(&mcq, &descriptive)?)
}

/// One batched round trip, or `count` single-question prompts with bounded
/// fan-out. Replies come back in request-index order.
async fn request_replies(state: &AppState, req: &QuestionRequest, deadline: &Deadline) -> Result<Vec<String>, ApiError> {
  let max_chars = state.limits.max_source_chars;
  match state.generation_mode {
    GenerationMode::Batched => {
      let prompt = build_generation_prompt(&state.prompts, req, PromptMode::Batch, max_chars);
      let reply = complete(state, &prompt, Task::Generation, deadline).await?;
      debug!(target: "generation", preview = %trunc_for_log(&reply, 160), "Batched reply");
      Ok(vec![reply])
    }
    GenerationMode::PerItem => {
      let prompt = build_generation_prompt(&state.prompts, req, PromptMode::Single, max_chars);
      let prompt = prompt.as_str();
      stream::iter(0..req.count)
        .map(|index| async move {
          let reply = complete(state, prompt, Task::Generation, deadline).await?;
          debug!(target: "generation", index, preview = %trunc_for_log(&reply, 160), "Per-item reply");
          Ok::<_, ApiError>(reply)
        })
        .buffered(state.limits.generation_concurrency.max(1))
        .try_collect()
        .await
    }
  }
}

fn normalize_replies(
  kind: QuestionKind,
  replies: &[String],
  policy: McqParsePolicy,
) -> Result<(Vec<McqItem>, Vec<DescriptiveItem>), ApiError> {
  let mut mcq = Vec::new();
  let mut descriptive = Vec::new();
  for reply in replies {
    match kind {
      QuestionKind::Mcq => mcq.extend(normalize_mcq(reply, policy).map_err(ApiError::parse(Task::Generation))?),
      QuestionKind::Descriptive => descriptive.extend(normalize_descriptive(reply)),
    }
  }
  Ok((mcq, descriptive))
}

/// Full analysis pipeline.
#[instrument(level = "info", skip(state, records), fields(request_id = %Uuid::new_v4(), records = records.len()))]
pub async fn analyze_questions(state: &AppState, records: &[AnalysisRecord]) -> Result<AnalysisReport, ApiError> {
  let deadline = Deadline::after(state.limits.request_timeout);

  let prompt = build_analysis_prompt(&state.prompts, records)
    .map_err(|e| ApiError::parse(Task::Analysis)(ParseError::from(e)))?;
  let raw = complete(state, &prompt, Task::Analysis, &deadline).await?;

  let report = normalize_analysis(&raw).map_err(ApiError::parse(Task::Analysis))?;
  let missing = report.missing_sections();
  if !missing.is_empty() {
    warn!(target: "analysis", ?missing, "Analysis report lacks expected sections");
  }
  Ok(report)
}
