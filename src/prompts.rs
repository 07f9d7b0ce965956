//! Prompt construction for question generation and attempt analysis.

use tracing::warn;

use crate::config::Prompts;
use crate::domain::{AnalysisRecord, QuestionKind, QuestionRequest};
use crate::util::{fill_template, truncate_chars};

/// How many questions one prompt asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptMode {
  /// Exactly one question; the caller issues `count` prompts.
  Single,
  /// All `count` questions in one prompt.
  Batch,
}

/// Build the generation prompt for `req`.
///
/// Source text is embedded as grounding context, cut to `max_source_chars`
/// characters. All placeholders are filled in one pass, so braces inside the
/// topic or the document are never treated as placeholders.
pub fn build_generation_prompt(
  prompts: &Prompts,
  req: &QuestionRequest,
  mode: PromptMode,
  max_source_chars: usize,
) -> String {
  let template = match (req.kind, mode) {
    (QuestionKind::Mcq, PromptMode::Single) => &prompts.mcq_single,
    (QuestionKind::Mcq, PromptMode::Batch) => &prompts.mcq_batch,
    (QuestionKind::Descriptive, PromptMode::Single) => &prompts.descriptive_single,
    (QuestionKind::Descriptive, PromptMode::Batch) => &prompts.descriptive_batch,
  };

  let context = match req.source_text.as_deref().map(str::trim) {
    Some(src) if !src.is_empty() => {
      let cut = truncate_chars(src, max_source_chars);
      if cut.len() < src.len() {
        warn!(
          target: "prompts",
          source_chars = src.chars().count(),
          max_source_chars,
          "Source text truncated before embedding"
        );
      }
      fill_template(&prompts.context, &[("source", cut.as_ref())])
    }
    _ => String::new(),
  };

  let count = req.count.to_string();
  fill_template(
    template,
    &[("count", count.as_str()), ("topic", req.topic.as_str()), ("context", context.as_str())],
  )
}

/// Build the analysis prompt with the attempt records embedded as JSON.
pub fn build_analysis_prompt(prompts: &Prompts, records: &[AnalysisRecord]) -> Result<String, serde_json::Error> {
  let records_json = serde_json::to_string_pretty(records)?;
  Ok(fill_template(&prompts.analysis, &[("records_json", records_json.as_str())]))
}
