//! Turning raw model replies into records.
//!
//! Models wrap JSON in markdown fences, break lines inside arrays, and pad
//! plain-text lists with stray punctuation. Each normalizer tolerates that
//! noise; only the analysis path (and the MCQ path under
//! `McqParsePolicy::Strict`) reports a parse failure to the caller.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::McqParsePolicy;
use crate::domain::{AnalysisReport, DescriptiveItem, McqItem};
use crate::error::ParseError;
use crate::util::trunc_for_log;

fn fence_re() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"(?i)```(?:json)?").expect("fence pattern is valid"))
}

fn question_split_re() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"\n|\.\s+").expect("split pattern is valid"))
}

/// Remove ```` ```json ```` and bare ```` ``` ```` markers anywhere in the text.
pub fn strip_fences(raw: &str) -> String {
  fence_re().replace_all(raw, "").into_owned()
}

/// Parse an MCQ batch.
///
/// Fences and line breaks are removed so the rest is a single JSON line. The
/// reply should be an array of objects; a bare object counts as a batch of
/// one and non-object elements are dropped. Objects are kept as emitted.
pub fn normalize_mcq(raw: &str, policy: McqParsePolicy) -> Result<Vec<McqItem>, ParseError> {
  let cleaned: String = strip_fences(raw).chars().filter(|c| *c != '\n' && *c != '\r').collect();
  let cleaned = cleaned.trim();

  let parsed = match serde_json::from_str::<Value>(cleaned) {
    Ok(v) => v,
    Err(e) => {
      return match policy {
        McqParsePolicy::Lenient => {
          warn!(target: "normalize", error = %e, preview = %trunc_for_log(cleaned, 120), "Unparseable MCQ batch dropped");
          Ok(Vec::new())
        }
        McqParsePolicy::Strict => Err(ParseError::from(e)),
      };
    }
  };

  let elements = match parsed {
    Value::Array(items) => items,
    obj @ Value::Object(_) => vec![obj],
    other => {
      let found = json_kind(&other);
      return match policy {
        McqParsePolicy::Lenient => {
          warn!(target: "normalize", kind = found, "MCQ reply is JSON but not an array");
          Ok(Vec::new())
        }
        McqParsePolicy::Strict => Err(ParseError::Shape { expected: "array of objects", found }),
      };
    }
  };

  let total = elements.len();
  let items: Vec<McqItem> = elements
    .into_iter()
    .filter_map(|v| match v {
      Value::Object(map) => Some(McqItem(map)),
      _ => None,
    })
    .collect();
  if items.len() < total {
    debug!(target: "normalize", dropped = total - items.len(), "Non-object MCQ elements dropped");
  }
  Ok(items)
}

/// Split a plain-text reply into descriptive questions.
///
/// Splits on newlines and on a period followed by whitespace, so an
/// abbreviation like "e.g. " also splits. Fragments of two characters or
/// fewer are discarded.
pub fn normalize_descriptive(raw: &str) -> Vec<DescriptiveItem> {
  question_split_re()
    .split(raw.trim())
    .map(str::trim)
    .filter(|s| s.chars().count() > 2)
    .map(|s| DescriptiveItem { question: s.to_string() })
    .collect()
}

/// Parse the analysis report. Invalid JSON is an error here.
pub fn normalize_analysis(raw: &str) -> Result<AnalysisReport, ParseError> {
  let cleaned = strip_fences(raw);
  let value = serde_json::from_str::<Value>(cleaned.trim())?;
  Ok(AnalysisReport(value))
}

fn json_kind(v: &Value) -> &'static str {
  match v {
    Value::Null => "null",
    Value::Bool(_) => "bool",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}
