//! Domain models: question requests, generated records, and the analysis report.
//! Everything here is request-scoped.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which kind of question the client asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuestionKind {
  Mcq,
  Descriptive,
}

impl QuestionKind {
  /// `"mcq"` selects multiple choice; any other label is descriptive.
  pub fn from_label(label: &str) -> Self {
    if label == "mcq" { QuestionKind::Mcq } else { QuestionKind::Descriptive }
  }
}

/// Validated generation parameters.
#[derive(Clone, Debug)]
pub struct QuestionRequest {
  pub kind: QuestionKind,
  pub count: u32,
  pub topic: String,
  /// Extracted document text used as grounding context.
  pub source_text: Option<String>,
}

/// A multiple-choice record exactly as the model emitted it.
///
/// The model is asked for `question, opt1..opt4, correctAnswer`, but fields are
/// not validated. Key order is kept so spreadsheet columns follow it.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct McqItem(pub Map<String, Value>);

impl McqItem {
  pub fn fields(&self) -> &Map<String, Value> {
    &self.0
  }

  pub fn question(&self) -> Option<&str> {
    self.0.get("question").and_then(Value::as_str)
  }

  /// The four options in order, where present as strings.
  pub fn options(&self) -> Vec<&str> {
    ["opt1", "opt2", "opt3", "opt4"]
      .iter()
      .filter_map(|k| self.0.get(*k).and_then(Value::as_str))
      .collect()
  }

  /// 1-based index of the correct option, if the model produced a usable one.
  pub fn correct_option_index(&self) -> Option<u8> {
    let v = self.0.get("correctAnswer")?;
    let n = match v {
      Value::Number(n) => n.as_u64()?,
      Value::String(s) => s.trim().parse().ok()?,
      _ => return None,
    };
    (1..=4).contains(&n).then_some(n as u8)
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DescriptiveItem {
  pub question: String,
}

/// A quiz attempt record submitted for analysis. Passed to the model verbatim,
/// so unknown fields are preserved.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AnalysisRecord(pub Value);

/// Section keys the analysis prompt asks the model to fill.
pub const REPORT_SECTIONS: [&str; 6] = [
  "accuracySummary",
  "topicPerformance",
  "questionSuggestions",
  "strengths",
  "appreciations",
  "recommendations",
];

/// The model's analysis. Only JSON validity is enforced; the shape is a
/// contract with the prompt.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AnalysisReport(pub Value);

impl AnalysisReport {
  pub fn section(&self, key: &str) -> Option<&Value> {
    self.0.get(key)
  }

  /// Sections from `REPORT_SECTIONS` the model left out.
  pub fn missing_sections(&self) -> Vec<&'static str> {
    REPORT_SECTIONS.iter().copied().filter(|k| self.section(k).is_none()).collect()
  }
}
