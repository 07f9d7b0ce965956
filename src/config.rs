//! Service configuration from the environment, plus optional prompt overrides
//! loaded from TOML.
//!
//! See `ServiceConfig::from_env` for the variables and `Prompts` for the TOML schema.

use std::{str::FromStr, time::Duration};

use serde::Deserialize;
use tracing::{error, info};

use crate::error::ConfigError;

pub const DEFAULT_MODEL_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const DEFAULT_MODEL_NAME: &str = "gemini-1.5-flash";

/// How `count` questions are requested from the model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerationMode {
  /// One prompt asking for all questions at once.
  Batched,
  /// One prompt per question, fanned out with bounded concurrency.
  PerItem,
}

impl FromStr for GenerationMode {
  type Err = ();
  fn from_str(s: &str) -> Result<Self, ()> {
    match s.trim().to_ascii_lowercase().as_str() {
      "batched" => Ok(Self::Batched),
      "per_item" | "per-item" => Ok(Self::PerItem),
      _ => Err(()),
    }
  }
}

/// What happens when an MCQ batch is not parseable JSON.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum McqParsePolicy {
  /// The batch contributes no items; the request carries on.
  Lenient,
  /// The request fails with a generation error.
  Strict,
}

impl FromStr for McqParsePolicy {
  type Err = ();
  fn from_str(s: &str) -> Result<Self, ()> {
    match s.trim().to_ascii_lowercase().as_str() {
      "lenient" => Ok(Self::Lenient),
      "strict" => Ok(Self::Strict),
      _ => Err(()),
    }
  }
}

#[derive(Clone, Debug)]
pub struct ModelSettings {
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  pub temperature: f32,
  pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct Limits {
  pub request_timeout: Duration,
  pub fetch_timeout: Duration,
  pub max_source_chars: usize,
  pub max_questions: u32,
  pub generation_concurrency: usize,
}

impl Default for Limits {
  fn default() -> Self {
    Self {
      request_timeout: Duration::from_secs(120),
      fetch_timeout: Duration::from_secs(30),
      max_source_chars: 20_000,
      max_questions: 50,
      generation_concurrency: 4,
    }
  }
}

#[derive(Clone, Debug)]
pub struct ServiceConfig {
  pub port: u16,
  pub model: ModelSettings,
  pub limits: Limits,
  pub generation_mode: GenerationMode,
  pub mcq_parse_policy: McqParsePolicy,
  pub prompts: Prompts,
}

impl ServiceConfig {
  /// Read every setting once at startup.
  ///
  ///   PORT                   : u16 (default 3000)
  ///   GEMINI_API_KEY         : required
  ///   MODEL_BASE_URL         : OpenAI-compatible endpoint (default Gemini's)
  ///   MODEL_NAME             : default "gemini-1.5-flash"
  ///   MODEL_TEMPERATURE      : default 0.7
  ///   MODEL_TIMEOUT_SECS     : default 60
  ///   FETCH_TIMEOUT_SECS     : default 30
  ///   REQUEST_TIMEOUT_SECS   : default 120
  ///   MAX_SOURCE_CHARS       : default 20000
  ///   MAX_QUESTIONS          : default 50
  ///   GENERATION_MODE        : "batched" (default) | "per_item"
  ///   GENERATION_CONCURRENCY : default 4
  ///   MCQ_PARSE_POLICY       : "lenient" (default) | "strict"
  ///   PROMPTS_CONFIG_PATH    : optional TOML with a [prompts] table
  pub fn from_env() -> Result<Self, ConfigError> {
    Self::from_lookup(|name| std::env::var(name).ok())
  }

  /// Same as `from_env`, reading variables through `lookup`.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
    let api_key = lookup("GEMINI_API_KEY")
      .filter(|k| !k.trim().is_empty())
      .ok_or(ConfigError::MissingVar("GEMINI_API_KEY"))?;

    let var = |name: &'static str| lookup(name).map(|raw| (name, raw));
    let defaults = Limits::default();
    let limits = Limits {
      request_timeout: Duration::from_secs(or_default(var("REQUEST_TIMEOUT_SECS"), defaults.request_timeout.as_secs(), "seconds")?),
      fetch_timeout: Duration::from_secs(or_default(var("FETCH_TIMEOUT_SECS"), defaults.fetch_timeout.as_secs(), "seconds")?),
      max_source_chars: or_default(var("MAX_SOURCE_CHARS"), defaults.max_source_chars, "a character count")?,
      max_questions: or_default(var("MAX_QUESTIONS"), defaults.max_questions, "a positive integer")?,
      generation_concurrency: or_default(var("GENERATION_CONCURRENCY"), defaults.generation_concurrency, "a positive integer")?
        .max(1),
    };

    let model = ModelSettings {
      api_key,
      base_url: lookup("MODEL_BASE_URL").unwrap_or_else(|| DEFAULT_MODEL_BASE_URL.into()),
      model: lookup("MODEL_NAME").unwrap_or_else(|| DEFAULT_MODEL_NAME.into()),
      temperature: or_default(var("MODEL_TEMPERATURE"), 0.7, "a number")?,
      timeout: Duration::from_secs(or_default(var("MODEL_TIMEOUT_SECS"), 60, "seconds")?),
    };

    let prompts = lookup("PROMPTS_CONFIG_PATH").and_then(|path| load_prompts(&path)).unwrap_or_default();

    Ok(Self {
      port: or_default(var("PORT"), 3000, "a port number")?,
      model,
      limits,
      generation_mode: or_default(var("GENERATION_MODE"), GenerationMode::Batched, "\"batched\" or \"per_item\"")?,
      mcq_parse_policy: or_default(var("MCQ_PARSE_POLICY"), McqParsePolicy::Lenient, "\"lenient\" or \"strict\"")?,
      prompts,
    })
  }
}

fn or_default<T: FromStr>(var: Option<(&'static str, String)>, default: T, expected: &'static str) -> Result<T, ConfigError> {
  match var {
    Some((name, raw)) => parse_value(name, &raw, expected),
    None => Ok(default),
  }
}

fn parse_value<T: FromStr>(name: &'static str, raw: &str, expected: &'static str) -> Result<T, ConfigError> {
  raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidVar { name, value: raw.to_string(), expected })
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PromptsFile {
  #[serde(default)]
  pub prompts: Prompts,
}

/// Prompt templates. Placeholders are `{count}`, `{topic}`, `{context}`
/// (grounding block, may be empty), `{source}` (inside `context`), and
/// `{records_json}` (analysis).
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub mcq_single: String,
  pub mcq_batch: String,
  pub descriptive_single: String,
  pub descriptive_batch: String,
  pub context: String,
  pub analysis: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      mcq_single: "Generate one multiple-choice question about \"{topic}\".{context}\nReturn ONLY a JSON array holding exactly one object with the keys \"question\", \"opt1\", \"opt2\", \"opt3\", \"opt4\" and \"correctAnswer\" (the number 1-4 of the correct option). No explanations.".into(),
      mcq_batch: "Generate {count} multiple-choice questions about \"{topic}\".{context}\nReturn ONLY a JSON array of {count} objects, each with the keys \"question\", \"opt1\", \"opt2\", \"opt3\", \"opt4\" and \"correctAnswer\" (the number 1-4 of the correct option). No explanations.".into(),
      descriptive_single: "Generate one descriptive (open-ended) question about \"{topic}\".{context}\nReturn ONLY the question text on a single line, without options, numbering or answers.".into(),
      descriptive_batch: "Generate {count} descriptive (open-ended) questions about \"{topic}\".{context}\nReturn ONLY the questions, one per line, without options, numbering or answers.".into(),
      context: "\nBase the questions strictly on the following source material:\n\"\"\"\n{source}\n\"\"\"".into(),
      analysis: ANALYSIS_TEMPLATE.into(),
    }
  }
}

const ANALYSIS_TEMPLATE: &str = r#"You are an educational assessment assistant. Analyze the following quiz attempt.
Each record has questionId, questionText, optedAnswer, correctAnswer and options.

Attempt records (JSON):
{records_json}

Respond ONLY with a JSON object of exactly this shape:
{
  "accuracySummary": [{"totalQuestions": number, "correctAnswers": number, "accuracyPercentage": number, "summary": string}],
  "topicPerformance": [{"topic": string, "level": "best" | "weak", "reason": string}],
  "questionSuggestions": [{"questionId": string, "suggestion": string}],
  "strengths": [{"area": string, "detail": string}],
  "appreciations": [{"message": string}],
  "recommendations": [{"action": string, "detail": string}]
}"#;

/// Attempt to load prompt overrides from the TOML file at `path` (PROMPTS_CONFIG_PATH).
/// On any parsing/IO error, returns None.
pub fn load_prompts(path: &str) -> Option<Prompts> {
  match std::fs::read_to_string(path) {
    Ok(s) => match toml::from_str::<PromptsFile>(&s) {
      Ok(cfg) => {
        info!(target: "quizgen_backend", %path, "Loaded prompt overrides (TOML)");
        Some(cfg.prompts)
      }
      Err(e) => {
        error!(target: "quizgen_backend", %path, error = %e, "Failed to parse TOML prompts");
        None
      }
    },
    Err(e) => {
      error!(target: "quizgen_backend", %path, error = %e, "Failed to read TOML prompts file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn modes_and_policies_parse_loosely() {
    assert_eq!("Batched".parse::<GenerationMode>(), Ok(GenerationMode::Batched));
    assert_eq!(" per-item ".parse::<GenerationMode>(), Ok(GenerationMode::PerItem));
    assert!("parallel".parse::<GenerationMode>().is_err());
    assert_eq!("STRICT".parse::<McqParsePolicy>(), Ok(McqParsePolicy::Strict));
  }

  #[test]
  fn invalid_values_name_the_variable() {
    let err = parse_value::<u16>("PORT", "eighty", "a port number").unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("PORT") && msg.contains("eighty"), "{msg}");
  }

  fn lookup_from<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
    move |name: &str| vars.iter().find(|(k, _)| *k == name).map(|(_, v)| v.to_string())
  }

  #[test]
  fn missing_or_blank_api_key_is_rejected() {
    assert!(matches!(
      ServiceConfig::from_lookup(lookup_from(&[])),
      Err(ConfigError::MissingVar("GEMINI_API_KEY"))
    ));
    assert!(matches!(
      ServiceConfig::from_lookup(lookup_from(&[("GEMINI_API_KEY", "  ")])),
      Err(ConfigError::MissingVar("GEMINI_API_KEY"))
    ));
  }

  #[test]
  fn defaults_apply_when_only_the_key_is_set() {
    let cfg = ServiceConfig::from_lookup(lookup_from(&[("GEMINI_API_KEY", "k")])).unwrap();
    assert_eq!(cfg.port, 3000);
    assert_eq!(cfg.model.base_url, DEFAULT_MODEL_BASE_URL);
    assert_eq!(cfg.model.model, DEFAULT_MODEL_NAME);
    assert_eq!(cfg.limits.request_timeout, Duration::from_secs(120));
    assert_eq!(cfg.limits.max_questions, 50);
    assert_eq!(cfg.generation_mode, GenerationMode::Batched);
    assert_eq!(cfg.mcq_parse_policy, McqParsePolicy::Lenient);
  }

  #[test]
  fn overrides_are_parsed() {
    let vars = [
      ("GEMINI_API_KEY", "k"),
      ("PORT", "8080"),
      ("GENERATION_MODE", "per_item"),
      ("GENERATION_CONCURRENCY", "0"),
      ("MCQ_PARSE_POLICY", "strict"),
      ("MAX_SOURCE_CHARS", "500"),
    ];
    let cfg = ServiceConfig::from_lookup(lookup_from(&vars)).unwrap();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.generation_mode, GenerationMode::PerItem);
    assert_eq!(cfg.limits.generation_concurrency, 1);
    assert_eq!(cfg.mcq_parse_policy, McqParsePolicy::Strict);
    assert_eq!(cfg.limits.max_source_chars, 500);
  }

  #[test]
  fn invalid_override_fails_startup() {
    let vars = [("GEMINI_API_KEY", "k"), ("REQUEST_TIMEOUT_SECS", "soon")];
    assert!(matches!(
      ServiceConfig::from_lookup(lookup_from(&vars)),
      Err(ConfigError::InvalidVar { name: "REQUEST_TIMEOUT_SECS", .. })
    ));
  }

  #[test]
  fn partial_toml_keeps_default_templates() {
    let file: PromptsFile = toml::from_str("[prompts]\nmcq_batch = \"Give {count} on {topic}{context}\"\n").unwrap();
    assert_eq!(file.prompts.mcq_batch, "Give {count} on {topic}{context}");
    assert_eq!(file.prompts.analysis, Prompts::default().analysis);
  }
}
