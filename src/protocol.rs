//! Public HTTP request/response bodies (serde ready).
//!
//! Inbound fields that need explicit validation are kept as raw JSON values so
//! a wrong type becomes our own 400 instead of an extractor rejection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::AnalysisReport;

#[derive(Debug, Deserialize)]
pub struct GenerateQuestionsIn {
    #[serde(rename = "questionType", default)]
    pub question_type: Option<String>,
    #[serde(rename = "numberOfQuestions", default)]
    pub number_of_questions: Value,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(rename = "fileUrl", default)]
    pub file_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeQuestionsIn {
    #[serde(default)]
    pub questions: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeQuestionsOut {
    pub analysis: AnalysisReport,
}

#[derive(Debug, Serialize)]
pub struct HitMeOut {
    pub msg: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
    pub error: String,
}
