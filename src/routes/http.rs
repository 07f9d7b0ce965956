//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented; pipeline failures become `ApiError` responses.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::logic::{analyze_questions, generate_questions, records_from_body, GenerationInput};
use crate::protocol::*;
use crate::report::XLSX_MIME;
use crate::state::AppState;

pub const HITME_MESSAGE: &str = "Server is Hitted Up and Running";

/// Liveness probe. Answers 201, which existing clients expect.
#[instrument(level = "info")]
pub async fn http_hitme() -> impl IntoResponse {
    (StatusCode::CREATED, Json(HitMeOut { msg: HITME_MESSAGE.into() }))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_generate_questions(
    State(state): State<Arc<AppState>>,
    body: Result<Json<GenerateQuestionsIn>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body.map_err(bad_json)?;
    let input = GenerationInput::from_body(body, state.limits.max_questions)?;
    let bytes = generate_questions(&state, input).await?;
    info!(target: "generation", bytes = bytes.len(), "HTTP workbook served");
    Ok((
        [
            (header::CONTENT_TYPE, XLSX_MIME),
            (header::CONTENT_DISPOSITION, "attachment; filename=questions.xlsx"),
        ],
        bytes,
    )
        .into_response())
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_analyze_questions(
    State(state): State<Arc<AppState>>,
    body: Result<Json<AnalyzeQuestionsIn>, JsonRejection>,
) -> Result<Json<AnalyzeQuestionsOut>, ApiError> {
    let Json(body) = body.map_err(bad_json)?;
    let records = records_from_body(body)?;
    let analysis = analyze_questions(&state, &records).await?;
    info!(target: "analysis", records = records.len(), "HTTP analysis served");
    Ok(Json(AnalyzeQuestionsOut { analysis }))
}

fn bad_json(rejection: JsonRejection) -> ApiError {
    ApiError::BadRequest(format!("Invalid JSON body: {}", rejection.body_text()))
}
