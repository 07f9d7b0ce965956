//! Router assembly: HTTP endpoints, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - `POST /generate-questions` (xlsx download)
/// - `POST /analyze-questions` (JSON report)
/// - `GET /hitme` liveness probe
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/generate-questions", post(http::http_generate_questions))
        .route("/analyze-questions", post(http::http_analyze_questions))
        .route("/hitme", get(http::http_hitme))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::report::{tests::read_back, MCQ_SHEET, XLSX_MIME};
    use crate::testing::{test_config, ScriptedModel, StaticExtractor, StaticFetcher};

    fn app(model: ScriptedModel) -> Router {
        let state = AppState::with_collaborators(
            &test_config(),
            Arc::new(StaticFetcher::ok(b"%PDF")),
            Arc::new(StaticExtractor::ok("source text")),
            Arc::new(model),
        );
        build_router(Arc::new(state))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_bytes(res: Response) -> Vec<u8> {
        to_bytes(res.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    async fn body_json(res: Response) -> Value {
        serde_json::from_slice(&body_bytes(res).await).unwrap()
    }

    #[tokio::test]
    async fn hitme_answers_created() {
        let res = app(ScriptedModel::failing())
            .oneshot(Request::get("/hitme").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(body_json(res).await, json!({"msg": "Server is Hitted Up and Running"}));
    }

    #[tokio::test]
    async fn generate_returns_one_sheet_workbook() {
        let model = ScriptedModel::always(
            r#"```json[{"question":"Q1","opt1":"a","opt2":"b","opt3":"c","opt4":"d","correctAnswer":1}]```"#,
        );
        let req = post_json(
            "/generate-questions",
            json!({"questionType": "mcq", "numberOfQuestions": 2, "topic": "algebra"}),
        );
        let res = app(model).oneshot(req).await.unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_TYPE], XLSX_MIME);
        assert_eq!(
            res.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=questions.xlsx"
        );
        let sheets = read_back(body_bytes(res).await);
        assert_eq!(sheets.len(), 1);
        assert_eq!(sheets[0].0, MCQ_SHEET);
        assert_eq!(sheets[0].1.len(), 2);
        assert_eq!(sheets[0].1[1], ["Q1", "a", "b", "c", "d", "1"]);
    }

    #[tokio::test]
    async fn generate_rejects_bad_counts() {
        for count in [json!(0), json!(-1), json!(1.5), json!("lots")] {
            let req = post_json("/generate-questions", json!({"questionType": "mcq", "numberOfQuestions": count, "topic": "x"}));
            let res = app(ScriptedModel::failing()).oneshot(req).await.unwrap();
            assert_eq!(res.status(), StatusCode::BAD_REQUEST, "count {count}");
            assert!(body_json(res).await["error"].as_str().unwrap().contains("numberOfQuestions"));
        }
    }

    #[tokio::test]
    async fn generate_model_failure_is_500() {
        let req = post_json("/generate-questions", json!({"questionType": "descriptive", "numberOfQuestions": 1, "topic": "x"}));
        let res = app(ScriptedModel::failing()).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(res).await, json!({"error": "Error generating questions"}));
    }

    #[tokio::test]
    async fn analyze_requires_an_array() {
        let req = post_json("/analyze-questions", json!({"questions": "not-an-array"}));
        let res = app(ScriptedModel::failing()).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(res).await["error"].is_string());
    }

    #[tokio::test]
    async fn analyze_wraps_the_report() {
        let model = ScriptedModel::always("```json\n{\"appreciations\":[{\"message\":\"Great effort\"}]}\n```");
        let req = post_json(
            "/analyze-questions",
            json!({"questions": [{"questionId": "1", "questionText": "2+2?", "optedAnswer": "4", "correctAnswer": "4", "options": ["3","4"]}]}),
        );
        let res = app(model).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            body_json(res).await,
            json!({"analysis": {"appreciations": [{"message": "Great effort"}]}})
        );
    }

    #[tokio::test]
    async fn analyze_unparseable_reply_is_500() {
        let req = post_json("/analyze-questions", json!({"questions": []}));
        let res = app(ScriptedModel::always("no json here")).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(res).await, json!({"error": "Failed to analyze questions"}));
    }

    #[tokio::test]
    async fn malformed_body_is_400_with_error_shape() {
        let req = Request::post("/analyze-questions")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let res = app(ScriptedModel::failing()).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(res).await["error"].as_str().unwrap().starts_with("Invalid JSON body"));
    }
}
