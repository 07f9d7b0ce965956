//! Application state: collaborators, prompts and limits shared by all handlers.
//!
//! State is built once in `main` from `ServiceConfig` and injected into the
//! router. Nothing in it is mutated by requests; tests build it with scripted
//! collaborators through `AppState::with_collaborators`.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::{GenerationMode, Limits, McqParsePolicy, Prompts, ServiceConfig};
use crate::fetcher::{ContentFetcher, HttpFetcher, PdfTextExtractor, TextExtractor};
use crate::model::{ChatModel, CompletionModel};

#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<dyn ContentFetcher>,
    pub extractor: Arc<dyn TextExtractor>,
    pub model: Arc<dyn CompletionModel>,
    pub prompts: Prompts,
    pub limits: Limits,
    pub generation_mode: GenerationMode,
    pub mcq_parse_policy: McqParsePolicy,
}

impl AppState {
    /// Build the production collaborators from configuration.
    #[instrument(level = "info", skip_all)]
    pub fn from_config(cfg: &ServiceConfig) -> Result<Self, reqwest::Error> {
        let model = ChatModel::new(&cfg.model)?;
        info!(target: "quizgen_backend", base_url = %model.base_url, model = %model.model, "Model client ready");

        let fetcher = HttpFetcher::new(cfg.limits.fetch_timeout)?;
        info!(
            target: "quizgen_backend",
            mode = ?cfg.generation_mode,
            mcq_parse_policy = ?cfg.mcq_parse_policy,
            max_source_chars = cfg.limits.max_source_chars,
            request_timeout = ?cfg.limits.request_timeout,
            "Generation settings"
        );

        Ok(Self::with_collaborators(
            cfg,
            Arc::new(fetcher),
            Arc::new(PdfTextExtractor),
            Arc::new(model),
        ))
    }

    pub fn with_collaborators(
        cfg: &ServiceConfig,
        fetcher: Arc<dyn ContentFetcher>,
        extractor: Arc<dyn TextExtractor>,
        model: Arc<dyn CompletionModel>,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            model,
            prompts: cfg.prompts.clone(),
            limits: cfg.limits.clone(),
            generation_mode: cfg.generation_mode,
            mcq_parse_policy: cfg.mcq_parse_policy,
        }
    }
}
