//! Answer handler

use axum::{extract::State, Json};
use serde::Deserialize;
use std::time::Instant;
use validator::Validate;

use crate::AppState;
use seekr_common::{
    errors::{AppError, Result},
    metrics,
    model::{Answer, SourceType},
};
use seekr_pipeline::orchestrator::SearchJob;

/// Answer request
#[derive(Debug, Deserialize, Validate)]
pub struct SearchRequest {
    #[validate(length(min = 1, max = 2000))]
    pub query: String,

    /// Maximum pages fetched per sub-task
    #[serde(default)]
    pub max_web: Option<usize>,

    /// Final top-K chunks kept for fusion
    #[serde(default)]
    pub top_chunks: Option<usize>,

    /// Latency-optimized profile
    #[serde(default)]
    pub fast: bool,

    /// Run the verification pass
    #[serde(default = "default_verify")]
    pub verify: bool,

    /// Restrict collection to these source categories
    #[serde(default)]
    pub sources: Option<Vec<SourceType>>,
}

fn default_verify() -> bool {
    true
}

impl SearchRequest {
    pub(crate) fn into_job(self) -> SearchJob {
        SearchJob {
            query: self.query,
            max_web: self.max_web,
            top_chunks: self.top_chunks,
            fast: self.fast,
            verify: self.verify,
            sources: self.sources,
        }
    }
}

/// Answer one query
pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<Answer>> {
    let start = Instant::now();
    let request_metrics = metrics::RequestMetrics::start("/v1/search");

    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("query".to_string()),
    })?;

    let job = request.into_job();
    let query = job.query.clone();
    let fast = job.fast;

    let answer = state.orchestrator.answer(&job).await?;

    let latency_ms = start.elapsed().as_millis() as u64;
    request_metrics.finish(200);

    tracing::info!(
        query = %query,
        sources = answer.sources.len(),
        images = answer.images.len(),
        latency_ms,
        fast,
        "Search completed"
    );

    Ok(Json(answer))
}
