use std::time::{Duration, Instant};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decision::engine::BatchOptions;
use crate::decision::models::{
    BatchOutcome, Decision, FeedbackStatus, FeedbackTarget, Insights, Outcome, RawFeatures,
    TrainingSummary,
};
use crate::decision::persistence::EngineSnapshot;
use crate::decision::worker::flush_if_dirty;
use crate::errors::AppError;
use crate::state::AppState;

const DEFAULT_HISTORY_LIMIT: usize = 50;
const RATING_RANGE: std::ops::RangeInclusive<f64> = 1.0..=5.0;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeRequest {
    pub target: FeedbackTarget,
    pub accepted: bool,
    #[serde(default)]
    pub rating: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub outcomes: Vec<BatchOutcome>,
    #[serde(default)]
    pub learning_rate_boost: Option<f64>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetResponse {
    pub bootstrap_samples: usize,
    pub insights: Insights,
}

fn check_rating(rating: Option<f64>) -> Result<(), AppError> {
    match rating {
        Some(r) if !RATING_RANGE.contains(&r) => Err(AppError::Validation(format!(
            "rating must lie in [1, 5] (got {r})"
        ))),
        _ => Ok(()),
    }
}

/// POST /api/v1/decisions/evaluate
pub async fn handle_evaluate(
    State(state): State<AppState>,
    Json(raw): Json<RawFeatures>,
) -> Json<Decision> {
    Json(state.engine.evaluate_candidate(&raw))
}

/// POST /api/v1/decisions/outcome
pub async fn handle_outcome(
    State(state): State<AppState>,
    Json(req): Json<OutcomeRequest>,
) -> Result<Json<FeedbackStatus>, AppError> {
    check_rating(req.rating)?;
    let status = state
        .training
        .record(
            req.target,
            Outcome {
                accepted: req.accepted,
                rating: req.rating,
            },
        )
        .await?;
    Ok(Json(status))
}

/// POST /api/v1/decisions/outcomes/batch
pub async fn handle_batch(
    State(state): State<AppState>,
    Json(req): Json<BatchRequest>,
) -> Result<Json<TrainingSummary>, AppError> {
    for item in &req.outcomes {
        check_rating(item.rating)?;
    }
    let boost = req.learning_rate_boost.unwrap_or(1.0);
    if !(boost.is_finite() && boost > 0.0) {
        return Err(AppError::Validation(format!(
            "learningRateBoost must be a positive number (got {boost})"
        )));
    }

    let options = BatchOptions {
        learning_rate_boost: boost,
        deadline: req
            .timeout_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms)),
        cancel: None,
    };
    let summary = state.training.batch(req.outcomes, options).await?;
    Ok(Json(summary))
}

/// GET /api/v1/decisions/insights
pub async fn handle_insights(State(state): State<AppState>) -> Json<Insights> {
    Json(state.engine.insights())
}

/// GET /api/v1/decisions/state
pub async fn handle_export_state(State(state): State<AppState>) -> Json<EngineSnapshot> {
    Json(state.engine.export_state())
}

/// PUT /api/v1/decisions/state
pub async fn handle_import_state(
    State(state): State<AppState>,
    Json(snapshot): Json<EngineSnapshot>,
) -> Result<StatusCode, AppError> {
    state.engine.import_state(snapshot)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/decisions/reset
pub async fn handle_reset(State(state): State<AppState>) -> Result<Json<ResetResponse>, AppError> {
    let engine = state.engine.clone();
    let bootstrap_samples = tokio::task::spawn_blocking(move || engine.reset())
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("reset task failed: {e}")))??;

    // persist the fresh state now rather than waiting for the debounce
    flush_if_dirty(&state.engine, state.snapshots.as_ref()).await;

    Ok(Json(ResetResponse {
        bootstrap_samples,
        insights: state.engine.insights(),
    }))
}

/// GET /api/v1/decisions/history?limit=
pub async fn handle_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> Json<Vec<Decision>> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(state.engine.config().max_history_size);
    Json(state.engine.recent_decisions(limit))
}

/// GET /api/v1/decisions/history/:id
pub async fn handle_get_decision(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Decision>, AppError> {
    state
        .engine
        .decision(id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Decision {id} is not in history")))
}
