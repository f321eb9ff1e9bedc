//! Comparison handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use harmon_core::models::{AggregateComparisonResult, ComparisonRequest};
use harmon_core::store::ComparisonStats;
use harmon_core::{ComparisonStore, Error};

use crate::{AppError, AppState, MAX_PAGE_LIMIT};

/// Query parameters for listing comparisons
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Maximum number of comparisons to return (default 50)
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// POST /api/comparisons - run a comparison
///
/// Returns the full aggregate; provider failures are carried inside it, so
/// a partial result is still a 200.
pub async fn create_comparison(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ComparisonRequest>,
) -> Result<Json<AggregateComparisonResult>, AppError> {
    match state.orchestrator.compare(request).await {
        Ok(aggregate) => Ok(Json(aggregate)),
        Err(Error::Validation(msg)) => Err(AppError::bad_request(&msg)),
        Err(e) => Err(AppError::from(e)),
    }
}

/// GET /api/comparisons - list stored comparisons, newest first
pub async fn list_comparisons(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListQuery>,
) -> Result<Json<Vec<AggregateComparisonResult>>, AppError> {
    let limit = params.limit.min(MAX_PAGE_LIMIT);
    let comparisons = state
        .store
        .list()
        .await
        .into_iter()
        .take(limit)
        .map(|c| (*c).clone())
        .collect();
    Ok(Json(comparisons))
}

/// GET /api/comparisons/stats - aggregate statistics over the store
pub async fn comparison_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ComparisonStats>, AppError> {
    Ok(Json(state.store.stats().await))
}

/// GET /api/comparisons/:id - fetch one comparison
pub async fn get_comparison(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<AggregateComparisonResult>, AppError> {
    match state.store.get(id).await {
        Some(comparison) => Ok(Json((*comparison).clone())),
        None => Err(AppError::not_found(&format!("No comparison with id {}", id))),
    }
}
