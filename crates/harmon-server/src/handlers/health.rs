//! Health handler

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use harmon_core::classify::ClassifierBackend;
use harmon_core::duty::DutyBackend;

use crate::AppState;

/// Reachability of one configured backend
#[derive(Debug, Serialize)]
pub struct BackendHealth {
    pub host: String,
    pub healthy: bool,
}

/// Response for the health endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub reasoning: BackendHealth,
    pub structured: BackendHealth,
    pub duty: BackendHealth,
}

/// GET /api/health - liveness plus provider reachability
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (reasoning, structured, duty) = state.orchestrator.backends();
    Json(HealthResponse {
        status: "ok",
        reasoning: BackendHealth {
            host: reasoning.host().to_string(),
            healthy: reasoning.health_check().await,
        },
        structured: BackendHealth {
            host: structured.host().to_string(),
            healthy: structured.health_check().await,
        },
        duty: BackendHealth {
            host: duty.host().to_string(),
            healthy: duty.health_check().await,
        },
    })
}
