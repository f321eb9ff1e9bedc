//! harmon web server
//!
//! Axum-based REST API over the comparison orchestrator and result store.
//!
//! - `POST /api/comparisons` runs a comparison
//! - `GET  /api/comparisons` lists stored comparisons, newest first
//! - `GET  /api/comparisons/stats` aggregates statistics across the store
//! - `GET  /api/comparisons/:id` fetches one comparison
//! - `GET  /api/health` reports provider reachability
//!
//! Validation failures map to 400, unknown ids to 404, everything else to a
//! sanitized 500 with the full error kept in the server log.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use harmon_core::{ComparisonStore, Orchestrator};

mod handlers;

#[cfg(test)]
mod tests;

/// Maximum pagination limit
pub const MAX_PAGE_LIMIT: usize = 1000;

/// Shared application state
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub store: Arc<dyn ComparisonStore>,
}

/// Build the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route(
            "/api/comparisons",
            post(handlers::create_comparison).get(handlers::list_comparisons),
        )
        .route("/api/comparisons/stats", get(handlers::comparison_stats))
        .route("/api/comparisons/:id", get(handlers::get_comparison))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until shutdown
pub async fn serve(host: &str, port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    info!(host, port, "harmon server listening");
    axum::serve(listener, router).await?;
    Ok(())
}

/// API error with a sanitized client message
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Internal server error".to_string(),
            internal: Some(err.into()),
        }
    }
}
