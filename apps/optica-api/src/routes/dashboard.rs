//! Health and reporting handlers.

use axum::extract::State;
use axum::Json;

use optica_core::DashboardSummary;

use crate::api_types::{Health, Success};
use crate::error::{ApiError, ErrorCode};
use crate::state::AppState;

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Result<Json<Success<Health>>, ApiError> {
    if !state.db.health_check().await {
        return Err(ApiError::new(ErrorCode::Unavailable, "Database is not responding"));
    }
    Ok(Json(Success::new(Health {
        status: "ok",
        database: true,
    })))
}

/// `GET /dashboard/summary`
pub async fn summary(State(state): State<AppState>) -> Result<Json<Success<DashboardSummary>>, ApiError> {
    let summary = state.db.reports().summary().await?;
    Ok(Json(Success::new(summary)))
}
