//! Liveness and readiness handlers.

use axum::extract::{Json, State};
use serde_json::{json, Value};
use service_core::error::AppError;

use crate::AppState;

/// Health check: verifies database connectivity.
///
/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    state.db.health_check().await?;

    Ok(Json(json!({ "status": "ok" })))
}
