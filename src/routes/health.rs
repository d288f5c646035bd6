use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde_json::json;

use crate::routes::{ErrorResponse, error_response};
use crate::server::AppState;

/// Liveness probe.
///
/// # Route
/// - **Method**: GET
/// - **Path**: `/ping`
/// - **Response**: `{"status":"pong"}`
pub async fn ping() -> Json<serde_json::Value> {
    Json(json!({ "status": "pong" }))
}

/// Readiness probe: checks the database and reports pool statistics.
pub async fn health(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ErrorResponse>)> {
    state.db.health_check().await.map_err(|e| {
        tracing::error!("Health check failed: {e}");
        error_response(StatusCode::SERVICE_UNAVAILABLE, format!("database unavailable: {e}"))
    })?;

    let stats = state.db.stats();
    Ok(Json(json!({
        "status": "ok",
        "database": {
            "pool_size": stats.size,
            "idle": stats.idle,
        },
    })))
}
