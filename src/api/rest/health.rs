use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, Json};
use serde_json::{json, Value};
use tracing::warn;

use crate::infrastructure::state::AppState;

/// Reports database reachability; no authentication required.
pub async fn healthcheck(Extension(state): Extension<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let uptime = state.uptime_seconds();
    match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({"status": "ok", "uptime_seconds": uptime})),
        ),
        Err(err) => {
            warn!(error = %err, "database unreachable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "database": "unreachable",
                    "uptime_seconds": uptime,
                })),
            )
        }
    }
}
