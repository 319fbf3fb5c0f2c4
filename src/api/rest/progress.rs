use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    routing::post,
    Json, Router,
};
use uuid::Uuid;

use crate::{
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::progress::{ProgressRequest, ProgressService},
};

use super::{to_response, ApiError};

pub fn router() -> Router {
    Router::new().route("/activities/:id/progress", post(record_progress))
}

async fn record_progress(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProgressRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let outcome = ProgressService::new(state)
        .record(&user, id, payload)
        .await
        .map_err(to_response)?;
    Ok(Json(serde_json::json!({ "progress": outcome })))
}
