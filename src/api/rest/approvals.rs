use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::{
    infrastructure::{
        auth::{AuthenticatedUser, RequestOrigin},
        state::AppState,
    },
    services::approvals::{ApprovalService, RejectionRequest},
};

use super::{to_response, ApiError};

pub fn router() -> Router {
    Router::new()
        .route("/", get(pending))
        .route("/:id/approve", post(approve))
        .route("/:id/reject", post(reject))
}

async fn pending(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let projects = ApprovalService::new(state)
        .pending(&user)
        .await
        .map_err(to_response)?;
    Ok(Json(serde_json::json!({ "projects": projects })))
}

async fn approve(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    RequestOrigin(origin): RequestOrigin,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let project = ApprovalService::new(state)
        .approve(&user, id, origin)
        .await
        .map_err(to_response)?;
    Ok(Json(serde_json::json!({ "project": project })))
}

async fn reject(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    RequestOrigin(origin): RequestOrigin,
    Path(id): Path<Uuid>,
    Json(payload): Json<RejectionRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let project = ApprovalService::new(state)
        .reject(&user, id, payload, origin)
        .await
        .map_err(to_response)?;
    Ok(Json(serde_json::json!({ "project": project })))
}
