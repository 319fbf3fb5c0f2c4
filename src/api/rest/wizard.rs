use std::sync::Arc;

use axum::{extract::Extension, routing::get, Json, Router};

use crate::{
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::wizard::{WizardCommand, WizardService},
};

use super::{to_response, ApiError};

pub fn router() -> Router {
    Router::new().route("/", get(current).post(apply))
}

async fn current(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let view = WizardService::new(state)
        .current(&user)
        .await
        .map_err(to_response)?;
    Ok(Json(serde_json::json!({ "wizard": view })))
}

async fn apply(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(command): Json<WizardCommand>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let view = WizardService::new(state)
        .apply(&user, command)
        .await
        .map_err(to_response)?;
    Ok(Json(serde_json::json!({ "wizard": view })))
}
