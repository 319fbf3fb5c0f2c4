use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    services::projects::{
        ActivityRequest, CreateProjectRequest, GoalRequest, ProgrammingRequest, ProjectService,
        UpdateProjectRequest,
    },
};

use super::{to_response, ApiError};

pub fn router() -> Router {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/reference/units", get(list_units))
        .route("/reference/objectives", get(list_objectives))
        .route("/projects", post(create_project))
        .route(
            "/projects/:id",
            get(get_project).put(update_project).delete(delete_draft),
        )
        .route("/projects/:id/goals", post(add_goal))
        .route("/projects/:id/submit", post(submit))
        .route("/projects/:id/progress", get(progress_summary))
        .route("/goals/:id", axum::routing::delete(delete_goal))
        .route("/goals/:id/activities", post(add_activity))
        .route("/activities/:id", put(update_activity).delete(delete_activity))
        .route("/activities/:id/programming", put(save_programming))
}

async fn dashboard(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let dashboard = ProjectService::new(state)
        .dashboard(&user)
        .await
        .map_err(to_response)?;
    Ok(Json(json!({ "dashboard": dashboard })))
}

async fn list_units(
    Extension(state): Extension<Arc<AppState>>,
    _user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let units = ProjectService::new(state)
        .list_units()
        .await
        .map_err(to_response)?;
    Ok(Json(json!({ "units": units })))
}

async fn list_objectives(
    Extension(state): Extension<Arc<AppState>>,
    _user: AuthenticatedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let objectives = ProjectService::new(state)
        .list_objectives()
        .await
        .map_err(to_response)?;
    Ok(Json(json!({ "objectives": objectives })))
}

async fn create_project(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let project = ProjectService::new(state)
        .create_project(&user, payload)
        .await
        .map_err(to_response)?;
    Ok((StatusCode::CREATED, Json(json!({ "project": project }))))
}

async fn get_project(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let snapshot = ProjectService::new(state)
        .get_project(&user, id)
        .await
        .map_err(to_response)?;
    Ok(Json(json!({ "project": snapshot })))
}

async fn update_project(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProjectRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let project = ProjectService::new(state)
        .update_project(&user, id, payload)
        .await
        .map_err(to_response)?;
    Ok(Json(json!({ "project": project })))
}

async fn delete_draft(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    ProjectService::new(state)
        .delete_draft(&user, id)
        .await
        .map_err(to_response)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_goal(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<GoalRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let goal = ProjectService::new(state)
        .add_goal(&user, id, payload)
        .await
        .map_err(to_response)?;
    Ok((StatusCode::CREATED, Json(json!({ "goal": goal }))))
}

async fn delete_goal(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    ProjectService::new(state)
        .delete_goal(&user, id)
        .await
        .map_err(to_response)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_activity(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ActivityRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let activity = ProjectService::new(state)
        .add_activity(&user, id, payload)
        .await
        .map_err(to_response)?;
    Ok((StatusCode::CREATED, Json(json!({ "activity": activity }))))
}

async fn update_activity(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ActivityRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let activity = ProjectService::new(state)
        .update_activity(&user, id, payload)
        .await
        .map_err(to_response)?;
    Ok(Json(json!({ "activity": activity })))
}

async fn delete_activity(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    ProjectService::new(state)
        .delete_activity(&user, id)
        .await
        .map_err(to_response)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn save_programming(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProgrammingRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let monthly_plan = ProjectService::new(state)
        .save_programming(&user, id, payload)
        .await
        .map_err(to_response)?;
    Ok(Json(json!({ "activity_id": id, "monthly_plan": monthly_plan })))
}

async fn submit(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let project = ProjectService::new(state)
        .submit(&user, id)
        .await
        .map_err(to_response)?;
    Ok(Json(json!({ "project": project })))
}

async fn progress_summary(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let totals = ProjectService::new(state)
        .progress_summary(&user, id)
        .await
        .map_err(to_response)?;
    Ok(Json(json!({ "project_id": id, "totals": totals })))
}
