use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    infrastructure::{
        auth::{AuthenticatedUser, RequestOrigin},
        state::AppState,
    },
    reporting::ExportArtifact,
    services::{
        audit::AuditService,
        reports::{
            AuditExportQuery, ExportScope, FormatQuery, QuarterlyQuery, ReportService,
            TrackingQuery,
        },
    },
};

use super::{to_response, ApiError};

/// Export routes shared by the admin and auditor surfaces; `scope` decides
/// which role the service accepts.
pub fn router(scope: ExportScope) -> Router {
    Router::new()
        .route("/exports/tracking", get(tracking))
        .route("/exports/projects/:id", get(project_detail))
        .route("/exports/units", get(units))
        .route("/exports/quarterly", get(quarterly))
        .route("/exports/consolidated", get(consolidated))
        .route("/exports/statistics", get(statistics))
        .route("/exports/users", get(users))
        .route("/exports/audit-log", get(audit_log_export))
        .route("/audit-log", get(audit_log))
        .layer(Extension(scope))
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    #[serde(default)]
    limit: Option<i64>,
}

fn download(artifact: ExportArtifact) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", artifact.filename);
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, artifact.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        artifact.bytes,
    )
        .into_response()
}

async fn tracking(
    Extension(state): Extension<Arc<AppState>>,
    Extension(scope): Extension<ExportScope>,
    user: AuthenticatedUser,
    RequestOrigin(origin): RequestOrigin,
    Query(query): Query<TrackingQuery>,
) -> Result<Response, ApiError> {
    let artifact = ReportService::new(state, scope)
        .tracking(&user, query, origin)
        .await
        .map_err(to_response)?;
    Ok(download(artifact))
}

async fn project_detail(
    Extension(state): Extension<Arc<AppState>>,
    Extension(scope): Extension<ExportScope>,
    user: AuthenticatedUser,
    RequestOrigin(origin): RequestOrigin,
    Path(id): Path<Uuid>,
    Query(query): Query<FormatQuery>,
) -> Result<Response, ApiError> {
    let artifact = ReportService::new(state, scope)
        .project_detail(&user, id, query.format, origin)
        .await
        .map_err(to_response)?;
    Ok(download(artifact))
}

async fn units(
    Extension(state): Extension<Arc<AppState>>,
    Extension(scope): Extension<ExportScope>,
    user: AuthenticatedUser,
    RequestOrigin(origin): RequestOrigin,
    Query(query): Query<FormatQuery>,
) -> Result<Response, ApiError> {
    let artifact = ReportService::new(state, scope)
        .units(&user, query.format, origin)
        .await
        .map_err(to_response)?;
    Ok(download(artifact))
}

async fn quarterly(
    Extension(state): Extension<Arc<AppState>>,
    Extension(scope): Extension<ExportScope>,
    user: AuthenticatedUser,
    RequestOrigin(origin): RequestOrigin,
    Query(query): Query<QuarterlyQuery>,
) -> Result<Response, ApiError> {
    let artifact = ReportService::new(state, scope)
        .quarterly(&user, query, origin)
        .await
        .map_err(to_response)?;
    Ok(download(artifact))
}

async fn consolidated(
    Extension(state): Extension<Arc<AppState>>,
    Extension(scope): Extension<ExportScope>,
    user: AuthenticatedUser,
    RequestOrigin(origin): RequestOrigin,
    Query(query): Query<FormatQuery>,
) -> Result<Response, ApiError> {
    let artifact = ReportService::new(state, scope)
        .consolidated(&user, query.format, origin)
        .await
        .map_err(to_response)?;
    Ok(download(artifact))
}

async fn statistics(
    Extension(state): Extension<Arc<AppState>>,
    Extension(scope): Extension<ExportScope>,
    user: AuthenticatedUser,
    RequestOrigin(origin): RequestOrigin,
    Query(query): Query<FormatQuery>,
) -> Result<Response, ApiError> {
    let artifact = ReportService::new(state, scope)
        .statistics(&user, query.format, origin)
        .await
        .map_err(to_response)?;
    Ok(download(artifact))
}

async fn users(
    Extension(state): Extension<Arc<AppState>>,
    Extension(scope): Extension<ExportScope>,
    user: AuthenticatedUser,
    RequestOrigin(origin): RequestOrigin,
    Query(query): Query<FormatQuery>,
) -> Result<Response, ApiError> {
    let artifact = ReportService::new(state, scope)
        .users(&user, query.format, origin)
        .await
        .map_err(to_response)?;
    Ok(download(artifact))
}

async fn audit_log_export(
    Extension(state): Extension<Arc<AppState>>,
    Extension(scope): Extension<ExportScope>,
    user: AuthenticatedUser,
    RequestOrigin(origin): RequestOrigin,
    Query(query): Query<AuditExportQuery>,
) -> Result<Response, ApiError> {
    let artifact = ReportService::new(state, scope)
        .audit_log(&user, query, origin)
        .await
        .map_err(to_response)?;
    Ok(download(artifact))
}

async fn audit_log(
    Extension(state): Extension<Arc<AppState>>,
    Extension(scope): Extension<ExportScope>,
    user: AuthenticatedUser,
    Query(query): Query<LimitQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if scope != ExportScope::Auditor {
        return Err(to_response(crate::services::errors::ServiceError::Forbidden));
    }
    let entries = AuditService::new(state)
        .list(&user, query.limit)
        .await
        .map_err(to_response)?;
    Ok(Json(serde_json::json!({ "entries": entries })))
}
