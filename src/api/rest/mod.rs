use axum::{http::StatusCode, routing::get, Json, Router};
use tracing::error;

use crate::{
    api::rest::{
        approvals::router as approvals_router, auth::router as auth_router,
        evidence::router as evidence_router, exports::router as exports_router,
        progress::router as progress_router, projects::router as projects_router,
        wizard::router as wizard_router,
    },
    infrastructure::config::Config,
    services::{errors::ServiceError, reports::ExportScope},
};

pub mod approvals;
pub mod auth;
pub mod evidence;
pub mod exports;
pub mod health;
pub mod progress;
pub mod projects;
pub mod wizard;

pub type ApiError = (StatusCode, Json<serde_json::Value>);

pub fn router(config: &Config) -> Router {
    Router::new()
        .route("/health", get(health::healthcheck))
        .nest("/auth", auth_router())
        .merge(projects_router())
        .merge(progress_router())
        .merge(evidence_router(config.upload_body_limit()))
        .nest("/wizard", wizard_router())
        .nest("/admin/approvals", approvals_router())
        .nest("/admin", exports_router(ExportScope::Admin))
        .nest("/auditor", exports_router(ExportScope::Auditor))
}

/// JSON error body shared by every handler: the public message plus any
/// field-level details.
pub fn to_response(err: ServiceError) -> ApiError {
    if let ServiceError::Internal(detail) = &err {
        error!(error = %detail, "request failed");
    }
    (
        err.status_code(),
        Json(serde_json::json!({
            "error": err.public_message(),
            "fields": err.field_errors(),
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_list_fields() {
        let (status, Json(body)) = to_response(ServiceError::field("year", "year must be between 2000 and 2100"));
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["fields"][0]["field"], "year");
        assert_eq!(
            body["error"],
            "validation error: year: year must be between 2000 and 2100"
        );
    }

    #[test]
    fn internal_errors_hide_detail() {
        let (status, Json(body)) = to_response(ServiceError::Internal("pool timed out".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, serde_json::json!({"error": "internal error", "fields": []}));
    }
}
