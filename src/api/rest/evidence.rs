use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Extension, Multipart, Path},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use bytes::BytesMut;
use uuid::Uuid;

use crate::{
    domain::models::EvidenceKind,
    infrastructure::{auth::AuthenticatedUser, config::EvidenceRules, state::AppState},
    services::{
        errors::ServiceError,
        evidence::{EvidenceService, EvidenceUpload, UploadedFile},
    },
    reporting::filename_component,
    validation::rules,
};

use super::{to_response, ApiError};

pub fn router(body_limit: usize) -> Router {
    Router::new()
        .route(
            "/activities/:id/evidence",
            get(list_evidence)
                .post(upload_evidence)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/evidence/:id", delete(delete_evidence))
        .route("/evidence/:id/file", get(download_evidence))
}

async fn upload_evidence(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let upload = read_upload(multipart, &state.config.evidence).await?;
    let view = EvidenceService::new(state)
        .upload(&user, id, upload)
        .await
        .map_err(to_response)?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "evidence": view }))))
}

async fn list_evidence(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let evidence = EvidenceService::new(state)
        .list(&user, id)
        .await
        .map_err(to_response)?;
    Ok(Json(serde_json::json!({ "evidence": evidence })))
}

async fn delete_evidence(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    EvidenceService::new(state)
        .delete(&user, id)
        .await
        .map_err(to_response)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn download_evidence(
    Extension(state): Extension<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let file = EvidenceService::new(state)
        .download(&user, id)
        .await
        .map_err(to_response)?;
    let disposition = format!("inline; filename=\"{}\"", filename_component(&file.file_name));
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.bytes,
    )
        .into_response())
}

/// Collects the form fields. The file part is read chunk by chunk and
/// abandoned as soon as it crosses the size limit.
async fn read_upload(
    mut multipart: Multipart,
    limits: &EvidenceRules,
) -> Result<EvidenceUpload, ApiError> {
    let mut kind = None;
    let mut description = String::new();
    let mut month = None;
    let mut url = None;
    let mut file = None;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let mut buffer = BytesMut::new();
                while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                    rules::check_size((buffer.len() + chunk.len()) as u64, limits)
                        .map_err(|rejection| to_response(rejection.into()))?;
                    buffer.extend_from_slice(&chunk);
                }
                file = Some(UploadedFile {
                    file_name,
                    content_type,
                    bytes: buffer.freeze(),
                });
            }
            "kind" => {
                let text = field.text().await.map_err(multipart_error)?;
                let parsed = text
                    .parse::<EvidenceKind>()
                    .map_err(|err| to_response(ServiceError::field("kind", err.to_string())))?;
                kind = Some(parsed);
            }
            "description" => description = field.text().await.map_err(multipart_error)?,
            "month" => {
                let text = field.text().await.map_err(multipart_error)?;
                let parsed = text.trim().parse::<i16>().map_err(|_| {
                    to_response(ServiceError::field("month", "month must be between 1 and 12"))
                })?;
                month = Some(parsed);
            }
            "url" => {
                let text = field.text().await.map_err(multipart_error)?;
                url = Some(text).filter(|value| !value.trim().is_empty());
            }
            _ => {}
        }
    }

    let kind =
        kind.ok_or_else(|| to_response(ServiceError::field("kind", "evidence kind is required")))?;
    Ok(EvidenceUpload {
        kind,
        description,
        month,
        url,
        file,
    })
}

fn multipart_error(err: MultipartError) -> ApiError {
    (
        err.status(),
        Json(serde_json::json!({ "error": err.body_text(), "fields": [] })),
    )
}
