//! Evidence attached to activities of approved projects.
//!
//! Size, extension and kind checks run before the storage write and the
//! database insert; a rejected upload leaves nothing behind.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    domain::{
        models::{Evidence, EvidenceKind},
        policy,
    },
    infrastructure::{auth::AuthenticatedUser, state::AppState, storage},
    validation::rules::{self, FileFacts},
};

use super::{access, errors::ServiceError};

const EVIDENCE_COLUMNS: &str =
    "id, activity_id, month, kind, description, file_key, file_name, size_bytes, url, uploaded_by, created_at";

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone)]
pub struct EvidenceUpload {
    pub kind: EvidenceKind,
    pub description: String,
    pub month: Option<i16>,
    pub url: Option<String>,
    pub file: Option<UploadedFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvidenceView {
    #[serde(flatten)]
    pub evidence: Evidence,
    /// Authenticated download route for stored files, or the link itself
    /// for URL evidence.
    pub download_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EvidenceFile {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Bytes,
}

pub struct EvidenceService {
    pub state: Arc<AppState>,
}

impl EvidenceService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn upload(
        &self,
        actor: &AuthenticatedUser,
        activity_id: Uuid,
        upload: EvidenceUpload,
    ) -> Result<EvidenceView, ServiceError> {
        let project = access::project_for_activity(&self.state.pool, activity_id).await?;
        access::ensure_trackable(actor, &project)?;
        if let Some(month) = upload.month {
            policy::check_month(month)?;
        }
        let description = upload.description.trim().to_string();
        if description.chars().count() > 2000 {
            return Err(ServiceError::field(
                "description",
                "description must be at most 2000 characters",
            ));
        }

        let facts = upload.file.as_ref().map(|file| FileFacts {
            file_name: &file.file_name,
            size_bytes: file.bytes.len() as u64,
        });
        let link = rules::check_upload(
            upload.kind,
            facts,
            upload.url.as_deref(),
            &self.state.config.evidence,
        )
        .map_err(|rejection| {
            warn!(
                activity_id = %activity_id,
                actor = %actor.user_id,
                kind = upload.kind.as_str(),
                reason = %rejection,
                "evidence upload rejected"
            );
            rejection
        })?;

        let mut stored_key = None;
        let mut file_name = None;
        let mut size_bytes = None;
        if let Some(file) = upload.file {
            let extension = rules::check_extension(&file.file_name, &self.state.config.evidence)?;
            let key = storage::evidence_key(activity_id, &extension);
            let bytes = file.bytes.len() as i64;
            self.state
                .storage
                .put(&key, file.bytes, &file.content_type)
                .await
                .map_err(|err| ServiceError::Internal(err.to_string()))?;
            stored_key = Some(key);
            file_name = Some(file.file_name);
            size_bytes = Some(bytes);
        }

        let inserted = sqlx::query_as::<_, Evidence>(&format!(
            "INSERT INTO evidence (id, activity_id, month, kind, description, file_key, file_name, size_bytes, url, uploaded_by, created_at)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
             RETURNING {EVIDENCE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(activity_id)
        .bind(upload.month)
        .bind(upload.kind)
        .bind(description)
        .bind(&stored_key)
        .bind(file_name)
        .bind(size_bytes)
        .bind(link.map(|url| url.to_string()))
        .bind(actor.user_id)
        .bind(Utc::now())
        .fetch_one(&self.state.pool)
        .await;

        let evidence = match inserted {
            Ok(evidence) => evidence,
            Err(err) => {
                if let Some(key) = &stored_key {
                    if let Err(cleanup) = self.state.storage.delete(key).await {
                        warn!(key = %key, error = %cleanup, "failed to remove orphaned evidence file");
                    }
                }
                return Err(ServiceError::Internal(err.to_string()));
            }
        };

        info!(
            project_id = %project.id,
            evidence_id = %evidence.id,
            actor = %actor.user_id,
            kind = evidence.kind.as_str(),
            bytes = evidence.size_bytes.unwrap_or(0),
            "evidence stored"
        );
        Ok(view(evidence))
    }

    pub async fn list(
        &self,
        actor: &AuthenticatedUser,
        activity_id: Uuid,
    ) -> Result<Vec<EvidenceView>, ServiceError> {
        let project = access::project_for_activity(&self.state.pool, activity_id).await?;
        access::ensure_can_view(actor, &project)?;
        let items = sqlx::query_as::<_, Evidence>(&format!(
            "SELECT {EVIDENCE_COLUMNS} FROM evidence WHERE activity_id = $1
             ORDER BY month NULLS LAST, created_at, id"
        ))
        .bind(activity_id)
        .fetch_all(&self.state.pool)
        .await?;
        Ok(items.into_iter().map(view).collect())
    }

    /// Removes the row, then the stored object.
    pub async fn delete(
        &self,
        actor: &AuthenticatedUser,
        evidence_id: Uuid,
    ) -> Result<(), ServiceError> {
        let evidence = sqlx::query_as::<_, Evidence>(&format!(
            "SELECT {EVIDENCE_COLUMNS} FROM evidence WHERE id = $1"
        ))
        .bind(evidence_id)
        .fetch_optional(&self.state.pool)
        .await?
        .ok_or(ServiceError::NotFound)?;
        let project = access::project_for_activity(&self.state.pool, evidence.activity_id).await?;
        access::ensure_owner(actor, &project)?;

        sqlx::query("DELETE FROM evidence WHERE id = $1")
            .bind(evidence_id)
            .execute(&self.state.pool)
            .await?;
        if let Some(key) = &evidence.file_key {
            self.state
                .storage
                .delete(key)
                .await
                .map_err(|err| ServiceError::Internal(err.to_string()))?;
        }
        info!(evidence_id = %evidence_id, actor = %actor.user_id, "evidence deleted");
        Ok(())
    }

    /// Stored file of one evidence item, for anyone allowed to see the
    /// project it belongs to.
    pub async fn download(
        &self,
        actor: &AuthenticatedUser,
        evidence_id: Uuid,
    ) -> Result<EvidenceFile, ServiceError> {
        let evidence = sqlx::query_as::<_, Evidence>(&format!(
            "SELECT {EVIDENCE_COLUMNS} FROM evidence WHERE id = $1"
        ))
        .bind(evidence_id)
        .fetch_optional(&self.state.pool)
        .await?
        .ok_or(ServiceError::NotFound)?;
        let project = access::project_for_activity(&self.state.pool, evidence.activity_id).await?;
        access::ensure_can_view(actor, &project)?;

        let key = evidence.file_key.as_deref().ok_or(ServiceError::NotFound)?;
        let bytes = self
            .state
            .storage
            .get(key)
            .await
            .map_err(|err| ServiceError::Internal(err.to_string()))?
            .ok_or_else(|| {
                warn!(evidence_id = %evidence_id, key = %key, "stored evidence file is missing");
                ServiceError::NotFound
            })?;
        let file_name = evidence.file_name.clone().unwrap_or_else(|| key.to_string());
        Ok(EvidenceFile {
            content_type: rules::media_type(&file_name),
            file_name,
            bytes,
        })
    }

}

fn view(evidence: Evidence) -> EvidenceView {
    let download_url = match &evidence.file_key {
        Some(_) => Some(download_path(evidence.id)),
        None => evidence.url.clone(),
    };
    EvidenceView {
        evidence,
        download_url,
    }
}

pub fn download_path(evidence_id: Uuid) -> String {
    format!("/api/evidence/{evidence_id}/file")
}
