//! Administrative decisions on submitted projects.
//!
//! Both decisions run in one transaction together with their audit entry,
//! so a failed write leaves neither the state change nor the log behind.
//! Deciding on one project never touches the unit's other projects.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::{Postgres, Transaction};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::{
        lifecycle::{self, Transition},
        models::{AuditAction, Project, ProjectState, Role},
    },
    infrastructure::{auth::AuthenticatedUser, state::AppState},
};

use super::{
    audit::{self, AuditDraft},
    errors::ServiceError,
    snapshots::PROJECT_COLUMNS,
};

#[derive(Debug, Deserialize, Validate)]
pub struct RejectionRequest {
    #[validate(length(max = 2000, message = "reason must be at most 2000 characters"))]
    pub reason: Option<String>,
}

pub struct ApprovalService {
    pub state: Arc<AppState>,
}

impl ApprovalService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Submitted projects waiting for a decision, oldest first.
    pub async fn pending(&self, actor: &AuthenticatedUser) -> Result<Vec<Project>, ServiceError> {
        actor.ensure_role(&[Role::Admin, Role::Auditor])?;
        sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects p WHERE p.state = $1 ORDER BY p.updated_at, p.id"
        ))
        .bind(ProjectState::Submitted)
        .fetch_all(&self.state.pool)
        .await
        .map_err(|err| ServiceError::Internal(err.to_string()))
    }

    pub async fn approve(
        &self,
        actor: &AuthenticatedUser,
        project_id: Uuid,
        origin: Option<String>,
    ) -> Result<Project, ServiceError> {
        actor.ensure_role(&[Role::Admin])?;
        let mut tx = self
            .state
            .pool
            .begin()
            .await
            .map_err(|err| ServiceError::Internal(err.to_string()))?;
        let before = lock_project(&mut tx, project_id).await?;
        let next = lifecycle::next_state(before.state, Transition::Approve)?;

        let after = sqlx::query_as::<_, Project>(
            "UPDATE projects p SET state = $1, approved_by = $2, approved_at = $3,
                 rejection_reason = NULL, updated_at = $3
             WHERE p.id = $4
             RETURNING p.id, p.unit_id, p.name, p.year, p.unit_objective, p.state,
                 p.rejection_reason, p.approved_by, p.approved_at, p.is_unplanned,
                 p.created_at, p.updated_at",
        )
        .bind(next)
        .bind(actor.user_id)
        .bind(Utc::now())
        .bind(project_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| ServiceError::Internal(err.to_string()))?;

        audit::record(
            &mut tx,
            AuditDraft {
                actor_id: actor.user_id,
                action: AuditAction::Approve,
                table_name: "projects",
                record_id: Some(project_id),
                before: Some(decision_snapshot(&before)),
                after: Some(decision_snapshot(&after)),
                origin,
            },
        )
        .await?;
        tx.commit()
            .await
            .map_err(|err| ServiceError::Internal(err.to_string()))?;

        info!(project_id = %project_id, actor = %actor.user_id, "project approved");
        Ok(after)
    }

    pub async fn reject(
        &self,
        actor: &AuthenticatedUser,
        project_id: Uuid,
        payload: RejectionRequest,
        origin: Option<String>,
    ) -> Result<Project, ServiceError> {
        actor.ensure_role(&[Role::Admin])?;
        payload.validate()?;
        let reason = lifecycle::rejection_reason(payload.reason.as_deref())?;
        let mut tx = self
            .state
            .pool
            .begin()
            .await
            .map_err(|err| ServiceError::Internal(err.to_string()))?;
        let before = lock_project(&mut tx, project_id).await?;
        let next = lifecycle::next_state(before.state, Transition::Reject)?;

        let after = sqlx::query_as::<_, Project>(
            "UPDATE projects p SET state = $1, rejection_reason = $2, updated_at = $3
             WHERE p.id = $4
             RETURNING p.id, p.unit_id, p.name, p.year, p.unit_objective, p.state,
                 p.rejection_reason, p.approved_by, p.approved_at, p.is_unplanned,
                 p.created_at, p.updated_at",
        )
        .bind(next)
        .bind(&reason)
        .bind(Utc::now())
        .bind(project_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| ServiceError::Internal(err.to_string()))?;

        audit::record(
            &mut tx,
            AuditDraft {
                actor_id: actor.user_id,
                action: AuditAction::Reject,
                table_name: "projects",
                record_id: Some(project_id),
                before: Some(decision_snapshot(&before)),
                after: Some(decision_snapshot(&after)),
                origin,
            },
        )
        .await?;
        tx.commit()
            .await
            .map_err(|err| ServiceError::Internal(err.to_string()))?;

        info!(project_id = %project_id, actor = %actor.user_id, "project rejected");
        Ok(after)
    }
}

async fn lock_project(
    tx: &mut Transaction<'_, Postgres>,
    project_id: Uuid,
) -> Result<Project, ServiceError> {
    sqlx::query_as::<_, Project>(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects p WHERE p.id = $1 FOR UPDATE"
    ))
    .bind(project_id)
    .fetch_optional(tx.as_mut())
    .await
    .map_err(|err| ServiceError::Internal(err.to_string()))?
    .ok_or(ServiceError::NotFound)
}

/// Fields an auditor needs to see what a decision changed.
pub fn decision_snapshot(project: &Project) -> serde_json::Value {
    json!({
        "name": project.name,
        "unit_id": project.unit_id,
        "year": project.year,
        "state": project.state,
        "rejection_reason": project.rejection_reason,
        "approved_by": project.approved_by,
        "approved_at": project.approved_at,
    })
}
