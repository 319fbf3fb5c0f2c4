//! Append-only audit trail for approvals, rejections and exports.

use std::sync::Arc;

use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    domain::models::{AuditAction, AuditRecord, Role},
    infrastructure::{auth::AuthenticatedUser, state::AppState},
};

use super::errors::ServiceError;

pub const DEFAULT_AUDIT_LIMIT: i64 = 100;
pub const MAX_AUDIT_LIMIT: i64 = 1000;

/// One entry to append; written inside the caller's transaction so it
/// lands only when the change it describes commits.
#[derive(Debug, Clone)]
pub struct AuditDraft {
    pub actor_id: Uuid,
    pub action: AuditAction,
    pub table_name: &'static str,
    pub record_id: Option<Uuid>,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub origin: Option<String>,
}

pub async fn record(conn: &mut PgConnection, draft: AuditDraft) -> Result<Uuid, ServiceError> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO audit_log (id, actor_id, action, table_name, record_id, before_state, after_state, origin_address)
         VALUES ($1,$2,$3,$4,$5,$6,$7,$8)",
    )
    .bind(id)
    .bind(draft.actor_id)
    .bind(draft.action.as_str())
    .bind(draft.table_name)
    .bind(draft.record_id)
    .bind(draft.before)
    .bind(draft.after)
    .bind(draft.origin)
    .execute(conn)
    .await
    .map_err(|err| ServiceError::Internal(err.to_string()))?;
    Ok(id)
}

pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit
        .unwrap_or(DEFAULT_AUDIT_LIMIT)
        .clamp(1, MAX_AUDIT_LIMIT)
}

pub struct AuditService {
    pub state: Arc<AppState>,
}

impl AuditService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Most recent entries first. Auditors only.
    pub async fn list(
        &self,
        actor: &AuthenticatedUser,
        limit: Option<i64>,
    ) -> Result<Vec<AuditRecord>, ServiceError> {
        actor.ensure_role(&[Role::Auditor])?;
        recent(&self.state.pool, limit).await
    }
}

/// Newest entries first with the actor's email. Callers check the role.
pub async fn recent(pool: &PgPool, limit: Option<i64>) -> Result<Vec<AuditRecord>, ServiceError> {
    sqlx::query_as::<_, AuditRecord>(
        "SELECT a.id, a.actor_id, a.action, a.table_name, a.record_id, a.before_state,
                a.after_state, a.origin_address, a.recorded_at, u.email AS actor_email
         FROM audit_log a
         LEFT JOIN users u ON u.id = a.actor_id
         ORDER BY a.recorded_at DESC, a.id
         LIMIT $1",
    )
    .bind(clamp_limit(limit))
    .fetch_all(pool)
    .await
    .map_err(|err| ServiceError::Internal(err.to_string()))
}
