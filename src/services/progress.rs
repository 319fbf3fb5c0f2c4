//! Monthly realized quantities on approved projects.
//!
//! Writes are last-write-wins: two owners saving the same month race and
//! the later save stands.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::{
        compliance::{compute_compliance, Compliance, MonthStatus},
        models::MonthlyProgress,
        policy,
    },
    infrastructure::{auth::AuthenticatedUser, state::AppState},
};

use super::{access, errors::ServiceError, projects::quantity_field};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProgressRequest {
    pub month: i16,
    pub realized_quantity: serde_json::Number,
    #[serde(default)]
    #[validate(length(max = 2000, message = "cause must be at most 2000 characters"))]
    pub non_compliance_cause: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressOutcome {
    pub progress: MonthlyProgress,
    pub compliance: Compliance,
    pub status: &'static str,
    /// Quantity realized beyond the monthly plan; non-zero marks the month
    /// as unplanned work.
    pub surplus: i64,
}

impl ProgressOutcome {
    fn new(progress: MonthlyProgress) -> Self {
        let compliance = progress.compliance();
        Self {
            status: MonthStatus::classify(compliance).label(),
            surplus: progress.surplus(),
            compliance,
            progress,
        }
    }
}

pub struct ProgressService {
    pub state: Arc<AppState>,
}

impl ProgressService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn record(
        &self,
        actor: &AuthenticatedUser,
        activity_id: Uuid,
        payload: ProgressRequest,
    ) -> Result<ProgressOutcome, ServiceError> {
        payload.validate()?;
        let month = policy::check_month(payload.month)?;
        let realized = quantity_field("realized_quantity", &payload.realized_quantity)?;
        let cause = payload
            .non_compliance_cause
            .as_deref()
            .map(str::trim)
            .filter(|cause| !cause.is_empty())
            .map(str::to_string);

        let mut tx = self
            .state
            .pool
            .begin()
            .await
            .map_err(|err| ServiceError::Internal(err.to_string()))?;
        let project = access::project_for_activity(&mut *tx, activity_id).await?;
        access::ensure_trackable(actor, &project)?;

        let planned: i64 = sqlx::query_scalar(
            "SELECT planned_quantity FROM monthly_progress
             WHERE activity_id = $1 AND month = $2 AND year = $3",
        )
        .bind(activity_id)
        .bind(month)
        .bind(project.year)
        .fetch_optional(&mut *tx)
        .await?
        .unwrap_or(0);
        let now = Utc::now();

        let progress = sqlx::query_as::<_, MonthlyProgress>(
            "INSERT INTO monthly_progress (id, activity_id, month, year, planned_quantity,
                 realized_quantity, compliance, is_unplanned, non_compliance_cause, updated_at)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
             ON CONFLICT (activity_id, month, year) DO UPDATE SET
                 realized_quantity = EXCLUDED.realized_quantity,
                 compliance = EXCLUDED.compliance,
                 is_unplanned = EXCLUDED.is_unplanned,
                 non_compliance_cause = EXCLUDED.non_compliance_cause,
                 updated_at = EXCLUDED.updated_at
             RETURNING id, activity_id, month, year, planned_quantity, realized_quantity,
                 compliance, is_unplanned, non_compliance_cause, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(activity_id)
        .bind(month)
        .bind(project.year)
        .bind(planned)
        .bind(realized)
        .bind(compute_compliance(planned, realized).value())
        .bind(realized > planned)
        .bind(cause)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE projects SET updated_at = $1 WHERE id = $2")
            .bind(now)
            .bind(project.id)
            .execute(tx.as_mut())
            .await?;
        tx.commit()
            .await
            .map_err(|err| ServiceError::Internal(err.to_string()))?;

        let outcome = ProgressOutcome::new(progress);
        info!(
            project_id = %project.id,
            activity_id = %activity_id,
            actor = %actor.user_id,
            month,
            surplus = outcome.surplus,
            "monthly progress recorded"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn progress(planned: i64, realized: i64) -> MonthlyProgress {
        MonthlyProgress {
            id: Uuid::nil(),
            activity_id: Uuid::nil(),
            month: 5,
            year: 2025,
            planned_quantity: planned,
            realized_quantity: realized,
            compliance: None,
            is_unplanned: realized > planned,
            non_compliance_cause: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn over_plan_reports_surplus() {
        let outcome = ProgressOutcome::new(progress(10, 14));
        assert_eq!(outcome.surplus, 4);
        assert_eq!(outcome.compliance, Compliance::Percent(Decimal::ONE_HUNDRED));
        assert_eq!(outcome.status, "Excellent");
    }

    #[test]
    fn unprogrammed_month_is_not_applicable() {
        let outcome = ProgressOutcome::new(progress(0, 3));
        assert_eq!(outcome.compliance, Compliance::NotApplicable);
        assert_eq!(outcome.surplus, 3);
    }

    #[test]
    fn negative_realized_is_a_validation_error() {
        let payload: ProgressRequest = serde_json::from_value(serde_json::json!({
            "month": 3,
            "realized_quantity": -1
        }))
        .unwrap();
        let err = quantity_field("realized_quantity", &payload.realized_quantity).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(err.field_errors()[0].message, "must be zero or greater");
    }
}
