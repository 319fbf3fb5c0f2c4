//! Project, goal and activity maintenance for the owning unit, plus the
//! dashboards every role lands on.
//!
//! Structural edits are only accepted while a project is Draft or Rejected;
//! editing a Rejected project reopens it as Draft under the same id.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use sqlx::{PgConnection, Row};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::{
        compliance::{compute_compliance, ProgressTotals, MONTHS},
        lifecycle::{self, Transition},
        models::{Activity, Goal, Project, ProjectState, Role, StrategicObjective, Unit},
        policy::{self, ActivityDraft, FieldError, QuantityViolation},
    },
    infrastructure::{auth::AuthenticatedUser, state::AppState},
    reporting::snapshot::ProjectSnapshot,
};

use super::{
    access,
    errors::ServiceError,
    snapshots::{self, ProjectFilter, PROJECT_COLUMNS},
};

#[serde_as]
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[serde(default)]
    #[validate(length(max = 255, message = "name must be at most 255 characters"))]
    pub name: Option<String>,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub year: i32,
    #[serde(default)]
    #[validate(length(max = 4000, message = "unit objective must be at most 4000 characters"))]
    pub unit_objective: Option<String>,
    #[serde(default)]
    pub is_unplanned: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateProjectRequest {
    #[validate(length(max = 255, message = "name must be at most 255 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 4000, message = "unit objective must be at most 4000 characters"))]
    pub unit_objective: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GoalRequest {
    #[validate(length(min = 1, max = 2000, message = "goal description must be 1-2000 characters"))]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ActivityRequest {
    #[validate(length(max = 2000, message = "description must be at most 2000 characters"))]
    pub description: String,
    pub unit_of_measure: Option<String>,
    #[serde(default)]
    #[validate(length(max = 100, message = "custom unit of measure must be at most 100 characters"))]
    pub custom_unit_of_measure: Option<String>,
    #[serde(default)]
    pub planned_quantity: Option<serde_json::Number>,
    #[serde(default = "default_quantifiable")]
    pub is_quantifiable: bool,
    #[serde(default)]
    pub verification_method: String,
    #[serde(default)]
    pub resource_description: String,
    #[serde(default)]
    pub resource_amount: Decimal,
}

fn default_quantifiable() -> bool {
    true
}

/// Twelve monthly targets, January first. Raw numbers so overflowing or
/// fractional input gets a field message instead of a parse failure.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgrammingRequest {
    pub monthly_plan: Vec<serde_json::Number>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectOverview {
    pub project: Project,
    pub goal_count: usize,
    pub activity_count: usize,
    pub progress: ProgressTotals,
}

impl From<&ProjectSnapshot> for ProjectOverview {
    fn from(snapshot: &ProjectSnapshot) -> Self {
        Self {
            project: snapshot.project.clone(),
            goal_count: snapshot.goal_count(),
            activity_count: snapshot.activity_count(),
            progress: snapshot.totals(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StateCount {
    pub state: ProjectState,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum Dashboard {
    Unit {
        unit_id: Uuid,
        projects: Vec<ProjectOverview>,
    },
    Oversight {
        counts: Vec<StateCount>,
        pending: Vec<Project>,
    },
}

/// Maps a raw JSON quantity onto `field`: negatives and fractions are
/// validation errors, anything past the ceiling is an out-of-range error.
pub fn quantity_field(field: &str, raw: &serde_json::Number) -> Result<i64, ServiceError> {
    policy::parse_quantity(raw).map_err(|violation| match violation {
        QuantityViolation::TooLarge => ServiceError::OutOfRange {
            field: field.to_string(),
            message: violation.message(),
        },
        other => ServiceError::field(field, other.message()),
    })
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub struct ProjectService {
    pub state: Arc<AppState>,
}

impl ProjectService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn create_project(
        &self,
        actor: &AuthenticatedUser,
        payload: CreateProjectRequest,
    ) -> Result<Project, ServiceError> {
        let unit_id = actor.owned_unit()?;
        payload.validate()?;
        let year = policy::check_year(payload.year)?;
        let mut tx = self
            .state
            .pool
            .begin()
            .await
            .map_err(|err| ServiceError::Internal(err.to_string()))?;

        if payload.is_unplanned {
            let existing: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM projects WHERE unit_id = $1 AND year = $2 AND is_unplanned",
            )
            .bind(unit_id)
            .bind(year)
            .fetch_one(&mut *tx)
            .await?;
            if existing > 0 {
                return Err(ServiceError::Conflict(format!(
                    "the unit already has an unplanned activities project for {year}"
                )));
            }
        }

        let name = match trimmed(payload.name.as_deref()) {
            Some(name) => name,
            None => {
                let count: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM projects WHERE unit_id = $1 AND year = $2",
                )
                .bind(unit_id)
                .bind(year)
                .fetch_one(&mut *tx)
                .await?;
                policy::default_project_name(year, count)
            }
        };
        let now = Utc::now();
        let project = sqlx::query_as::<_, Project>(
            "INSERT INTO projects (id, unit_id, name, year, unit_objective, state, is_unplanned, created_at, updated_at)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$8)
             RETURNING id, unit_id, name, year, unit_objective, state, rejection_reason,
                 approved_by, approved_at, is_unplanned, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(unit_id)
        .bind(&name)
        .bind(year)
        .bind(trimmed(payload.unit_objective.as_deref()).unwrap_or_default())
        .bind(ProjectState::Draft)
        .bind(payload.is_unplanned)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit()
            .await
            .map_err(|err| ServiceError::Internal(err.to_string()))?;

        info!(project_id = %project.id, actor = %actor.user_id, year, "project created");
        Ok(project)
    }

    pub async fn update_project(
        &self,
        actor: &AuthenticatedUser,
        project_id: Uuid,
        payload: UpdateProjectRequest,
    ) -> Result<Project, ServiceError> {
        payload.validate()?;
        let mut tx = self
            .state
            .pool
            .begin()
            .await
            .map_err(|err| ServiceError::Internal(err.to_string()))?;
        let project = access::project_by_id(&mut *tx, project_id).await?;
        access::ensure_editable(actor, &project)?;
        let state = lifecycle::state_after_edit(project.state)?;
        let name = trimmed(payload.name.as_deref()).unwrap_or(project.name);
        let objective = match payload.unit_objective.as_deref() {
            Some(objective) => objective.trim().to_string(),
            None => project.unit_objective,
        };

        let updated = sqlx::query_as::<_, Project>(
            "UPDATE projects SET name = $1, unit_objective = $2, state = $3, updated_at = $4
             WHERE id = $5
             RETURNING id, unit_id, name, year, unit_objective, state, rejection_reason,
                 approved_by, approved_at, is_unplanned, created_at, updated_at",
        )
        .bind(name)
        .bind(objective)
        .bind(state)
        .bind(Utc::now())
        .bind(project_id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit()
            .await
            .map_err(|err| ServiceError::Internal(err.to_string()))?;
        Ok(updated)
    }

    pub async fn add_goal(
        &self,
        actor: &AuthenticatedUser,
        project_id: Uuid,
        payload: GoalRequest,
    ) -> Result<Goal, ServiceError> {
        payload.validate()?;
        let description = payload.description.trim();
        if description.is_empty() {
            return Err(ServiceError::field("description", "goal description is required"));
        }
        let mut tx = self
            .state
            .pool
            .begin()
            .await
            .map_err(|err| ServiceError::Internal(err.to_string()))?;
        let project = access::project_by_id(&mut *tx, project_id).await?;
        access::ensure_editable(actor, &project)?;
        reopen_after_edit(&mut tx, &project).await?;

        let goal = sqlx::query_as::<_, Goal>(
            "INSERT INTO goals (id, project_id, description, created_at) VALUES ($1,$2,$3,$4)
             RETURNING id, project_id, description, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(project_id)
        .bind(description)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;
        tx.commit()
            .await
            .map_err(|err| ServiceError::Internal(err.to_string()))?;
        Ok(goal)
    }

    /// Removes a goal with its activities and their monthly rows.
    pub async fn delete_goal(
        &self,
        actor: &AuthenticatedUser,
        goal_id: Uuid,
    ) -> Result<(), ServiceError> {
        let mut tx = self
            .state
            .pool
            .begin()
            .await
            .map_err(|err| ServiceError::Internal(err.to_string()))?;
        let project = access::project_for_goal(&mut *tx, goal_id).await?;
        access::ensure_editable(actor, &project)?;
        reopen_after_edit(&mut tx, &project).await?;
        sqlx::query("DELETE FROM goals WHERE id = $1")
            .bind(goal_id)
            .execute(tx.as_mut())
            .await?;
        tx.commit()
            .await
            .map_err(|err| ServiceError::Internal(err.to_string()))?;
        Ok(())
    }

    /// Creates the activity together with its twelve zeroed monthly rows.
    pub async fn add_activity(
        &self,
        actor: &AuthenticatedUser,
        goal_id: Uuid,
        payload: ActivityRequest,
    ) -> Result<Activity, ServiceError> {
        let fields = ActivityFields::from_request(&payload)?;
        let mut tx = self
            .state
            .pool
            .begin()
            .await
            .map_err(|err| ServiceError::Internal(err.to_string()))?;
        let project = access::project_for_goal(&mut *tx, goal_id).await?;
        access::ensure_editable(actor, &project)?;
        reopen_after_edit(&mut tx, &project).await?;

        let now = Utc::now();
        let activity = sqlx::query_as::<_, Activity>(
            "INSERT INTO activities (id, goal_id, description, unit_of_measure, planned_quantity,
                 is_quantifiable, verification_method, resource_description, resource_amount, created_at)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
             RETURNING id, goal_id, description, unit_of_measure, planned_quantity, is_quantifiable,
                 verification_method, resource_description, resource_amount, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(goal_id)
        .bind(&fields.description)
        .bind(&fields.unit_of_measure)
        .bind(fields.planned_quantity)
        .bind(fields.is_quantifiable)
        .bind(&fields.verification_method)
        .bind(&fields.resource_description)
        .bind(fields.resource_amount)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        for month in 1..=MONTHS as i16 {
            sqlx::query(
                "INSERT INTO monthly_progress (id, activity_id, month, year, updated_at)
                 VALUES ($1,$2,$3,$4,$5)",
            )
            .bind(Uuid::new_v4())
            .bind(activity.id)
            .bind(month)
            .bind(project.year)
            .bind(now)
            .execute(tx.as_mut())
            .await?;
        }
        tx.commit()
            .await
            .map_err(|err| ServiceError::Internal(err.to_string()))?;
        Ok(activity)
    }

    /// Replaces the activity's fields. Lowering the total below what is
    /// already programmed is refused; switching to non-quantifiable clears
    /// the monthly plan.
    pub async fn update_activity(
        &self,
        actor: &AuthenticatedUser,
        activity_id: Uuid,
        payload: ActivityRequest,
    ) -> Result<Activity, ServiceError> {
        let fields = ActivityFields::from_request(&payload)?;
        let mut tx = self
            .state
            .pool
            .begin()
            .await
            .map_err(|err| ServiceError::Internal(err.to_string()))?;
        let project = access::project_for_activity(&mut *tx, activity_id).await?;
        access::ensure_editable(actor, &project)?;

        let programmed: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(planned_quantity), 0)::BIGINT FROM monthly_progress WHERE activity_id = $1",
        )
        .bind(activity_id)
        .fetch_one(&mut *tx)
        .await?;
        if fields.is_quantifiable && programmed > fields.planned_quantity {
            return Err(ServiceError::field(
                "planned_quantity",
                format!(
                    "monthly programming already adds up to {programmed}, above the new total of {}",
                    fields.planned_quantity
                ),
            ));
        }
        if !fields.is_quantifiable {
            sqlx::query(
                "UPDATE monthly_progress SET planned_quantity = 0, compliance = NULL, is_unplanned = realized_quantity > 0, updated_at = $1
                 WHERE activity_id = $2",
            )
            .bind(Utc::now())
            .bind(activity_id)
            .execute(tx.as_mut())
            .await?;
        }
        reopen_after_edit(&mut tx, &project).await?;

        let activity = sqlx::query_as::<_, Activity>(
            "UPDATE activities SET description = $1, unit_of_measure = $2, planned_quantity = $3,
                 is_quantifiable = $4, verification_method = $5, resource_description = $6,
                 resource_amount = $7
             WHERE id = $8
             RETURNING id, goal_id, description, unit_of_measure, planned_quantity, is_quantifiable,
                 verification_method, resource_description, resource_amount, created_at",
        )
        .bind(&fields.description)
        .bind(&fields.unit_of_measure)
        .bind(fields.planned_quantity)
        .bind(fields.is_quantifiable)
        .bind(&fields.verification_method)
        .bind(&fields.resource_description)
        .bind(fields.resource_amount)
        .bind(activity_id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit()
            .await
            .map_err(|err| ServiceError::Internal(err.to_string()))?;
        Ok(activity)
    }

    pub async fn delete_activity(
        &self,
        actor: &AuthenticatedUser,
        activity_id: Uuid,
    ) -> Result<(), ServiceError> {
        let mut tx = self
            .state
            .pool
            .begin()
            .await
            .map_err(|err| ServiceError::Internal(err.to_string()))?;
        let project = access::project_for_activity(&mut *tx, activity_id).await?;
        access::ensure_editable(actor, &project)?;
        reopen_after_edit(&mut tx, &project).await?;
        sqlx::query("DELETE FROM activities WHERE id = $1")
            .bind(activity_id)
            .execute(tx.as_mut())
            .await?;
        tx.commit()
            .await
            .map_err(|err| ServiceError::Internal(err.to_string()))?;
        Ok(())
    }

    /// Stores all twelve monthly targets or none of them.
    pub async fn save_programming(
        &self,
        actor: &AuthenticatedUser,
        activity_id: Uuid,
        payload: ProgrammingRequest,
    ) -> Result<Vec<i64>, ServiceError> {
        let monthly = parse_monthly_plan(&payload.monthly_plan)?;
        let mut tx = self
            .state
            .pool
            .begin()
            .await
            .map_err(|err| ServiceError::Internal(err.to_string()))?;
        let project = access::project_for_activity(&mut *tx, activity_id).await?;
        access::ensure_editable(actor, &project)?;
        let activity = access::activity_by_id(&mut *tx, activity_id).await?;
        policy::evaluate_programming(activity.planned_quantity, activity.is_quantifiable, &monthly)
            .into_result()?;
        reopen_after_edit(&mut tx, &project).await?;

        let now = Utc::now();
        for (idx, planned) in monthly.iter().enumerate() {
            let month = idx as i16 + 1;
            let realized: i64 = sqlx::query_scalar(
                "SELECT realized_quantity FROM monthly_progress
                 WHERE activity_id = $1 AND month = $2 AND year = $3",
            )
            .bind(activity_id)
            .bind(month)
            .bind(project.year)
            .fetch_optional(&mut *tx)
            .await?
            .unwrap_or(0);
            sqlx::query(
                "INSERT INTO monthly_progress (id, activity_id, month, year, planned_quantity,
                     realized_quantity, compliance, is_unplanned, updated_at)
                 VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
                 ON CONFLICT (activity_id, month, year) DO UPDATE SET
                     planned_quantity = EXCLUDED.planned_quantity,
                     compliance = EXCLUDED.compliance,
                     is_unplanned = EXCLUDED.is_unplanned,
                     updated_at = EXCLUDED.updated_at",
            )
            .bind(Uuid::new_v4())
            .bind(activity_id)
            .bind(month)
            .bind(project.year)
            .bind(*planned)
            .bind(realized)
            .bind(compute_compliance(*planned, realized).value())
            .bind(realized > *planned)
            .bind(now)
            .execute(tx.as_mut())
            .await?;
        }
        tx.commit()
            .await
            .map_err(|err| ServiceError::Internal(err.to_string()))?;
        Ok(monthly)
    }

    pub async fn submit(
        &self,
        actor: &AuthenticatedUser,
        project_id: Uuid,
    ) -> Result<Project, ServiceError> {
        let mut tx = self
            .state
            .pool
            .begin()
            .await
            .map_err(|err| ServiceError::Internal(err.to_string()))?;
        let project = access::project_by_id(&mut *tx, project_id).await?;
        access::ensure_owner(actor, &project)?;
        let goal_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM goals WHERE project_id = $1")
            .bind(project_id)
            .fetch_one(&mut *tx)
            .await?;
        lifecycle::can_submit(project.state, goal_count)?;
        let next = lifecycle::next_state(project.state, Transition::Submit)?;

        let submitted = sqlx::query_as::<_, Project>(
            "UPDATE projects SET state = $1, updated_at = $2 WHERE id = $3
             RETURNING id, unit_id, name, year, unit_objective, state, rejection_reason,
                 approved_by, approved_at, is_unplanned, created_at, updated_at",
        )
        .bind(next)
        .bind(Utc::now())
        .bind(project_id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit()
            .await
            .map_err(|err| ServiceError::Internal(err.to_string()))?;

        info!(project_id = %project_id, actor = %actor.user_id, "project submitted");
        Ok(submitted)
    }

    /// Deletes a project that never got past Draft.
    pub async fn delete_draft(
        &self,
        actor: &AuthenticatedUser,
        project_id: Uuid,
    ) -> Result<(), ServiceError> {
        let project = access::project_by_id(&self.state.pool, project_id).await?;
        access::ensure_owner(actor, &project)?;
        if project.state != ProjectState::Draft {
            return Err(ServiceError::Conflict(
                "only draft projects can be deleted".into(),
            ));
        }
        sqlx::query("DELETE FROM projects WHERE id = $1 AND state = $2")
            .bind(project_id)
            .bind(ProjectState::Draft)
            .execute(&self.state.pool)
            .await?;
        info!(project_id = %project_id, actor = %actor.user_id, "draft project deleted");
        Ok(())
    }

    pub async fn get_project(
        &self,
        actor: &AuthenticatedUser,
        project_id: Uuid,
    ) -> Result<ProjectSnapshot, ServiceError> {
        let snapshot = snapshots::load_snapshot(&self.state.pool, project_id).await?;
        access::ensure_can_view(actor, &snapshot.project)?;
        Ok(snapshot)
    }

    /// Progress totals for one project.
    pub async fn progress_summary(
        &self,
        actor: &AuthenticatedUser,
        project_id: Uuid,
    ) -> Result<ProgressTotals, ServiceError> {
        Ok(self.get_project(actor, project_id).await?.totals())
    }

    pub async fn dashboard(&self, actor: &AuthenticatedUser) -> Result<Dashboard, ServiceError> {
        match actor.role {
            Role::Unit => {
                let unit_id = actor.owned_unit()?;
                let filter = ProjectFilter {
                    unit_id: Some(unit_id),
                    ..ProjectFilter::default()
                };
                let projects = snapshots::load_snapshots(&self.state.pool, &filter)
                    .await?
                    .iter()
                    .map(ProjectOverview::from)
                    .collect();
                Ok(Dashboard::Unit { unit_id, projects })
            }
            Role::Admin | Role::Auditor => {
                let rows = sqlx::query("SELECT state, COUNT(*) AS total FROM projects GROUP BY state")
                    .fetch_all(&self.state.pool)
                    .await?;
                let mut counts: Vec<StateCount> = ProjectState::ALL
                    .iter()
                    .map(|state| StateCount {
                        state: *state,
                        count: 0,
                    })
                    .collect();
                for row in rows {
                    let state: ProjectState = row.try_get("state")?;
                    let total: i64 = row.try_get("total")?;
                    if let Some(entry) = counts.iter_mut().find(|entry| entry.state == state) {
                        entry.count = total;
                    }
                }
                let pending = sqlx::query_as::<_, Project>(&format!(
                    "SELECT {PROJECT_COLUMNS} FROM projects p WHERE p.state = $1 ORDER BY p.updated_at, p.id"
                ))
                .bind(ProjectState::Submitted)
                .fetch_all(&self.state.pool)
                .await?;
                Ok(Dashboard::Oversight { counts, pending })
            }
        }
    }

    pub async fn list_units(&self) -> Result<Vec<Unit>, ServiceError> {
        Ok(sqlx::query_as::<_, Unit>(
            "SELECT id, name, active, created_at FROM units WHERE active ORDER BY name",
        )
        .fetch_all(&self.state.pool)
        .await?)
    }

    pub async fn list_objectives(&self) -> Result<Vec<StrategicObjective>, ServiceError> {
        Ok(sqlx::query_as::<_, StrategicObjective>(
            "SELECT id, description, active FROM strategic_objectives WHERE active ORDER BY created_at, id",
        )
        .fetch_all(&self.state.pool)
        .await?)
    }
}

/// Moves a Rejected project back to Draft; a no-op for drafts.
pub(crate) async fn reopen_after_edit(
    conn: &mut PgConnection,
    project: &Project,
) -> Result<(), ServiceError> {
    let next = lifecycle::state_after_edit(project.state)?;
    sqlx::query("UPDATE projects SET state = $1, updated_at = $2 WHERE id = $3")
        .bind(next)
        .bind(Utc::now())
        .bind(project.id)
        .execute(conn)
        .await?;
    if next != project.state {
        info!(project_id = %project.id, "rejected project reopened as draft");
    }
    Ok(())
}

/// Activity fields after validation, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ActivityFields {
    pub description: String,
    pub unit_of_measure: String,
    pub planned_quantity: i64,
    pub is_quantifiable: bool,
    pub verification_method: String,
    pub resource_description: String,
    pub resource_amount: Decimal,
}

impl ActivityFields {
    pub(crate) fn from_request(payload: &ActivityRequest) -> Result<Self, ServiceError> {
        payload.validate()?;
        let planned_quantity = match &payload.planned_quantity {
            Some(raw) => quantity_field("planned_quantity", raw)?,
            None => 0,
        };
        let draft = ActivityDraft {
            description: &payload.description,
            unit_of_measure: payload.unit_of_measure.as_deref(),
            custom_unit_of_measure: payload.custom_unit_of_measure.as_deref(),
            planned_quantity,
            is_quantifiable: payload.is_quantifiable,
            resource_amount: payload.resource_amount,
        };
        policy::evaluate_activity(&draft).into_result()?;
        let unit_of_measure = policy::resolve_unit_of_measure(
            payload.unit_of_measure.as_deref(),
            payload.custom_unit_of_measure.as_deref(),
        )?;
        Ok(Self {
            description: payload.description.trim().to_string(),
            unit_of_measure,
            planned_quantity,
            is_quantifiable: payload.is_quantifiable,
            verification_method: payload.verification_method.trim().to_string(),
            resource_description: payload.resource_description.trim().to_string(),
            resource_amount: payload.resource_amount.round_dp(2),
        })
    }
}

/// Every entry is checked so the caller sees all bad months at once.
pub(crate) fn parse_monthly_plan(raw: &[serde_json::Number]) -> Result<Vec<i64>, ServiceError> {
    if raw.len() != MONTHS {
        return Err(ServiceError::field(
            "monthly_plan",
            format!("expected {MONTHS} monthly values, got {}", raw.len()),
        ));
    }
    let mut values = Vec::with_capacity(MONTHS);
    let mut errors = Vec::new();
    for (idx, value) in raw.iter().enumerate() {
        match policy::parse_quantity(value) {
            Ok(value) => values.push(value),
            Err(violation) => errors.push(FieldError::new(
                format!("monthly_plan[{}]", idx + 1),
                format!("planned quantity {}", violation.message()),
            )),
        }
    }
    if errors.is_empty() {
        Ok(values)
    } else {
        Err(ServiceError::Validation(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn activity_request(value: serde_json::Value) -> ActivityRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn year_accepts_numbers_and_strings() {
        let from_number: CreateProjectRequest =
            serde_json::from_value(json!({"year": 2025})).unwrap();
        let from_text: CreateProjectRequest =
            serde_json::from_value(json!({"year": "2025", "is_unplanned": true})).unwrap();
        assert_eq!(from_number.year, 2025);
        assert_eq!(from_text.year, 2025);
        assert!(from_text.is_unplanned);
        assert!(from_number.name.is_none());
    }

    #[test]
    fn custom_unit_of_measure_is_stored() {
        let fields = ActivityFields::from_request(&activity_request(json!({
            "description": "  Tree planting  ",
            "unit_of_measure": "Other",
            "custom_unit_of_measure": "Trees",
            "planned_quantity": 300,
            "resource_amount": "1250.505"
        })))
        .unwrap();
        assert_eq!(fields.unit_of_measure, "Trees");
        assert_eq!(fields.description, "Tree planting");
        assert_eq!(fields.planned_quantity, 300);
        assert_eq!(fields.resource_amount, Decimal::new(125050, 2));
    }

    #[test]
    fn non_quantifiable_activity_rejects_a_plan() {
        let err = ActivityFields::from_request(&activity_request(json!({
            "description": "Coordinate with the council",
            "unit_of_measure": "Meeting",
            "is_quantifiable": false,
            "planned_quantity": 4
        })))
        .unwrap_err();
        assert_eq!(err.field_errors()[0].field, "planned_quantity");

        let ok = ActivityFields::from_request(&activity_request(json!({
            "description": "Coordinate with the council",
            "unit_of_measure": "Meeting",
            "is_quantifiable": false
        })))
        .unwrap();
        assert_eq!(ok.planned_quantity, 0);
    }

    #[test]
    fn oversized_plan_is_out_of_range() {
        let err = ActivityFields::from_request(&activity_request(json!({
            "description": "Street lighting",
            "unit_of_measure": "Unit",
            "planned_quantity": 1_000_000
        })))
        .unwrap_err();
        assert!(matches!(err, ServiceError::OutOfRange { .. }));
        assert_eq!(err.status_code(), axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn monthly_plan_reports_every_bad_month() {
        let raw: Vec<serde_json::Number> =
            serde_json::from_value(json!([1, -2, 3, 4.5, 0, 0, 0, 0, 0, 0, 0, 0])).unwrap();
        let err = parse_monthly_plan(&raw).unwrap_err();
        let fields: Vec<String> = err.field_errors().into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["monthly_plan[2]", "monthly_plan[4]"]);

        let short: Vec<serde_json::Number> = serde_json::from_value(json!([1, 2, 3])).unwrap();
        assert_eq!(
            parse_monthly_plan(&short).unwrap_err().field_errors()[0].message,
            "expected 12 monthly values, got 3"
        );
    }
}
