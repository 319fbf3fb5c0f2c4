//! Loads project trees (goals, activities, monthly rows, evidence) in five
//! flat queries and stitches them together in memory.

use std::collections::HashMap;

use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    domain::models::{Activity, Evidence, Goal, MonthlyProgress, Project, ProjectState},
    infrastructure::db::PgPool,
    reporting::snapshot::{ActivitySnapshot, GoalSnapshot, ProjectSnapshot},
};

use super::errors::ServiceError;

pub(crate) const PROJECT_COLUMNS: &str = "p.id, p.unit_id, p.name, p.year, p.unit_objective, p.state, \
     p.rejection_reason, p.approved_by, p.approved_at, p.is_unplanned, p.created_at, p.updated_at";

#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    pub project_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
    pub year: Option<i32>,
    pub state: Option<ProjectState>,
}

impl ProjectFilter {
    pub fn project(id: Uuid) -> Self {
        Self {
            project_id: Some(id),
            ..Self::default()
        }
    }

    pub fn approved() -> Self {
        Self {
            state: Some(ProjectState::Approved),
            ..Self::default()
        }
    }
}

#[derive(FromRow)]
struct ProjectRow {
    #[sqlx(flatten)]
    project: Project,
    unit_name: String,
    approver_email: Option<String>,
}

pub async fn load_snapshots(
    pool: &PgPool,
    filter: &ProjectFilter,
) -> Result<Vec<ProjectSnapshot>, ServiceError> {
    let projects = sqlx::query_as::<_, ProjectRow>(&format!(
        r#"
        SELECT {PROJECT_COLUMNS}, u.name AS unit_name, approver.email AS approver_email
        FROM projects p
        JOIN units u ON u.id = p.unit_id
        LEFT JOIN users approver ON approver.id = p.approved_by
        WHERE ($1::uuid IS NULL OR p.id = $1)
          AND ($2::uuid IS NULL OR p.unit_id = $2)
          AND ($3::int IS NULL OR p.year = $3)
          AND ($4::text IS NULL OR p.state = $4)
        ORDER BY u.name, p.year, p.is_unplanned, p.created_at, p.id
        "#
    ))
    .bind(filter.project_id)
    .bind(filter.unit_id)
    .bind(filter.year)
    .bind(filter.state)
    .fetch_all(pool)
    .await?;
    if projects.is_empty() {
        return Ok(Vec::new());
    }

    let project_ids: Vec<Uuid> = projects.iter().map(|row| row.project.id).collect();
    let goals = sqlx::query_as::<_, Goal>(
        "SELECT id, project_id, description, created_at FROM goals
         WHERE project_id = ANY($1) ORDER BY created_at, id",
    )
    .bind(&project_ids)
    .fetch_all(pool)
    .await?;

    let goal_ids: Vec<Uuid> = goals.iter().map(|goal| goal.id).collect();
    let activities = sqlx::query_as::<_, Activity>(
        "SELECT id, goal_id, description, unit_of_measure, planned_quantity, is_quantifiable,
                verification_method, resource_description, resource_amount, created_at
         FROM activities WHERE goal_id = ANY($1) ORDER BY created_at, id",
    )
    .bind(&goal_ids)
    .fetch_all(pool)
    .await?;

    let activity_ids: Vec<Uuid> = activities.iter().map(|activity| activity.id).collect();
    let progress = sqlx::query_as::<_, MonthlyProgress>(
        "SELECT id, activity_id, month, year, planned_quantity, realized_quantity, compliance,
                is_unplanned, non_compliance_cause, updated_at
         FROM monthly_progress WHERE activity_id = ANY($1) ORDER BY month",
    )
    .bind(&activity_ids)
    .fetch_all(pool)
    .await?;
    let evidence = sqlx::query_as::<_, Evidence>(
        "SELECT id, activity_id, month, kind, description, file_key, file_name, size_bytes, url,
                uploaded_by, created_at
         FROM evidence WHERE activity_id = ANY($1) ORDER BY month NULLS LAST, created_at, id",
    )
    .bind(&activity_ids)
    .fetch_all(pool)
    .await?;

    Ok(assemble(projects, goals, activities, progress, evidence))
}

/// Single project tree, or `NotFound`.
pub async fn load_snapshot(pool: &PgPool, project_id: Uuid) -> Result<ProjectSnapshot, ServiceError> {
    load_snapshots(pool, &ProjectFilter::project(project_id))
        .await?
        .into_iter()
        .next()
        .ok_or(ServiceError::NotFound)
}

fn assemble(
    projects: Vec<ProjectRow>,
    goals: Vec<Goal>,
    activities: Vec<Activity>,
    progress: Vec<MonthlyProgress>,
    evidence: Vec<Evidence>,
) -> Vec<ProjectSnapshot> {
    let mut progress_by_activity: HashMap<Uuid, Vec<MonthlyProgress>> = HashMap::new();
    for row in progress {
        progress_by_activity.entry(row.activity_id).or_default().push(row);
    }
    let mut evidence_by_activity: HashMap<Uuid, Vec<Evidence>> = HashMap::new();
    for item in evidence {
        evidence_by_activity.entry(item.activity_id).or_default().push(item);
    }
    let mut activities_by_goal: HashMap<Uuid, Vec<ActivitySnapshot>> = HashMap::new();
    for activity in activities {
        let progress = progress_by_activity.remove(&activity.id).unwrap_or_default();
        let evidence = evidence_by_activity.remove(&activity.id).unwrap_or_default();
        activities_by_goal
            .entry(activity.goal_id)
            .or_default()
            .push(ActivitySnapshot::new(activity, progress, evidence));
    }
    let mut goals_by_project: HashMap<Uuid, Vec<GoalSnapshot>> = HashMap::new();
    for goal in goals {
        let activities = activities_by_goal.remove(&goal.id).unwrap_or_default();
        goals_by_project
            .entry(goal.project_id)
            .or_default()
            .push(GoalSnapshot { goal, activities });
    }

    projects
        .into_iter()
        .map(|row| ProjectSnapshot {
            goals: goals_by_project.remove(&row.project.id).unwrap_or_default(),
            project: row.project,
            unit_name: row.unit_name,
            approver_email: row.approver_email,
        })
        .collect()
}
