//! Lookups that resolve a goal or activity to its project, plus the
//! ownership checks every mutating operation runs first.

use sqlx::PgExecutor;
use uuid::Uuid;

use crate::{
    domain::models::{Activity, Project, ProjectState, Role},
    infrastructure::auth::AuthenticatedUser,
};

use super::{errors::ServiceError, snapshots::PROJECT_COLUMNS};

pub async fn project_by_id<'c>(
    executor: impl PgExecutor<'c>,
    project_id: Uuid,
) -> Result<Project, ServiceError> {
    sqlx::query_as::<_, Project>(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects p WHERE p.id = $1"
    ))
    .bind(project_id)
    .fetch_optional(executor)
    .await?
    .ok_or(ServiceError::NotFound)
}

pub async fn project_for_goal<'c>(
    executor: impl PgExecutor<'c>,
    goal_id: Uuid,
) -> Result<Project, ServiceError> {
    sqlx::query_as::<_, Project>(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects p JOIN goals g ON g.project_id = p.id WHERE g.id = $1"
    ))
    .bind(goal_id)
    .fetch_optional(executor)
    .await?
    .ok_or(ServiceError::NotFound)
}

pub async fn project_for_activity<'c>(
    executor: impl PgExecutor<'c>,
    activity_id: Uuid,
) -> Result<Project, ServiceError> {
    sqlx::query_as::<_, Project>(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects p
         JOIN goals g ON g.project_id = p.id
         JOIN activities a ON a.goal_id = g.id
         WHERE a.id = $1"
    ))
    .bind(activity_id)
    .fetch_optional(executor)
    .await?
    .ok_or(ServiceError::NotFound)
}

pub async fn activity_by_id<'c>(
    executor: impl PgExecutor<'c>,
    activity_id: Uuid,
) -> Result<Activity, ServiceError> {
    sqlx::query_as::<_, Activity>(
        "SELECT id, goal_id, description, unit_of_measure, planned_quantity, is_quantifiable,
                verification_method, resource_description, resource_amount, created_at
         FROM activities WHERE id = $1",
    )
    .bind(activity_id)
    .fetch_optional(executor)
    .await?
    .ok_or(ServiceError::NotFound)
}

/// The caller must be the unit account that owns `project`.
pub fn ensure_owner(actor: &AuthenticatedUser, project: &Project) -> Result<(), ServiceError> {
    if actor.owned_unit()? == project.unit_id {
        Ok(())
    } else {
        Err(ServiceError::Forbidden)
    }
}

/// Owners see their own projects; admins and auditors see every project.
pub fn ensure_can_view(actor: &AuthenticatedUser, project: &Project) -> Result<(), ServiceError> {
    match actor.role {
        Role::Admin | Role::Auditor => Ok(()),
        Role::Unit => ensure_owner(actor, project),
    }
}

/// Owner plus a Draft or Rejected project.
pub fn ensure_editable(actor: &AuthenticatedUser, project: &Project) -> Result<(), ServiceError> {
    ensure_owner(actor, project)?;
    if project.state.is_editable() {
        Ok(())
    } else {
        Err(ServiceError::Conflict(format!(
            "projects that are {} cannot be edited",
            project.state.as_str()
        )))
    }
}

/// Owner plus an Approved project; progress and evidence need both.
pub fn ensure_trackable(actor: &AuthenticatedUser, project: &Project) -> Result<(), ServiceError> {
    ensure_owner(actor, project)?;
    if project.state == ProjectState::Approved {
        Ok(())
    } else {
        Err(ServiceError::Conflict(
            "progress can only be recorded on approved projects".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporting::snapshot::fixtures;

    fn unit_user(unit_id: Uuid) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: Uuid::new_v4(),
            role: Role::Unit,
            unit_id: Some(unit_id),
        }
    }

    #[test]
    fn other_units_cannot_touch_a_project() {
        let unit = fixtures::unit("Culture");
        let project = fixtures::project(&unit, "Library nights", false);
        assert!(ensure_owner(&unit_user(unit.id), &project).is_ok());
        assert!(matches!(
            ensure_owner(&unit_user(Uuid::new_v4()), &project),
            Err(ServiceError::Forbidden)
        ));
    }

    #[test]
    fn oversight_roles_can_view_but_not_edit() {
        let unit = fixtures::unit("Culture");
        let project = fixtures::project(&unit, "Library nights", false);
        let auditor = AuthenticatedUser {
            user_id: Uuid::new_v4(),
            role: Role::Auditor,
            unit_id: None,
        };
        assert!(ensure_can_view(&auditor, &project).is_ok());
        assert!(matches!(
            ensure_editable(&auditor, &project),
            Err(ServiceError::Forbidden)
        ));
    }

    #[test]
    fn edit_and_tracking_depend_on_state() {
        let unit = fixtures::unit("Culture");
        let owner = unit_user(unit.id);
        let mut project = fixtures::project(&unit, "Library nights", false);

        project.state = ProjectState::Rejected;
        assert!(ensure_editable(&owner, &project).is_ok());
        assert!(matches!(
            ensure_trackable(&owner, &project),
            Err(ServiceError::Conflict(_))
        ));

        project.state = ProjectState::Submitted;
        assert!(matches!(
            ensure_editable(&owner, &project),
            Err(ServiceError::Conflict(_))
        ));

        project.state = ProjectState::Approved;
        assert!(ensure_trackable(&owner, &project).is_ok());
    }
}
