//! Persisted guided-creation sessions. The step logic lives in
//! `domain::wizard`; this service loads the draft's facts, applies the
//! command's side effect and stores where the user landed.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    domain::wizard::{self, CommandKind, DraftFacts, DraftSession, Outcome, WizardStep},
    infrastructure::{auth::AuthenticatedUser, state::AppState},
};

use super::{
    access,
    errors::ServiceError,
    projects::{
        ActivityRequest, CreateProjectRequest, GoalRequest, ProgrammingRequest, ProjectService,
        UpdateProjectRequest,
    },
};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WizardCommand {
    SaveProjectInfo(CreateProjectRequest),
    AddGoal(GoalRequest),
    AddActivity {
        goal_id: Uuid,
        activity: ActivityRequest,
    },
    SaveProgramming {
        activity_id: Uuid,
        monthly_plan: Vec<serde_json::Number>,
    },
    Next,
    Back,
    Confirm,
    Cancel {
        #[serde(default)]
        discard_draft: bool,
    },
}

impl WizardCommand {
    pub fn kind(&self) -> CommandKind {
        match self {
            WizardCommand::SaveProjectInfo(_) => CommandKind::SaveProjectInfo,
            WizardCommand::AddGoal(_) => CommandKind::AddGoal,
            WizardCommand::AddActivity { .. } => CommandKind::AddActivity,
            WizardCommand::SaveProgramming { .. } => CommandKind::SaveProgramming,
            WizardCommand::Next => CommandKind::Next,
            WizardCommand::Back => CommandKind::Back,
            WizardCommand::Confirm => CommandKind::Confirm,
            WizardCommand::Cancel { discard_draft } => CommandKind::Cancel {
                discard_draft: *discard_draft,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WizardView {
    /// `None` once the session has been confirmed or cancelled.
    pub step: Option<WizardStep>,
    pub step_number: Option<u8>,
    pub project_id: Option<Uuid>,
    pub goal_count: i64,
    pub goals_without_activities: i64,
    pub activity_count: i64,
}

impl WizardView {
    fn new(step: Option<WizardStep>, project_id: Option<Uuid>, facts: DraftFacts) -> Self {
        Self {
            step,
            step_number: step.map(|step| step.number()),
            project_id,
            goal_count: facts.goal_count,
            goals_without_activities: facts.goals_without_activities,
            activity_count: facts.activity_count,
        }
    }
}

pub struct WizardService {
    pub state: Arc<AppState>,
}

impl WizardService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// The caller's session, starting a fresh one on first use.
    pub async fn current(&self, actor: &AuthenticatedUser) -> Result<WizardView, ServiceError> {
        actor.owned_unit()?;
        let session = self.load_session(actor.user_id).await?;
        let facts = self.facts(session.project_id).await?;
        Ok(WizardView::new(Some(session.step), session.project_id, facts))
    }

    pub async fn apply(
        &self,
        actor: &AuthenticatedUser,
        command: WizardCommand,
    ) -> Result<WizardView, ServiceError> {
        actor.owned_unit()?;
        let session = self.load_session(actor.user_id).await?;
        let facts = self.facts(session.project_id).await?;
        let outcome = wizard::advance(session.step, command.kind(), &facts)?;
        let projects = ProjectService::new(self.state.clone());
        let mut project_id = session.project_id;

        match command {
            WizardCommand::SaveProjectInfo(info) => match project_id {
                Some(existing) => {
                    projects
                        .update_project(
                            actor,
                            existing,
                            UpdateProjectRequest {
                                name: info.name,
                                unit_objective: info.unit_objective,
                            },
                        )
                        .await?;
                }
                None => {
                    let project = projects.create_project(actor, info).await?;
                    project_id = Some(project.id);
                }
            },
            WizardCommand::AddGoal(goal) => {
                let project_id = project_id.ok_or(wizard::WizardError::MissingProject)?;
                projects.add_goal(actor, project_id, goal).await?;
            }
            WizardCommand::AddActivity { goal_id, activity } => {
                let owner = access::project_for_goal(&self.state.pool, goal_id).await?;
                if Some(owner.id) != project_id {
                    return Err(ServiceError::NotFound);
                }
                projects.add_activity(actor, goal_id, activity).await?;
            }
            WizardCommand::SaveProgramming {
                activity_id,
                monthly_plan,
            } => {
                let owner = access::project_for_activity(&self.state.pool, activity_id).await?;
                if Some(owner.id) != project_id {
                    return Err(ServiceError::NotFound);
                }
                projects
                    .save_programming(actor, activity_id, ProgrammingRequest { monthly_plan })
                    .await?;
            }
            WizardCommand::Next
            | WizardCommand::Back
            | WizardCommand::Confirm
            | WizardCommand::Cancel { .. } => {}
        }

        match outcome {
            Outcome::Stay(step) => {
                self.save_session(actor.user_id, step, project_id).await?;
                let facts = self.facts(project_id).await?;
                Ok(WizardView::new(Some(step), project_id, facts))
            }
            Outcome::Finish => {
                self.clear_session(actor.user_id).await?;
                info!(actor = %actor.user_id, project_id = ?project_id, "wizard completed");
                let facts = self.facts(project_id).await?;
                Ok(WizardView::new(None, project_id, facts))
            }
            Outcome::Abandon { discard_draft } => {
                self.clear_session(actor.user_id).await?;
                match project_id {
                    Some(draft) if discard_draft => {
                        projects.delete_draft(actor, draft).await?;
                        info!(actor = %actor.user_id, project_id = %draft, "wizard cancelled, draft discarded");
                        Ok(WizardView::new(None, None, DraftFacts::default()))
                    }
                    _ => {
                        let facts = self.facts(project_id).await?;
                        Ok(WizardView::new(None, project_id, facts))
                    }
                }
            }
        }
    }

    async fn load_session(&self, user_id: Uuid) -> Result<DraftSession, ServiceError> {
        let session = sqlx::query_as::<_, DraftSession>(
            "SELECT user_id, step, project_id, updated_at FROM wizard_sessions WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.state.pool)
        .await?;
        Ok(session.unwrap_or_else(|| DraftSession {
            user_id,
            step: WizardStep::ProjectInfo,
            project_id: None,
            updated_at: Utc::now(),
        }))
    }

    async fn save_session(
        &self,
        user_id: Uuid,
        step: WizardStep,
        project_id: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        sqlx::query(
            "INSERT INTO wizard_sessions (user_id, step, project_id, updated_at) VALUES ($1,$2,$3,$4)
             ON CONFLICT (user_id) DO UPDATE SET step = EXCLUDED.step,
                 project_id = EXCLUDED.project_id, updated_at = EXCLUDED.updated_at",
        )
        .bind(user_id)
        .bind(step)
        .bind(project_id)
        .bind(Utc::now())
        .execute(&self.state.pool)
        .await?;
        Ok(())
    }

    async fn clear_session(&self, user_id: Uuid) -> Result<(), ServiceError> {
        sqlx::query("DELETE FROM wizard_sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.state.pool)
            .await?;
        Ok(())
    }

    async fn facts(&self, project_id: Option<Uuid>) -> Result<DraftFacts, ServiceError> {
        let Some(project_id) = project_id else {
            return Ok(DraftFacts::default());
        };
        let (goal_count, goals_without_activities, activity_count): (i64, i64, i64) =
            sqlx::query_as(
                "SELECT
                     (SELECT COUNT(*) FROM goals WHERE project_id = $1),
                     (SELECT COUNT(*) FROM goals g WHERE g.project_id = $1
                         AND NOT EXISTS (SELECT 1 FROM activities a WHERE a.goal_id = g.id)),
                     (SELECT COUNT(*) FROM activities a JOIN goals g ON g.id = a.goal_id
                         WHERE g.project_id = $1)",
            )
            .bind(project_id)
            .fetch_one(&self.state.pool)
            .await?;
        Ok(DraftFacts {
            has_project: true,
            goal_count,
            goals_without_activities,
            activity_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn commands_are_tagged() {
        let command: WizardCommand = serde_json::from_value(json!({
            "command": "save_project_info",
            "year": "2025",
            "name": "Clean rivers"
        }))
        .unwrap();
        assert_eq!(command.kind(), CommandKind::SaveProjectInfo);

        let command: WizardCommand =
            serde_json::from_value(json!({"command": "cancel", "discard_draft": true})).unwrap();
        assert_eq!(command.kind(), CommandKind::Cancel { discard_draft: true });

        let command: WizardCommand = serde_json::from_value(json!({"command": "next"})).unwrap();
        assert_eq!(command.kind(), CommandKind::Next);
    }

    #[test]
    fn activity_command_carries_its_goal() {
        let goal_id = Uuid::new_v4();
        let command: WizardCommand = serde_json::from_value(json!({
            "command": "add_activity",
            "goal_id": goal_id,
            "activity": {
                "description": "Community clean-up days",
                "unit_of_measure": "Event",
                "planned_quantity": 6
            }
        }))
        .unwrap();
        match command {
            WizardCommand::AddActivity { goal_id: id, activity } => {
                assert_eq!(id, goal_id);
                assert!(activity.is_quantifiable);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn finished_view_has_no_step() {
        let view = WizardView::new(None, None, DraftFacts::default());
        assert_eq!(view.step_number, None);
        let view = WizardView::new(Some(WizardStep::Programming), None, DraftFacts::default());
        assert_eq!(view.step_number, Some(4));
    }
}
