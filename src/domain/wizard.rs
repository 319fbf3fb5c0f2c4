//! Step machine behind guided project creation.
//!
//! The session itself is persisted (`wizard_sessions`) so progress survives
//! across requests; this module only decides which step comes next.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

use super::models::text_enum;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    ProjectInfo,
    Goals,
    Activities,
    Programming,
    Confirmation,
}

text_enum!(WizardStep, "wizard step", {
    ProjectInfo => "project_info",
    Goals => "goals",
    Activities => "activities",
    Programming => "programming",
    Confirmation => "confirmation",
});

impl WizardStep {
    pub fn number(&self) -> u8 {
        match self {
            WizardStep::ProjectInfo => 1,
            WizardStep::Goals => 2,
            WizardStep::Activities => 3,
            WizardStep::Programming => 4,
            WizardStep::Confirmation => 5,
        }
    }

    fn forward(&self) -> Option<WizardStep> {
        match self {
            WizardStep::ProjectInfo => Some(WizardStep::Goals),
            WizardStep::Goals => Some(WizardStep::Activities),
            WizardStep::Activities => Some(WizardStep::Programming),
            WizardStep::Programming => Some(WizardStep::Confirmation),
            WizardStep::Confirmation => None,
        }
    }

    fn backward(&self) -> Option<WizardStep> {
        match self {
            WizardStep::ProjectInfo => None,
            WizardStep::Goals => Some(WizardStep::ProjectInfo),
            WizardStep::Activities => Some(WizardStep::Goals),
            WizardStep::Programming => Some(WizardStep::Activities),
            WizardStep::Confirmation => Some(WizardStep::Programming),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DraftSession {
    pub user_id: Uuid,
    pub step: WizardStep,
    pub project_id: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

/// Counts the guards need; loaded fresh for every command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DraftFacts {
    pub has_project: bool,
    pub goal_count: i64,
    pub goals_without_activities: i64,
    pub activity_count: i64,
}

/// What the caller should do once a command has been accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Persist the session at this step.
    Stay(WizardStep),
    /// Remove the session; the project stays as a draft.
    Finish,
    /// Remove the session and optionally the draft project.
    Abandon { discard_draft: bool },
}

/// Command kinds without payloads; the service pairs each with its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    SaveProjectInfo,
    AddGoal,
    AddActivity,
    SaveProgramming,
    Next,
    Back,
    Confirm,
    Cancel { discard_draft: bool },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WizardError {
    #[error("{command} is not available on step {step}")]
    WrongStep {
        command: &'static str,
        step: WizardStep,
    },
    #[error("save the project information first")]
    MissingProject,
    #[error("add at least one goal to continue")]
    NoGoals,
    #[error("{0} goal(s) still have no activities")]
    GoalsWithoutActivities(i64),
    #[error("add at least one activity to continue")]
    NoActivities,
    #[error("already on the first step")]
    AtFirstStep,
}

impl CommandKind {
    fn name(&self) -> &'static str {
        match self {
            CommandKind::SaveProjectInfo => "save_project_info",
            CommandKind::AddGoal => "add_goal",
            CommandKind::AddActivity => "add_activity",
            CommandKind::SaveProgramming => "save_programming",
            CommandKind::Next => "next",
            CommandKind::Back => "back",
            CommandKind::Confirm => "confirm",
            CommandKind::Cancel { .. } => "cancel",
        }
    }
}

/// Decides the step that follows `command` on `step`. Facts describe the
/// draft before the command's own side effect.
pub fn advance(step: WizardStep, command: CommandKind, facts: &DraftFacts) -> Result<Outcome, WizardError> {
    let wrong_step = || WizardError::WrongStep {
        command: command.name(),
        step,
    };

    match command {
        CommandKind::Cancel { discard_draft } => Ok(Outcome::Abandon { discard_draft }),
        CommandKind::SaveProjectInfo => match step {
            WizardStep::ProjectInfo => Ok(Outcome::Stay(WizardStep::Goals)),
            _ => Err(wrong_step()),
        },
        CommandKind::AddGoal => match step {
            WizardStep::Goals if facts.has_project => Ok(Outcome::Stay(WizardStep::Goals)),
            WizardStep::Goals => Err(WizardError::MissingProject),
            _ => Err(wrong_step()),
        },
        CommandKind::AddActivity => match step {
            WizardStep::Activities => Ok(Outcome::Stay(WizardStep::Activities)),
            _ => Err(wrong_step()),
        },
        CommandKind::SaveProgramming => match step {
            WizardStep::Programming => Ok(Outcome::Stay(WizardStep::Programming)),
            _ => Err(wrong_step()),
        },
        CommandKind::Back => step
            .backward()
            .map(Outcome::Stay)
            .ok_or(WizardError::AtFirstStep),
        CommandKind::Next => {
            match step {
                WizardStep::ProjectInfo if !facts.has_project => {
                    return Err(WizardError::MissingProject)
                }
                WizardStep::Goals if facts.goal_count < 1 => return Err(WizardError::NoGoals),
                WizardStep::Activities if facts.goals_without_activities > 0 => {
                    return Err(WizardError::GoalsWithoutActivities(
                        facts.goals_without_activities,
                    ))
                }
                WizardStep::Activities if facts.activity_count < 1 => {
                    return Err(WizardError::NoActivities)
                }
                _ => {}
            }
            step.forward().map(Outcome::Stay).ok_or_else(wrong_step)
        }
        CommandKind::Confirm => match step {
            WizardStep::Confirmation => Ok(Outcome::Finish),
            _ => Err(wrong_step()),
        },
    }
}
