//! Project approval state machine.
//!
//! `Draft -> Submitted -> {Approved, Rejected}` and `Rejected -> Draft` when
//! the owning unit edits a rejected plan. Approval never touches any other
//! project of the same unit.

use thiserror::Error;

use super::{
    models::ProjectState,
    policy::FieldError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Submit,
    Approve,
    Reject,
    Reopen,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Submit => "submit",
            Transition::Approve => "approve",
            Transition::Reject => "reject",
            Transition::Reopen => "reopen",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("cannot {} a project that is {}", .transition.as_str(), .from.as_str())]
pub struct TransitionError {
    pub from: ProjectState,
    pub transition: Transition,
}

pub fn next_state(from: ProjectState, transition: Transition) -> Result<ProjectState, TransitionError> {
    use ProjectState::*;

    match (from, transition) {
        (Draft, Transition::Submit) => Ok(Submitted),
        (Submitted, Transition::Approve) => Ok(Approved),
        (Submitted, Transition::Reject) => Ok(Rejected),
        (Rejected, Transition::Reopen) => Ok(Draft),
        _ => Err(TransitionError { from, transition }),
    }
}

/// State a project lands in after its owner edits it. Rejected plans fall
/// back to draft; drafts stay put.
pub fn state_after_edit(from: ProjectState) -> Result<ProjectState, TransitionError> {
    match from {
        ProjectState::Draft => Ok(ProjectState::Draft),
        ProjectState::Rejected => next_state(from, Transition::Reopen),
        _ => Err(TransitionError {
            from,
            transition: Transition::Reopen,
        }),
    }
}

/// A plan needs at least one goal before it can be sent for approval.
pub fn can_submit(state: ProjectState, goal_count: i64) -> Result<(), FieldError> {
    if state != ProjectState::Draft {
        return Err(FieldError::new(
            "state",
            format!("only draft projects can be submitted (currently {})", state.as_str()),
        ));
    }
    if goal_count < 1 {
        return Err(FieldError::new(
            "goals",
            "add at least one goal before submitting",
        ));
    }
    Ok(())
}

pub fn rejection_reason(reason: Option<&str>) -> Result<String, FieldError> {
    match reason.map(str::trim) {
        Some(reason) if !reason.is_empty() => Ok(reason.to_string()),
        _ => Err(FieldError::new("reason", "a rejection reason is required")),
    }
}
