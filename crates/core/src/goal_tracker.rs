//! Care plan goal state transitions.
//!
//! Goals move `NotStarted -> InProgress` on their first supporting intervention and reach
//! `Met` only when the caller says so. `NotMet` is an explicit override. Both terminal states
//! refuse further linkage.

use crate::model::{CarePlanGoal, GoalStatus, InterventionEvent};
use crate::{ClinicalError, ClinicalResult};
use chrono::NaiveDate;
use ratchet_types::NonEmptyText;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GoalTransition {
    pub from: GoalStatus,
    pub to: GoalStatus,
}

impl GoalTransition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

fn ensure_open(goal: &CarePlanGoal) -> ClinicalResult<()> {
    if goal.status.is_terminal() {
        return Err(ClinicalError::GoalClosed {
            goal_id: goal.goal_id.to_string(),
            status: goal.status,
        });
    }
    Ok(())
}

/// Links `event` to `goal` and advances its status.
///
/// Takes the goal by value and hands back the updated copy so a failed evaluation leaves
/// the caller's record untouched.
pub fn evaluate(
    mut goal: CarePlanGoal,
    event: &InterventionEvent,
    goal_met: bool,
) -> ClinicalResult<(CarePlanGoal, GoalTransition)> {
    ensure_open(&goal)?;

    let from = goal.status;
    goal.supporting_interventions.push(event.reference());

    if goal.status == GoalStatus::NotStarted {
        goal.status = GoalStatus::InProgress;
    }
    if goal_met {
        goal.status = GoalStatus::Met;
        goal.closed_on = Some(event.recorded_at.date_naive());
    }

    let transition = GoalTransition {
        from,
        to: goal.status,
    };
    if transition.changed() {
        tracing::info!(
            goal_id = %goal.goal_id,
            from = %transition.from,
            to = %transition.to,
            "care plan goal advanced"
        );
    }
    Ok((goal, transition))
}

/// Closes an open goal as `NotMet`.
pub fn mark_not_met(
    mut goal: CarePlanGoal,
    reason: NonEmptyText,
    on: NaiveDate,
) -> ClinicalResult<(CarePlanGoal, GoalTransition)> {
    ensure_open(&goal)?;

    let from = goal.status;
    goal.status = GoalStatus::NotMet;
    goal.closed_on = Some(on);
    goal.closure_note = Some(reason.into_inner());

    tracing::info!(goal_id = %goal.goal_id, from = %from, "care plan goal closed as not met");
    Ok((
        goal,
        GoalTransition {
            from,
            to: GoalStatus::NotMet,
        },
    ))
}
