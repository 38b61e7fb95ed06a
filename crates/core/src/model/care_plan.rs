//! Care plan goals and interventions.

use super::{GoalId, InterventionId, SessionId};
use chrono::{DateTime, NaiveDate, Utc};
use ratchet_types::NonEmptyText;
use ratchet_uuid::TimestampUuid;
use serde::{Deserialize, Serialize};

/// Goal lifecycle: `NotStarted -> InProgress -> Met`, or `-> NotMet` by explicit override.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    #[default]
    NotStarted,
    InProgress,
    Met,
    NotMet,
}

impl GoalStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Met | Self::NotMet)
    }
}

impl std::fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Met => "met",
            Self::NotMet => "not_met",
        };
        f.write_str(label)
    }
}

/// Reference from a goal to the intervention event that supports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterventionRef {
    pub event_id: TimestampUuid,
    pub intervention_id: InterventionId,
    pub session_id: SessionId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarePlanGoal {
    pub goal_id: GoalId,
    pub text: NonEmptyText,
    pub pathway: String,
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: GoalStatus,
    /// Append-only, in documentation order.
    #[serde(default)]
    pub supporting_interventions: Vec<InterventionRef>,
    /// Date the goal reached a terminal status.
    #[serde(default)]
    pub closed_on: Option<NaiveDate>,
    #[serde(default)]
    pub closure_note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarePlanIntervention {
    pub intervention_id: InterventionId,
    pub text: NonEmptyText,
    pub pathway: String,
    #[serde(default)]
    pub frequency: Option<String>,
    /// Goal this intervention works toward. Unlinked interventions are documented but do
    /// not move any goal.
    #[serde(default)]
    pub goal_id: Option<GoalId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CarePlan {
    #[serde(default)]
    pub goals: Vec<CarePlanGoal>,
    #[serde(default)]
    pub interventions: Vec<CarePlanIntervention>,
}

impl CarePlan {
    pub fn goal(&self, goal_id: &GoalId) -> Option<&CarePlanGoal> {
        self.goals.iter().find(|g| &g.goal_id == goal_id)
    }

    pub fn intervention(&self, intervention_id: &InterventionId) -> Option<&CarePlanIntervention> {
        self.interventions
            .iter()
            .find(|i| &i.intervention_id == intervention_id)
    }

    pub fn count_with_status(&self, status: GoalStatus) -> usize {
        self.goals.iter().filter(|g| g.status == status).count()
    }
}

/// One documented intervention during a visit. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionEvent {
    pub event_id: TimestampUuid,
    pub session_id: SessionId,
    pub intervention_id: InterventionId,
    pub provided: bool,
    #[serde(default)]
    pub outcome_note: Option<NonEmptyText>,
    pub recorded_at: DateTime<Utc>,
}

impl InterventionEvent {
    pub fn reference(&self) -> InterventionRef {
        InterventionRef {
            event_id: self.event_id.clone(),
            intervention_id: self.intervention_id.clone(),
            session_id: self.session_id.clone(),
        }
    }
}
