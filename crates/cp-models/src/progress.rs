//! Per-company task completion records and their rollups
//!
//! Tables: company_task_progress, company_sub_project_progress,
//! company_project_progress

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cp_core::traits::Id;
use cp_core::types::EntityKind;
use cp_core::CoreError;
use serde::{Deserialize, Serialize};

/// Completion state of one `(task, company)` pair.
///
/// ```text
/// pending ──► in_progress ──► submitted_for_approval ──► approved
///    │                              ▲       │
///    └──────────────────────────────┘       ▼
///                   in_progress ◄──── rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    #[default]
    Pending,
    InProgress,
    SubmittedForApproval,
    Approved,
    Rejected,
}

impl CompletionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::SubmittedForApproval => "submitted_for_approval",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved)
    }

    pub fn can_transition_to(&self, next: CompletionStatus) -> bool {
        use CompletionStatus::*;
        match (self, next) {
            (Approved, _) => false,
            (_, SubmittedForApproval) => true,
            (Pending | Rejected, InProgress) => true,
            (SubmittedForApproval, Approved | Rejected) => true,
            _ => false,
        }
    }
}

impl FromStr for CompletionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "submitted_for_approval" => Ok(Self::SubmittedForApproval),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(crate::unknown_value("status", other)),
        }
    }
}

/// One row per `(task, company)`; never deleted once written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyTaskProgress {
    pub task_id: Id,
    pub company_id: Id,
    pub status: CompletionStatus,
    pub progress_percentage: i32,
    pub completion_note: Option<String>,
    pub actual_hours: Option<f64>,
    pub completed_by: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approval_note: Option<String>,
    pub quality_score: Option<i16>,
    pub started_at: Option<DateTime<Utc>>,
    /// `None` for the implicit default that has not been persisted yet
    pub updated_at: Option<DateTime<Utc>>,
}

impl CompanyTaskProgress {
    /// Default progress for a company with access but no activity yet
    pub fn pending(task_id: Id, company_id: Id) -> Self {
        Self {
            task_id,
            company_id,
            status: CompletionStatus::Pending,
            progress_percentage: 0,
            completion_note: None,
            actual_hours: None,
            completed_by: None,
            completed_at: None,
            approved_by: None,
            approved_at: None,
            approval_note: None,
            quality_score: None,
            started_at: None,
            updated_at: None,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.updated_at.is_some()
    }

    pub fn is_approved(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Aggregated completion for a project or sub-project and one company.
/// Derived from task rows; a manual override pins it until the next
/// recompute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRollup {
    pub kind: EntityKind,
    pub entity_id: Id,
    pub company_id: Id,
    pub progress_percentage: i32,
    pub completed_tasks: i32,
    pub total_tasks: i32,
    pub last_updated: DateTime<Utc>,
    pub manual_override: bool,
    pub overridden_by: Option<String>,
}

impl ProgressRollup {
    pub fn computed(kind: EntityKind, entity_id: Id, company_id: Id, completed: i32, total: i32) -> Self {
        Self {
            kind,
            entity_id,
            company_id,
            progress_percentage: percentage(completed, total),
            completed_tasks: completed,
            total_tasks: total,
            last_updated: Utc::now(),
            manual_override: false,
            overridden_by: None,
        }
    }
}

/// `round(100 * completed / total)`, rounding halves up; `0` for no tasks
pub fn percentage(completed: i32, total: i32) -> i32 {
    if total <= 0 {
        return 0;
    }
    let completed = completed.clamp(0, total) as i64;
    let total = total as i64;
    ((200 * completed + total) / (2 * total)) as i32
}
