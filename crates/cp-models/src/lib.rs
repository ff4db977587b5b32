//! # cp-models
//!
//! Domain models for the consulting portal.
//!
//! Plain serde entities for companies, the project hierarchy, per-company
//! assignments, schedules, completion progress and the task audit trail.
//! Row mapping lives in `cp-db`.

pub use cp_core::traits::Id;

pub mod activity;
pub mod assignment;
pub mod company;
pub mod hierarchy;
pub mod history;
pub mod progress;
pub mod schedule;

pub use activity::{ActivityKind, ActivityRecord};
pub use assignment::{Assignment, AssignmentStatus, NewAssignment};
pub use company::{Company, CompanyStatus};
pub use hierarchy::{Project, ProjectStatus, SubProject, Task, TaskPriority, TaskStatus};
pub use history::{HistoryAction, NewHistoryEntry, TaskHistoryEntry};
pub use progress::{percentage, CompanyTaskProgress, CompletionStatus, ProgressRollup};
pub use schedule::DateRangeRecord;

/// Parse error shared by the status enums
pub(crate) fn unknown_value(field: &str, value: &str) -> cp_core::CoreError {
    cp_core::CoreError::invalid(field, format!("'{}' is not a recognised value", value))
}
