//! Row structs and their conversion into domain models

use chrono::{DateTime, NaiveDate, Utc};
use cp_core::types::EntityKind;
use cp_models::{
    ActivityKind, ActivityRecord, Assignment, CompanyTaskProgress, DateRangeRecord,
    ProgressRollup, Project, SubProject, Task, TaskHistoryEntry,
};
use sqlx::FromRow;

use crate::error::{decode, StoreResult};

pub(crate) const PROJECT_COLUMNS: &str = "id, name, description, status, start_date, end_date, \
     progress, owner_company_id, sub_project_count, created_at, updated_at";

pub(crate) const SUB_PROJECT_COLUMNS: &str = "id, project_id, name, description, status, \
     start_date, end_date, progress, created_at, updated_at";

pub(crate) const TASK_COLUMNS: &str = "id, project_id, sub_project_id, title, description, \
     status, priority, start_date, due_date, progress, created_at, updated_at";

pub(crate) const PROGRESS_COLUMNS: &str = "task_id, company_id, status, progress_percentage, \
     completion_note, actual_hours, completed_by, completed_at, approved_by, approved_at, \
     approval_note, quality_score, started_at, updated_at";

#[derive(Debug, Clone, FromRow)]
pub struct ProjectRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub progress: i32,
    pub owner_company_id: Option<i64>,
    pub sub_project_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectRow {
    pub fn into_model(self) -> StoreResult<Project> {
        Ok(Project {
            id: self.id,
            name: self.name,
            description: self.description,
            status: decode("projects.status", &self.status)?,
            start_date: self.start_date,
            end_date: self.end_date,
            progress: self.progress,
            owner_company_id: self.owner_company_id,
            sub_project_count: self.sub_project_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SubProjectRow {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub progress: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubProjectRow {
    pub fn into_model(self) -> StoreResult<SubProject> {
        Ok(SubProject {
            id: self.id,
            project_id: self.project_id,
            name: self.name,
            description: self.description,
            status: decode("sub_projects.status", &self.status)?,
            start_date: self.start_date,
            end_date: self.end_date,
            progress: self.progress,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TaskRow {
    pub id: i64,
    pub project_id: i64,
    pub sub_project_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: String,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub progress: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRow {
    pub fn into_model(self) -> StoreResult<Task> {
        Ok(Task {
            id: self.id,
            project_id: self.project_id,
            sub_project_id: self.sub_project_id,
            title: self.title,
            description: self.description,
            status: decode("tasks.status", &self.status)?,
            priority: decode("tasks.priority", &self.priority)?,
            start_date: self.start_date,
            due_date: self.due_date,
            progress: self.progress,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Shared by the three assignment tables; the parent column is aliased
/// to `entity_id` in every query.
#[derive(Debug, Clone, FromRow)]
pub struct AssignmentRow {
    pub id: i64,
    pub entity_id: i64,
    pub company_id: i64,
    pub status: String,
    pub assigned_by: String,
    pub assigned_at: DateTime<Utc>,
    pub updated_by: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl AssignmentRow {
    pub fn into_model(self, kind: EntityKind) -> StoreResult<Assignment> {
        Ok(Assignment {
            id: self.id,
            kind,
            entity_id: self.entity_id,
            company_id: self.company_id,
            status: decode("assignments.status", &self.status)?,
            assigned_by: self.assigned_by,
            assigned_at: self.assigned_at,
            updated_by: self.updated_by,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TaskProgressRow {
    pub task_id: i64,
    pub company_id: i64,
    pub status: String,
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
    pub updated_at: DateTime<Utc>,
}

impl TaskProgressRow {
    pub fn into_model(self) -> StoreResult<CompanyTaskProgress> {
        Ok(CompanyTaskProgress {
            task_id: self.task_id,
            company_id: self.company_id,
            status: decode("company_task_progress.status", &self.status)?,
            progress_percentage: self.progress_percentage,
            completion_note: self.completion_note,
            actual_hours: self.actual_hours,
            completed_by: self.completed_by,
            completed_at: self.completed_at,
            approved_by: self.approved_by,
            approved_at: self.approved_at,
            approval_note: self.approval_note,
            quality_score: self.quality_score,
            started_at: self.started_at,
            updated_at: Some(self.updated_at),
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct RollupRow {
    pub entity_id: i64,
    pub company_id: i64,
    pub progress_percentage: i32,
    pub completed_tasks: i32,
    pub total_tasks: i32,
    pub manual_override: bool,
    pub overridden_by: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl RollupRow {
    pub fn into_model(self, kind: EntityKind) -> ProgressRollup {
        ProgressRollup {
            kind,
            entity_id: self.entity_id,
            company_id: self.company_id,
            progress_percentage: self.progress_percentage,
            completed_tasks: self.completed_tasks,
            total_tasks: self.total_tasks,
            last_updated: self.last_updated,
            manual_override: self.manual_override,
            overridden_by: self.overridden_by,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DateRangeRow {
    pub entity_id: i64,
    pub company_id: i64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

impl DateRangeRow {
    pub fn into_model(self, kind: EntityKind) -> DateRangeRecord {
        DateRangeRecord {
            kind,
            entity_id: self.entity_id,
            company_id: self.company_id,
            start_date: self.start_date,
            end_date: self.end_date,
            updated_by: self.updated_by,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct HistoryRow {
    pub id: i64,
    pub task_id: i64,
    pub company_id: Option<i64>,
    pub action: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub actor: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl HistoryRow {
    pub fn into_model(self) -> StoreResult<TaskHistoryEntry> {
        Ok(TaskHistoryEntry {
            id: self.id,
            task_id: self.task_id,
            company_id: self.company_id,
            action: decode("task_history.action", &self.action)?,
            old_value: self.old_value,
            new_value: self.new_value,
            actor: self.actor,
            notes: self.notes,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ActivityRow {
    pub kind: String,
    pub task_id: i64,
    pub company_id: i64,
}

impl ActivityRow {
    pub fn into_model(self) -> ActivityRecord {
        let kind = match self.kind.as_str() {
            "file" => ActivityKind::File,
            _ => ActivityKind::Comment,
        };
        ActivityRecord {
            kind,
            task_id: self.task_id,
            company_id: self.company_id,
        }
    }
}

/// Convert a batch of rows, failing on the first undecodable one
pub(crate) fn collect<R, T>(rows: Vec<R>, convert: impl Fn(R) -> StoreResult<T>) -> StoreResult<Vec<T>> {
    rows.into_iter().map(convert).collect()
}
