//! Project hierarchy: Project → SubProject → Task
//!
//! Tables: projects, sub_projects, tasks

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use cp_core::traits::Id;
use cp_core::types::{DateRange, EntityKind};
use cp_core::CoreError;
use serde::{Deserialize, Serialize};

/// Lifecycle status shared by projects and sub-projects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Planned,
    Active,
    Completed,
    Cancelled,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl FromStr for ProjectStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "planned" => Ok(Self::Planned),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(crate::unknown_value("status", other)),
        }
    }
}

/// Canonical task status. Only changes to `Completed` once a submission
/// has been approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    PendingApproval,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::PendingApproval => "pending_approval",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "in_progress" | "inprogress" => Ok(Self::InProgress),
            "pending_approval" | "pendingapproval" => Ok(Self::PendingApproval),
            "completed" => Ok(Self::Completed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(crate::unknown_value("status", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl FromStr for TaskPriority {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            other => Err(crate::unknown_value("priority", other)),
        }
    }
}

/// Top-level project
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Id,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub status: ProjectStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub progress: i32,
    /// Company that commissioned the project, notified on rejections
    pub owner_company_id: Option<Id>,
    /// Cached count of sub-projects, recomputed after deletes
    pub sub_project_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(id: Id, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            description: None,
            status: ProjectStatus::Planned,
            start_date: None,
            end_date: None,
            progress: 0,
            owner_company_id: None,
            sub_project_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn dates(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }
}

/// A phase of a project
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubProject {
    pub id: Id,
    pub project_id: Id,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub status: ProjectStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub progress: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubProject {
    pub fn new(id: Id, project_id: Id, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            project_id,
            name: name.into(),
            description: None,
            status: ProjectStatus::Planned,
            start_date: None,
            end_date: None,
            progress: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Unit of work. Lives under a sub-project, or directly under a project
/// for tasks created before sub-projects existed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Id,
    pub project_id: Id,
    pub sub_project_id: Option<Id>,
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub progress: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(id: Id, project_id: Id, sub_project_id: Option<Id>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            project_id,
            sub_project_id,
            title: title.into(),
            description: None,
            status: TaskStatus::Pending,
            priority: TaskPriority::Medium,
            start_date: None,
            due_date: None,
            progress: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attached directly to a project without a sub-project
    pub fn is_legacy(&self) -> bool {
        self.sub_project_id.is_none()
    }

    /// Nearest ancestor that carries assignments for this task
    pub fn parent(&self) -> (EntityKind, Id) {
        match self.sub_project_id {
            Some(sub_project_id) => (EntityKind::SubProject, sub_project_id),
            None => (EntityKind::Project, self.project_id),
        }
    }
}
