//! Company assignments at each hierarchy level
//!
//! Tables: project_assignments, sub_project_assignments, task_assignments

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cp_core::traits::Id;
use cp_core::types::EntityKind;
use cp_core::CoreError;
use serde::{Deserialize, Serialize};

/// Assignments are revoked by deactivation, never hard-deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    #[default]
    Active,
    Inactive,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl FromStr for AssignmentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(crate::unknown_value("status", other)),
        }
    }
}

/// Grant allowing a company to act on an entity and its descendants.
/// Unique on `(kind, entity_id, company_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: Id,
    pub kind: EntityKind,
    pub entity_id: Id,
    pub company_id: Id,
    pub status: AssignmentStatus,
    pub assigned_by: String,
    pub assigned_at: DateTime<Utc>,
    pub updated_by: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Assignment {
    pub fn is_active(&self) -> bool {
        self.status == AssignmentStatus::Active
    }
}

/// Insert payload for an assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAssignment {
    pub kind: EntityKind,
    pub entity_id: Id,
    pub company_id: Id,
    pub assigned_by: String,
}

impl NewAssignment {
    pub fn new(kind: EntityKind, entity_id: Id, company_id: Id, assigned_by: impl Into<String>) -> Self {
        Self {
            kind,
            entity_id,
            company_id,
            assigned_by: assigned_by.into(),
        }
    }
}
