//! Common types used throughout the portal

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::traits::Id;

// ============================================================================
// Principal
// ============================================================================

/// Role attached to a resolved principal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    MasterAdmin,
    Admin,
    Consultant,
    Company,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MasterAdmin => "master_admin",
            Self::Admin => "admin",
            Self::Consultant => "consultant",
            Self::Company => "company",
        }
    }

    /// Staff roles manage assignments, schedules, reviews and overrides
    pub fn is_staff(&self) -> bool {
        matches!(self, Self::MasterAdmin | Self::Admin | Self::Consultant)
    }

    /// Administrative roles may additionally delete hierarchy entities
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::MasterAdmin | Self::Admin)
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "master_admin" | "masteradmin" | "master-admin" => Ok(Self::MasterAdmin),
            "admin" => Ok(Self::Admin),
            "consultant" => Ok(Self::Consultant),
            "company" | "company_user" => Ok(Self::Company),
            other => Err(CoreError::unauthorized(format!("unknown role '{}'", other))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity resolved once at the request boundary and passed into every
/// core operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub email: String,
    pub role: Role,
    pub company_id: Option<Id>,
}

impl Principal {
    pub fn new(email: impl Into<String>, role: Role) -> Self {
        Self {
            email: email.into(),
            role,
            company_id: None,
        }
    }

    pub fn company(email: impl Into<String>, company_id: Id) -> Self {
        Self {
            email: email.into(),
            role: Role::Company,
            company_id: Some(company_id),
        }
    }

    pub fn with_company(mut self, company_id: Id) -> Self {
        self.company_id = Some(company_id);
        self
    }

    /// Identifier written into audit columns
    pub fn actor(&self) -> &str {
        &self.email
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Staff act for any company; company principals only for their own
    pub fn can_act_for(&self, company_id: Id) -> bool {
        self.is_staff() || self.company_id == Some(company_id)
    }

    pub fn require_staff(&self, action: &str) -> CoreResult<()> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(CoreError::forbidden(format!(
                "role '{}' may not {}",
                self.role, action
            )))
        }
    }

    pub fn require_admin(&self, action: &str) -> CoreResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(CoreError::forbidden(format!(
                "role '{}' may not {}",
                self.role, action
            )))
        }
    }

    pub fn require_company(&self, company_id: Id, action: &str) -> CoreResult<()> {
        if self.can_act_for(company_id) {
            Ok(())
        } else {
            Err(CoreError::forbidden(format!(
                "{} may not {} for company {}",
                self.email, action, company_id
            )))
        }
    }
}

// ============================================================================
// Hierarchy
// ============================================================================

/// Level of the project hierarchy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Project,
    SubProject,
    Task,
}

/// Per-level persisted facet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facet {
    Dates,
    Assignment,
    Progress,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [Self::Project, Self::SubProject, Self::Task];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::SubProject => "sub_project",
            Self::Task => "task",
        }
    }

    /// Entity name used in error messages
    pub fn label(&self) -> &'static str {
        match self {
            Self::Project => "Project",
            Self::SubProject => "SubProject",
            Self::Task => "Task",
        }
    }

    /// Table holding the given facet for this level
    pub fn table(&self, facet: Facet) -> &'static str {
        match (self, facet) {
            (Self::Project, Facet::Dates) => "project_date_ranges",
            (Self::Project, Facet::Assignment) => "project_assignments",
            (Self::Project, Facet::Progress) => "company_project_progress",
            (Self::SubProject, Facet::Dates) => "sub_project_date_ranges",
            (Self::SubProject, Facet::Assignment) => "sub_project_assignments",
            (Self::SubProject, Facet::Progress) => "company_sub_project_progress",
            (Self::Task, Facet::Dates) => "task_date_ranges",
            (Self::Task, Facet::Assignment) => "task_assignments",
            (Self::Task, Facet::Progress) => "company_task_progress",
        }
    }

    /// Entity table for this level
    pub fn entity_table(&self) -> &'static str {
        match self {
            Self::Project => "projects",
            Self::SubProject => "sub_projects",
            Self::Task => "tasks",
        }
    }

    /// Whether this level carries aggregated progress rollups
    pub fn has_rollup(&self) -> bool {
        !matches!(self, Self::Task)
    }
}

impl FromStr for EntityKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "project" | "projects" => Ok(Self::Project),
            "sub_project" | "sub-project" | "sub_projects" | "sub-projects" | "subproject" => {
                Ok(Self::SubProject)
            }
            "task" | "tasks" => Ok(Self::Task),
            other => Err(CoreError::invalid(
                "kind",
                format!("'{}' is not a hierarchy level", other),
            )),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Dates
// ============================================================================

/// Optional date range (start_date to end_date)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

const MILLIS_PER_DAY: i64 = 86_400_000;

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self {
            start_date: start,
            end_date: end,
        }
    }

    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self::new(Some(start), Some(end))
    }

    /// Both bounds, when both are set
    pub fn bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.bounds().is_some()
    }

    /// End before start
    pub fn is_inverted(&self) -> bool {
        matches!(self.bounds(), Some((start, end)) if end < start)
    }

    /// Whether `other` lies within this range. Open bounds on either side
    /// are treated as unconstrained.
    pub fn contains(&self, other: &DateRange) -> bool {
        let start_ok = match (self.start_date, other.start_date) {
            (Some(outer), Some(inner)) => inner >= outer,
            _ => true,
        };
        let end_ok = match (self.end_date, other.end_date) {
            (Some(outer), Some(inner)) => inner <= outer,
            _ => true,
        };
        start_ok && end_ok
    }

    /// Divide the range into `parts` equal consecutive slices.
    ///
    /// The duration is measured in milliseconds; slice `i` spans
    /// `[start + i*d/parts, start + (i+1)*d/parts)` with every boundary
    /// truncated to its calendar date, so the end of one slice is the start
    /// of the next. Returns an empty list for incomplete ranges or
    /// `parts == 0`.
    pub fn split_evenly(&self, parts: usize) -> Vec<DateRange> {
        let Some((start, end)) = self.bounds() else {
            return Vec::new();
        };
        if parts == 0 {
            return Vec::new();
        }

        let total_ms = (end - start).num_milliseconds();
        let n = parts as i64;
        let boundary = |i: i64| start + Duration::days((i * total_ms / n).div_euclid(MILLIS_PER_DAY));

        (0..n)
            .map(|i| DateRange::between(boundary(i), boundary(i + 1)))
            .collect()
    }
}

// ============================================================================
// Deletion guard
// ============================================================================

/// Category of activity that blocks a delete
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    ActiveAssignments,
    SubProjectAssignments,
    TaskAssignments,
    TaskCompletions,
    TaskComments,
    TaskFiles,
}

impl BlockKind {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::ActiveAssignments => "active company assignments",
            Self::SubProjectAssignments => "active sub-project assignments",
            Self::TaskAssignments => "active task-level assignments",
            Self::TaskCompletions => "task completion records",
            Self::TaskComments => "task comments",
            Self::TaskFiles => "uploaded task files",
        }
    }
}

/// One itemized reason a delete was refused
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BlockReason {
    pub kind: BlockKind,
    pub count: usize,
    pub company_ids: Vec<Id>,
    pub message: String,
}

impl BlockReason {
    /// Build a reason from the companies involved in each blocking record.
    /// Company ids are de-duplicated and sorted.
    pub fn new(kind: BlockKind, count: usize, mut company_ids: Vec<Id>) -> Self {
        company_ids.sort_unstable();
        company_ids.dedup();
        let message = format!(
            "{} {} ({} compan{})",
            count,
            kind.describe(),
            company_ids.len(),
            if company_ids.len() == 1 { "y" } else { "ies" }
        );
        Self {
            kind,
            count,
            company_ids,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("Master_Admin".parse::<Role>().unwrap(), Role::MasterAdmin);
        assert_eq!("company_user".parse::<Role>().unwrap(), Role::Company);
        assert!("guest".parse::<Role>().is_err());
    }

    #[test]
    fn test_principal_scope() {
        let consultant = Principal::new("c@firm.test", Role::Consultant);
        assert!(consultant.can_act_for(42));
        assert!(consultant.require_staff("review").is_ok());
        assert!(consultant.require_admin("delete").is_err());

        let company = Principal::company("ops@acme.test", 7);
        assert!(company.can_act_for(7));
        assert!(!company.can_act_for(8));
        assert!(company.require_staff("review").is_err());
    }

    #[test]
    fn test_entity_kind_tables() {
        assert_eq!(
            EntityKind::SubProject.table(Facet::Assignment),
            "sub_project_assignments"
        );
        assert_eq!(EntityKind::Task.table(Facet::Progress), "company_task_progress");
        assert_eq!("sub-projects".parse::<EntityKind>().unwrap(), EntityKind::SubProject);
        assert!("milestone".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_split_two_slices() {
        let range = DateRange::between(d("2024-01-01"), d("2024-01-11"));
        let slices = range.split_evenly(2);
        assert_eq!(
            slices,
            vec![
                DateRange::between(d("2024-01-01"), d("2024-01-06")),
                DateRange::between(d("2024-01-06"), d("2024-01-11")),
            ]
        );
    }

    #[test]
    fn test_split_truncates_to_dates() {
        let range = DateRange::between(d("2024-01-01"), d("2024-01-11"));
        let slices = range.split_evenly(3);
        assert_eq!(slices.len(), 3);
        assert_eq!(slices[0].end_date, Some(d("2024-01-04")));
        assert_eq!(slices[1].start_date, Some(d("2024-01-04")));
        assert_eq!(slices[1].end_date, Some(d("2024-01-07")));
        assert_eq!(slices[2].end_date, Some(d("2024-01-11")));
    }

    #[test]
    fn test_split_incomplete_or_zero() {
        let open = DateRange::new(Some(d("2024-01-01")), None);
        assert!(open.split_evenly(3).is_empty());

        let range = DateRange::between(d("2024-01-01"), d("2024-01-11"));
        assert!(range.split_evenly(0).is_empty());
    }

    #[test]
    fn test_contains() {
        let outer = DateRange::between(d("2024-01-01"), d("2024-03-01"));
        assert!(outer.contains(&DateRange::between(d("2024-01-10"), d("2024-02-01"))));
        assert!(!outer.contains(&DateRange::between(d("2023-12-31"), d("2024-02-01"))));
        assert!(outer.contains(&DateRange::new(None, Some(d("2024-02-01")))));
    }

    #[test]
    fn test_block_reason_dedups_companies() {
        let reason = BlockReason::new(BlockKind::TaskComments, 3, vec![9, 4, 9]);
        assert_eq!(reason.company_ids, vec![4, 9]);
        assert_eq!(reason.message, "3 task comments (2 companies)");
    }
}
