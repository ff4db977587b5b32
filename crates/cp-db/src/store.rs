//! Store traits
//!
//! One trait per persisted concern. Services depend on the combined
//! [`Store`] so the same code runs against [`crate::MemoryStore`] in tests
//! and [`crate::PgStore`] in production.

use async_trait::async_trait;
use cp_core::traits::Id;
use cp_core::types::{DateRange, EntityKind};
use cp_models::{
    ActivityRecord, Assignment, AssignmentStatus, CompanyTaskProgress, DateRangeRecord,
    NewAssignment, NewHistoryEntry, ProgressRollup, Project, SubProject, Task, TaskHistoryEntry,
    TaskStatus,
};

use crate::error::StoreResult;

#[async_trait]
pub trait HierarchyStore: Send + Sync {
    /// Subset of `ids` that reference existing companies
    async fn existing_company_ids(&self, ids: &[Id]) -> StoreResult<Vec<Id>>;

    async fn find_project(&self, id: Id) -> StoreResult<Option<Project>>;

    async fn find_sub_project(&self, id: Id) -> StoreResult<Option<SubProject>>;

    async fn find_task(&self, id: Id) -> StoreResult<Option<Task>>;

    /// Ordered by creation time, ties broken by id
    async fn sub_projects_of(&self, project_id: Id) -> StoreResult<Vec<SubProject>>;

    /// Ordered by creation time, ties broken by id
    async fn tasks_of_sub_project(&self, sub_project_id: Id) -> StoreResult<Vec<Task>>;

    /// Every task of the project, whether under a sub-project or attached
    /// directly
    async fn tasks_of_project(&self, project_id: Id) -> StoreResult<Vec<Task>>;

    async fn update_task_status(&self, task_id: Id, status: TaskStatus, progress: i32) -> StoreResult<()>;

    /// Remove the entity with all descendants and their per-company rows
    async fn delete_entity(&self, kind: EntityKind, id: Id) -> StoreResult<()>;

    /// Recount sub-projects and store the cached count on the project
    async fn refresh_sub_project_count(&self, project_id: Id) -> StoreResult<i32>;
}

#[async_trait]
pub trait AssignmentStore: Send + Sync {
    async fn find_assignment(&self, kind: EntityKind, entity_id: Id, company_id: Id) -> StoreResult<Option<Assignment>>;

    async fn get_assignment(&self, kind: EntityKind, id: Id) -> StoreResult<Option<Assignment>>;

    /// All assignments of an entity regardless of status
    async fn assignments_for(&self, kind: EntityKind, entity_id: Id) -> StoreResult<Vec<Assignment>>;

    /// Active assignments across a set of entities of one level
    async fn active_assignments_for(&self, kind: EntityKind, entity_ids: &[Id]) -> StoreResult<Vec<Assignment>>;

    /// Active assignments held by a company at one level
    async fn assignments_for_company(&self, kind: EntityKind, company_id: Id) -> StoreResult<Vec<Assignment>>;

    /// Insert all rows or none
    async fn insert_assignments(&self, rows: &[NewAssignment]) -> StoreResult<Vec<Assignment>>;

    /// Insert one row, or reactivate the existing row for the same
    /// `(entity, company)`
    async fn upsert_assignment(&self, row: &NewAssignment) -> StoreResult<Assignment>;

    async fn set_assignment_status(
        &self,
        kind: EntityKind,
        id: Id,
        status: AssignmentStatus,
        actor: &str,
    ) -> StoreResult<Assignment>;
}

#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn task_progress(&self, task_id: Id, company_id: Id) -> StoreResult<Option<CompanyTaskProgress>>;

    async fn progress_for_tasks(&self, task_ids: &[Id]) -> StoreResult<Vec<CompanyTaskProgress>>;

    /// Keyed on `(task_id, company_id)`; last writer wins
    async fn upsert_task_progress(&self, progress: &CompanyTaskProgress) -> StoreResult<CompanyTaskProgress>;

    async fn rollup(&self, kind: EntityKind, entity_id: Id, company_id: Id) -> StoreResult<Option<ProgressRollup>>;

    async fn upsert_rollup(&self, rollup: &ProgressRollup) -> StoreResult<ProgressRollup>;
}

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn date_range(&self, kind: EntityKind, entity_id: Id, company_id: Id) -> StoreResult<Option<DateRangeRecord>>;

    async fn upsert_date_range(
        &self,
        kind: EntityKind,
        entity_id: Id,
        company_id: Id,
        range: DateRange,
        actor: &str,
    ) -> StoreResult<DateRangeRecord>;
}

#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Comments and uploads attached to any of the tasks
    async fn activity_for_tasks(&self, task_ids: &[Id]) -> StoreResult<Vec<ActivityRecord>>;
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append_history(&self, entry: NewHistoryEntry) -> StoreResult<TaskHistoryEntry>;

    /// In insertion order
    async fn task_history(&self, task_id: Id) -> StoreResult<Vec<TaskHistoryEntry>>;
}

/// Every persisted concern behind one object
pub trait Store:
    HierarchyStore + AssignmentStore + ProgressStore + ScheduleStore + ActivityStore + HistoryStore
{
}

impl<T> Store for T where
    T: HierarchyStore + AssignmentStore + ProgressStore + ScheduleStore + ActivityStore + HistoryStore
{
}
