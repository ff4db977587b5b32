//! In-memory store for development and tests

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use cp_core::traits::Id;
use cp_core::types::{DateRange, EntityKind};
use cp_models::{
    ActivityKind, ActivityRecord, Assignment, AssignmentStatus, Company, CompanyTaskProgress,
    DateRangeRecord, NewAssignment, NewHistoryEntry, ProgressRollup, Project, SubProject, Task,
    TaskHistoryEntry, TaskStatus,
};
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::store::{
    ActivityStore, AssignmentStore, HierarchyStore, HistoryStore, ProgressStore, ScheduleStore,
};

type CompanyKey = (EntityKind, Id, Id);

#[derive(Default)]
struct Tables {
    companies: BTreeMap<Id, Company>,
    projects: BTreeMap<Id, Project>,
    sub_projects: BTreeMap<Id, SubProject>,
    tasks: BTreeMap<Id, Task>,
    assignments: BTreeMap<(EntityKind, Id), Assignment>,
    task_progress: BTreeMap<(Id, Id), CompanyTaskProgress>,
    rollups: BTreeMap<CompanyKey, ProgressRollup>,
    date_ranges: BTreeMap<CompanyKey, DateRangeRecord>,
    activity: Vec<ActivityRecord>,
    history: Vec<TaskHistoryEntry>,
    /// Companies whose assignment inserts fail
    rejected_companies: BTreeSet<Id>,
}

impl Tables {
    fn assignment_for(&self, kind: EntityKind, entity_id: Id, company_id: Id) -> Option<&Assignment> {
        self.assignments
            .values()
            .find(|a| a.kind == kind && a.entity_id == entity_id && a.company_id == company_id)
    }

    fn ordered_sub_projects(&self, project_id: Id) -> Vec<SubProject> {
        let mut rows: Vec<SubProject> = self
            .sub_projects
            .values()
            .filter(|s| s.project_id == project_id)
            .cloned()
            .collect();
        rows.sort_by_key(|s| (s.created_at, s.id));
        rows
    }

    fn ordered_tasks<F>(&self, filter: F) -> Vec<Task>
    where
        F: Fn(&Task) -> bool,
    {
        let mut rows: Vec<Task> = self.tasks.values().filter(|t| filter(t)).cloned().collect();
        rows.sort_by_key(|t| (t.created_at, t.id));
        rows
    }

    fn remove_per_company_rows(&mut self, kind: EntityKind, ids: &BTreeSet<Id>) {
        self.assignments
            .retain(|_, a| !(a.kind == kind && ids.contains(&a.entity_id)));
        self.rollups
            .retain(|(k, entity_id, _), _| !(*k == kind && ids.contains(entity_id)));
        self.date_ranges
            .retain(|(k, entity_id, _), _| !(*k == kind && ids.contains(entity_id)));
    }

    fn remove_tasks(&mut self, task_ids: &BTreeSet<Id>) {
        self.tasks.retain(|id, _| !task_ids.contains(id));
        self.task_progress
            .retain(|(task_id, _), _| !task_ids.contains(task_id));
        self.activity.retain(|a| !task_ids.contains(&a.task_id));
        self.history.retain(|h| !task_ids.contains(&h.task_id));
        self.remove_per_company_rows(EntityKind::Task, task_ids);
    }
}

/// Store backed by ordered maps behind a tokio `RwLock`
pub struct MemoryStore {
    tables: RwLock<Tables>,
    next_id: AtomicI64,
    fail_batch_inserts: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            next_id: AtomicI64::new(1),
            fail_batch_inserts: AtomicBool::new(false),
        }
    }

    fn next_id(&self) -> Id {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    // ------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------

    pub async fn insert_company(&self, name: &str, email: &str) -> Company {
        let company = Company::new(self.next_id(), name, email);
        self.tables
            .write()
            .await
            .companies
            .insert(company.id, company.clone());
        company
    }

    pub async fn insert_project(&self, name: &str, owner_company_id: Option<Id>) -> Project {
        let mut project = Project::new(self.next_id(), name);
        project.owner_company_id = owner_company_id;
        self.tables
            .write()
            .await
            .projects
            .insert(project.id, project.clone());
        project
    }

    pub async fn insert_sub_project(&self, project_id: Id, name: &str) -> SubProject {
        let sub_project = SubProject::new(self.next_id(), project_id, name);
        let mut tables = self.tables.write().await;
        tables.sub_projects.insert(sub_project.id, sub_project.clone());
        if let Some(project) = tables.projects.get_mut(&project_id) {
            project.sub_project_count += 1;
        }
        sub_project
    }

    pub async fn insert_task(&self, project_id: Id, sub_project_id: Option<Id>, title: &str) -> Task {
        let task = Task::new(self.next_id(), project_id, sub_project_id, title);
        self.tables.write().await.tasks.insert(task.id, task.clone());
        task
    }

    pub async fn add_activity(&self, kind: ActivityKind, task_id: Id, company_id: Id) {
        self.tables.write().await.activity.push(ActivityRecord {
            kind,
            task_id,
            company_id,
        });
    }

    // ------------------------------------------------------------------
    // Failure injection
    // ------------------------------------------------------------------

    /// Make every batch assignment insert fail, forcing per-item fallback
    pub fn fail_batch_inserts(&self, fail: bool) {
        self.fail_batch_inserts.store(fail, Ordering::SeqCst);
    }

    /// Make every assignment insert for this company fail
    pub async fn reject_company(&self, company_id: Id) {
        self.tables.write().await.rejected_companies.insert(company_id);
    }
}

#[async_trait]
impl HierarchyStore for MemoryStore {
    async fn existing_company_ids(&self, ids: &[Id]) -> StoreResult<Vec<Id>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .copied()
            .filter(|id| tables.companies.contains_key(id))
            .collect())
    }

    async fn find_project(&self, id: Id) -> StoreResult<Option<Project>> {
        Ok(self.tables.read().await.projects.get(&id).cloned())
    }

    async fn find_sub_project(&self, id: Id) -> StoreResult<Option<SubProject>> {
        Ok(self.tables.read().await.sub_projects.get(&id).cloned())
    }

    async fn find_task(&self, id: Id) -> StoreResult<Option<Task>> {
        Ok(self.tables.read().await.tasks.get(&id).cloned())
    }

    async fn sub_projects_of(&self, project_id: Id) -> StoreResult<Vec<SubProject>> {
        Ok(self.tables.read().await.ordered_sub_projects(project_id))
    }

    async fn tasks_of_sub_project(&self, sub_project_id: Id) -> StoreResult<Vec<Task>> {
        let tables = self.tables.read().await;
        Ok(tables.ordered_tasks(|t| t.sub_project_id == Some(sub_project_id)))
    }

    async fn tasks_of_project(&self, project_id: Id) -> StoreResult<Vec<Task>> {
        let tables = self.tables.read().await;
        Ok(tables.ordered_tasks(|t| t.project_id == project_id))
    }

    async fn update_task_status(&self, task_id: Id, status: TaskStatus, progress: i32) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let task = tables
            .tasks
            .get_mut(&task_id)
            .ok_or_else(|| StoreError::not_found("Task", task_id))?;
        task.status = status;
        task.progress = progress;
        task.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_entity(&self, kind: EntityKind, id: Id) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        match kind {
            EntityKind::Project => {
                if tables.projects.remove(&id).is_none() {
                    return Err(StoreError::not_found("Project", id));
                }
                let sub_ids: BTreeSet<Id> = tables
                    .sub_projects
                    .values()
                    .filter(|s| s.project_id == id)
                    .map(|s| s.id)
                    .collect();
                let task_ids: BTreeSet<Id> = tables
                    .tasks
                    .values()
                    .filter(|t| t.project_id == id)
                    .map(|t| t.id)
                    .collect();
                tables.remove_tasks(&task_ids);
                tables.sub_projects.retain(|sid, _| !sub_ids.contains(sid));
                tables.remove_per_company_rows(EntityKind::SubProject, &sub_ids);
                tables.remove_per_company_rows(EntityKind::Project, &BTreeSet::from([id]));
            }
            EntityKind::SubProject => {
                if tables.sub_projects.remove(&id).is_none() {
                    return Err(StoreError::not_found("SubProject", id));
                }
                let task_ids: BTreeSet<Id> = tables
                    .tasks
                    .values()
                    .filter(|t| t.sub_project_id == Some(id))
                    .map(|t| t.id)
                    .collect();
                tables.remove_tasks(&task_ids);
                tables.remove_per_company_rows(EntityKind::SubProject, &BTreeSet::from([id]));
            }
            EntityKind::Task => {
                if !tables.tasks.contains_key(&id) {
                    return Err(StoreError::not_found("Task", id));
                }
                tables.remove_tasks(&BTreeSet::from([id]));
            }
        }
        Ok(())
    }

    async fn refresh_sub_project_count(&self, project_id: Id) -> StoreResult<i32> {
        let mut tables = self.tables.write().await;
        let count = tables
            .sub_projects
            .values()
            .filter(|s| s.project_id == project_id)
            .count() as i32;
        let project = tables
            .projects
            .get_mut(&project_id)
            .ok_or_else(|| StoreError::not_found("Project", project_id))?;
        project.sub_project_count = count;
        Ok(count)
    }
}

#[async_trait]
impl AssignmentStore for MemoryStore {
    async fn find_assignment(&self, kind: EntityKind, entity_id: Id, company_id: Id) -> StoreResult<Option<Assignment>> {
        let tables = self.tables.read().await;
        Ok(tables.assignment_for(kind, entity_id, company_id).cloned())
    }

    async fn get_assignment(&self, kind: EntityKind, id: Id) -> StoreResult<Option<Assignment>> {
        Ok(self.tables.read().await.assignments.get(&(kind, id)).cloned())
    }

    async fn assignments_for(&self, kind: EntityKind, entity_id: Id) -> StoreResult<Vec<Assignment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .assignments
            .values()
            .filter(|a| a.kind == kind && a.entity_id == entity_id)
            .cloned()
            .collect())
    }

    async fn active_assignments_for(&self, kind: EntityKind, entity_ids: &[Id]) -> StoreResult<Vec<Assignment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .assignments
            .values()
            .filter(|a| a.kind == kind && a.is_active() && entity_ids.contains(&a.entity_id))
            .cloned()
            .collect())
    }

    async fn assignments_for_company(&self, kind: EntityKind, company_id: Id) -> StoreResult<Vec<Assignment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .assignments
            .values()
            .filter(|a| a.kind == kind && a.company_id == company_id && a.is_active())
            .cloned()
            .collect())
    }

    async fn insert_assignments(&self, rows: &[NewAssignment]) -> StoreResult<Vec<Assignment>> {
        if self.fail_batch_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        let mut tables = self.tables.write().await;
        for row in rows {
            if tables.rejected_companies.contains(&row.company_id) {
                return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
            }
            if tables
                .assignment_for(row.kind, row.entity_id, row.company_id)
                .is_some()
            {
                return Err(StoreError::Conflict(format!(
                    "company {} is already assigned to {} {}",
                    row.company_id, row.kind, row.entity_id
                )));
            }
        }
        let now = Utc::now();
        let mut created = Vec::with_capacity(rows.len());
        for row in rows {
            let assignment = Assignment {
                id: self.next_id(),
                kind: row.kind,
                entity_id: row.entity_id,
                company_id: row.company_id,
                status: AssignmentStatus::Active,
                assigned_by: row.assigned_by.clone(),
                assigned_at: now,
                updated_by: None,
                updated_at: now,
            };
            tables
                .assignments
                .insert((assignment.kind, assignment.id), assignment.clone());
            created.push(assignment);
        }
        Ok(created)
    }

    async fn upsert_assignment(&self, row: &NewAssignment) -> StoreResult<Assignment> {
        let mut tables = self.tables.write().await;
        if tables.rejected_companies.contains(&row.company_id) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        let now = Utc::now();
        let existing = tables
            .assignment_for(row.kind, row.entity_id, row.company_id)
            .map(|a| (a.kind, a.id));
        if let Some(key) = existing {
            if let Some(assignment) = tables.assignments.get_mut(&key) {
                assignment.status = AssignmentStatus::Active;
                assignment.updated_by = Some(row.assigned_by.clone());
                assignment.updated_at = now;
                return Ok(assignment.clone());
            }
        }
        let assignment = Assignment {
            id: self.next_id(),
            kind: row.kind,
            entity_id: row.entity_id,
            company_id: row.company_id,
            status: AssignmentStatus::Active,
            assigned_by: row.assigned_by.clone(),
            assigned_at: now,
            updated_by: None,
            updated_at: now,
        };
        tables
            .assignments
            .insert((assignment.kind, assignment.id), assignment.clone());
        Ok(assignment)
    }

    async fn set_assignment_status(
        &self,
        kind: EntityKind,
        id: Id,
        status: AssignmentStatus,
        actor: &str,
    ) -> StoreResult<Assignment> {
        let mut tables = self.tables.write().await;
        let assignment = tables
            .assignments
            .get_mut(&(kind, id))
            .ok_or_else(|| StoreError::not_found("Assignment", id))?;
        assignment.status = status;
        assignment.updated_by = Some(actor.to_string());
        assignment.updated_at = Utc::now();
        Ok(assignment.clone())
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn task_progress(&self, task_id: Id, company_id: Id) -> StoreResult<Option<CompanyTaskProgress>> {
        Ok(self
            .tables
            .read()
            .await
            .task_progress
            .get(&(task_id, company_id))
            .cloned())
    }

    async fn progress_for_tasks(&self, task_ids: &[Id]) -> StoreResult<Vec<CompanyTaskProgress>> {
        let tables = self.tables.read().await;
        Ok(tables
            .task_progress
            .values()
            .filter(|p| task_ids.contains(&p.task_id))
            .cloned()
            .collect())
    }

    async fn upsert_task_progress(&self, progress: &CompanyTaskProgress) -> StoreResult<CompanyTaskProgress> {
        let mut stored = progress.clone();
        stored.updated_at = Some(Utc::now());
        self.tables
            .write()
            .await
            .task_progress
            .insert((stored.task_id, stored.company_id), stored.clone());
        Ok(stored)
    }

    async fn rollup(&self, kind: EntityKind, entity_id: Id, company_id: Id) -> StoreResult<Option<ProgressRollup>> {
        Ok(self
            .tables
            .read()
            .await
            .rollups
            .get(&(kind, entity_id, company_id))
            .cloned())
    }

    async fn upsert_rollup(&self, rollup: &ProgressRollup) -> StoreResult<ProgressRollup> {
        self.tables.write().await.rollups.insert(
            (rollup.kind, rollup.entity_id, rollup.company_id),
            rollup.clone(),
        );
        Ok(rollup.clone())
    }
}

#[async_trait]
impl ScheduleStore for MemoryStore {
    async fn date_range(&self, kind: EntityKind, entity_id: Id, company_id: Id) -> StoreResult<Option<DateRangeRecord>> {
        Ok(self
            .tables
            .read()
            .await
            .date_ranges
            .get(&(kind, entity_id, company_id))
            .cloned())
    }

    async fn upsert_date_range(
        &self,
        kind: EntityKind,
        entity_id: Id,
        company_id: Id,
        range: DateRange,
        actor: &str,
    ) -> StoreResult<DateRangeRecord> {
        let record = DateRangeRecord {
            kind,
            entity_id,
            company_id,
            start_date: range.start_date,
            end_date: range.end_date,
            updated_by: actor.to_string(),
            updated_at: Utc::now(),
        };
        self.tables
            .write()
            .await
            .date_ranges
            .insert((kind, entity_id, company_id), record.clone());
        Ok(record)
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn activity_for_tasks(&self, task_ids: &[Id]) -> StoreResult<Vec<ActivityRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .activity
            .iter()
            .filter(|a| task_ids.contains(&a.task_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn append_history(&self, entry: NewHistoryEntry) -> StoreResult<TaskHistoryEntry> {
        let record = TaskHistoryEntry {
            id: self.next_id(),
            task_id: entry.task_id,
            company_id: entry.company_id,
            action: entry.action,
            old_value: entry.old_value,
            new_value: entry.new_value,
            actor: entry.actor,
            notes: entry.notes,
            created_at: Utc::now(),
        };
        self.tables.write().await.history.push(record.clone());
        Ok(record)
    }

    async fn task_history(&self, task_id: Id) -> StoreResult<Vec<TaskHistoryEntry>> {
        let tables = self.tables.read().await;
        Ok(tables
            .history
            .iter()
            .filter(|h| h.task_id == task_id)
            .cloned()
            .collect())
    }
}
