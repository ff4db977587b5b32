//! Dependency checks before hierarchy deletes
//!
//! A project, sub-project or task can be deleted only when nothing still
//! references it. That means no active assignment at its own level or on a
//! sub-project below it, and no task below it with a task-level assignment,
//! a completion record, a comment or an uploaded file.

use std::sync::Arc;

use cp_contracts::{Contract, DeleteContract, DeleteData};
use cp_core::error::{CoreError, CoreResult};
use cp_core::traits::Id;
use cp_core::types::{BlockKind, BlockReason, EntityKind, Principal};
use cp_db::Store;
use cp_models::{ActivityKind, Task};
use serde::Serialize;

use crate::saga::best_effort;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionReport {
    pub entity_type: EntityKind,
    pub entity_id: Id,
    pub allowed: bool,
    pub reasons: Vec<BlockReason>,
}

#[derive(Clone)]
pub struct DeletionGuard {
    store: Arc<dyn Store>,
}

impl DeletionGuard {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Report what blocks deleting the entity
    pub async fn can_delete(&self, principal: &Principal, kind: EntityKind, id: Id) -> CoreResult<DeletionReport> {
        DeleteContract::check(principal).validate(&DeleteData { kind, id })?;
        self.inspect(kind, id).await
    }

    /// Delete the entity and everything below it, unless blocked
    pub async fn delete(&self, principal: &Principal, kind: EntityKind, id: Id) -> CoreResult<DeletionReport> {
        DeleteContract::execute(principal).validate(&DeleteData { kind, id })?;

        let report = self.inspect(kind, id).await?;
        if !report.allowed {
            tracing::info!(kind = %kind, id, reasons = report.reasons.len(), "Delete blocked");
            return Err(CoreError::DependencyBlocked {
                entity: kind,
                id,
                reasons: report.reasons,
            });
        }

        let owning_project = match kind {
            EntityKind::SubProject => self.store.find_sub_project(id).await?.map(|s| s.project_id),
            _ => None,
        };
        self.store.delete_entity(kind, id).await?;
        if let Some(project_id) = owning_project {
            best_effort(
                "refresh sub-project count",
                self.store.refresh_sub_project_count(project_id),
            )
            .await;
        }

        tracing::info!(kind = %kind, id, actor = principal.actor(), "Hierarchy entity deleted");
        Ok(report)
    }

    async fn inspect(&self, kind: EntityKind, id: Id) -> CoreResult<DeletionReport> {
        let tasks = self.descendant_tasks(kind, id).await?;
        let task_ids: Vec<Id> = tasks.iter().map(|t| t.id).collect();
        let mut reasons = Vec::new();

        let own = self.store.active_assignments_for(kind, &[id]).await?;
        if !own.is_empty() {
            let companies = own.iter().map(|a| a.company_id).collect();
            reasons.push(BlockReason::new(BlockKind::ActiveAssignments, own.len(), companies));
        }

        if kind == EntityKind::Project {
            let sub_ids: Vec<Id> = self.store.sub_projects_of(id).await?.iter().map(|s| s.id).collect();
            if !sub_ids.is_empty() {
                let rows = self.store.active_assignments_for(EntityKind::SubProject, &sub_ids).await?;
                if !rows.is_empty() {
                    let companies = rows.iter().map(|a| a.company_id).collect();
                    reasons.push(BlockReason::new(BlockKind::SubProjectAssignments, rows.len(), companies));
                }
            }
        }

        if !task_ids.is_empty() {
            // A task's own assignments were counted above
            if kind != EntityKind::Task {
                let rows = self.store.active_assignments_for(EntityKind::Task, &task_ids).await?;
                if !rows.is_empty() {
                    let companies = rows.iter().map(|a| a.company_id).collect();
                    reasons.push(BlockReason::new(BlockKind::TaskAssignments, rows.len(), companies));
                }
            }

            let completions = self.store.progress_for_tasks(&task_ids).await?;
            if !completions.is_empty() {
                let companies = completions.iter().map(|p| p.company_id).collect();
                reasons.push(BlockReason::new(BlockKind::TaskCompletions, completions.len(), companies));
            }

            let activity = self.store.activity_for_tasks(&task_ids).await?;
            for (activity_kind, block) in [
                (ActivityKind::Comment, BlockKind::TaskComments),
                (ActivityKind::File, BlockKind::TaskFiles),
            ] {
                let companies: Vec<Id> = activity
                    .iter()
                    .filter(|a| a.kind == activity_kind)
                    .map(|a| a.company_id)
                    .collect();
                if !companies.is_empty() {
                    reasons.push(BlockReason::new(block, companies.len(), companies));
                }
            }
        }

        Ok(DeletionReport {
            entity_type: kind,
            entity_id: id,
            allowed: reasons.is_empty(),
            reasons,
        })
    }

    async fn descendant_tasks(&self, kind: EntityKind, id: Id) -> CoreResult<Vec<Task>> {
        let not_found = || CoreError::not_found(kind.label(), "id", id);
        match kind {
            EntityKind::Project => {
                self.store.find_project(id).await?.ok_or_else(not_found)?;
                Ok(self.store.tasks_of_project(id).await?)
            }
            EntityKind::SubProject => {
                self.store.find_sub_project(id).await?.ok_or_else(not_found)?;
                Ok(self.store.tasks_of_sub_project(id).await?)
            }
            EntityKind::Task => {
                let task = self.store.find_task(id).await?.ok_or_else(not_found)?;
                Ok(vec![task])
            }
        }
    }
}
