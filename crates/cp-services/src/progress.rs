//! Per-company progress rollups for projects and sub-projects
//!
//! A rollup counts the tasks below an entity that the company may act on
//! and how many of those the company has had approved. Manual overrides pin
//! a value until the next approval or rejection recomputes it.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use cp_contracts::{Contract, ProgressOverrideContract, ProgressOverrideData, ProgressReadContract};
use cp_core::error::{CoreError, CoreResult};
use cp_core::traits::Id;
use cp_core::types::{EntityKind, Principal};
use cp_db::Store;
use cp_models::{ProgressRollup, Task};
use serde::Serialize;

use crate::access::AccessIndex;
use crate::saga::best_effort;

/// One company's rollup, or every assigned company's
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ProgressView {
    Single(ProgressRollup),
    PerCompany(Vec<ProgressRollup>),
}

#[derive(Clone)]
pub struct ProgressAggregator {
    store: Arc<dyn Store>,
}

impl ProgressAggregator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Recount and persist the rollup, clearing any manual override
    pub async fn recompute(
        &self,
        principal: &Principal,
        kind: EntityKind,
        entity_id: Id,
        company_id: Id,
    ) -> CoreResult<ProgressRollup> {
        ProgressReadContract::new(principal).validate(&Some(company_id))?;
        self.ensure_exists(kind, entity_id).await?;
        self.compute_and_store(kind, entity_id, company_id).await
    }

    /// Rollup for one company, or for every company assigned at this level
    ///
    /// A manual override is returned as stored. Anything else is
    /// recomputed on read.
    pub async fn read(
        &self,
        principal: &Principal,
        kind: EntityKind,
        entity_id: Id,
        company_id: Option<Id>,
    ) -> CoreResult<ProgressView> {
        ProgressReadContract::new(principal).validate(&company_id)?;
        self.ensure_exists(kind, entity_id).await?;

        if let Some(company_id) = company_id {
            return Ok(ProgressView::Single(self.current(kind, entity_id, company_id).await?));
        }

        let companies: BTreeSet<Id> = self
            .store
            .active_assignments_for(kind, &[entity_id])
            .await?
            .into_iter()
            .map(|a| a.company_id)
            .collect();
        let mut rollups = Vec::with_capacity(companies.len());
        for company_id in companies {
            rollups.push(self.current(kind, entity_id, company_id).await?);
        }
        Ok(ProgressView::PerCompany(rollups))
    }

    /// Pin a rollup to an explicit value
    pub async fn manual_override(
        &self,
        principal: &Principal,
        kind: EntityKind,
        entity_id: Id,
        company_id: Id,
        data: ProgressOverrideData,
    ) -> CoreResult<ProgressRollup> {
        ProgressOverrideContract::new(principal, kind).validate(&data)?;
        let parent_project = self.ensure_exists(kind, entity_id).await?;

        let (completed, total) = self.count(kind, entity_id, company_id).await?;
        let rollup = ProgressRollup {
            kind,
            entity_id,
            company_id,
            progress_percentage: data.progress_percentage,
            completed_tasks: data.completed_tasks.unwrap_or(completed),
            total_tasks: data.total_tasks.unwrap_or(total),
            last_updated: Utc::now(),
            manual_override: true,
            overridden_by: Some(principal.actor().to_string()),
        };
        let saved = self.store.upsert_rollup(&rollup).await?;

        tracing::info!(
            kind = %kind,
            entity_id,
            company_id,
            progress = saved.progress_percentage,
            actor = principal.actor(),
            "Progress manually overridden"
        );

        if let Some(project_id) = parent_project {
            self.refresh_unpinned(EntityKind::Project, project_id, company_id).await;
        }
        Ok(saved)
    }

    /// Refresh the sub-project and project rollups above a task
    pub(crate) async fn cascade_for_task(&self, task: &Task, company_id: Id) {
        if let Some(sub_project_id) = task.sub_project_id {
            best_effort(
                "recompute sub-project progress",
                self.compute_and_store(EntityKind::SubProject, sub_project_id, company_id),
            )
            .await;
        }
        best_effort(
            "recompute project progress",
            self.compute_and_store(EntityKind::Project, task.project_id, company_id),
        )
        .await;
    }

    async fn current(&self, kind: EntityKind, entity_id: Id, company_id: Id) -> CoreResult<ProgressRollup> {
        match self.store.rollup(kind, entity_id, company_id).await? {
            Some(stored) if stored.manual_override => Ok(stored),
            _ => self.compute_and_store(kind, entity_id, company_id).await,
        }
    }

    async fn refresh_unpinned(&self, kind: EntityKind, entity_id: Id, company_id: Id) {
        best_effort("refresh parent progress", self.current(kind, entity_id, company_id)).await;
    }

    async fn compute_and_store(&self, kind: EntityKind, entity_id: Id, company_id: Id) -> CoreResult<ProgressRollup> {
        let (completed, total) = self.count(kind, entity_id, company_id).await?;
        let rollup = ProgressRollup::computed(kind, entity_id, company_id, completed, total);
        tracing::debug!(
            kind = %kind,
            entity_id,
            company_id,
            completed,
            total,
            progress = rollup.progress_percentage,
            "Progress recomputed"
        );
        Ok(self.store.upsert_rollup(&rollup).await?)
    }

    /// `(approved, assigned)` task counts for the company below the entity
    async fn count(&self, kind: EntityKind, entity_id: Id, company_id: Id) -> CoreResult<(i32, i32)> {
        let tasks = match kind {
            EntityKind::Project => self.store.tasks_of_project(entity_id).await?,
            EntityKind::SubProject => self.store.tasks_of_sub_project(entity_id).await?,
            EntityKind::Task => {
                return Err(CoreError::invalid("kind", "progress rollups exist only for projects and sub-projects"))
            }
        };

        let access = AccessIndex::load(self.store.as_ref(), company_id).await?;
        let assigned: Vec<Id> = tasks.iter().filter(|t| access.covers(t)).map(|t| t.id).collect();
        if assigned.is_empty() {
            return Ok((0, 0));
        }

        let approved = self
            .store
            .progress_for_tasks(&assigned)
            .await?
            .iter()
            .filter(|p| p.company_id == company_id && p.is_approved())
            .count();
        Ok((approved as i32, assigned.len() as i32))
    }

    /// Returns the owning project of a sub-project
    async fn ensure_exists(&self, kind: EntityKind, entity_id: Id) -> CoreResult<Option<Id>> {
        let not_found = || CoreError::not_found(kind.label(), "id", entity_id);
        match kind {
            EntityKind::Project => {
                self.store.find_project(entity_id).await?.ok_or_else(not_found)?;
                Ok(None)
            }
            EntityKind::SubProject => {
                let sub_project = self.store.find_sub_project(entity_id).await?.ok_or_else(not_found)?;
                Ok(Some(sub_project.project_id))
            }
            EntityKind::Task => Err(CoreError::invalid(
                "kind",
                "progress rollups exist only for projects and sub-projects",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::World;
    use cp_db::ProgressStore;
    use cp_models::{CompanyTaskProgress, CompletionStatus};

    async fn approve_directly(world: &World, task_id: Id, company_id: Id) {
        let mut row = CompanyTaskProgress::pending(task_id, company_id);
        row.status = CompletionStatus::Approved;
        row.progress_percentage = 100;
        world.store.upsert_task_progress(&row).await.unwrap();
    }

    fn single(view: ProgressView) -> ProgressRollup {
        match view {
            ProgressView::Single(rollup) => rollup,
            other => panic!("expected one rollup, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_three_of_four_is_75() {
        let world = World::new().await;
        let sub_project = &world.sub_projects[0];
        world.assign(EntityKind::SubProject, sub_project.id, world.acme.id).await;
        for task in &world.tasks[..3] {
            approve_directly(&world, task.id, world.acme.id).await;
        }

        let rollup = world
            .portal
            .progress
            .recompute(&world.consultant, EntityKind::SubProject, sub_project.id, world.acme.id)
            .await
            .unwrap();
        assert_eq!((rollup.completed_tasks, rollup.total_tasks), (3, 4));
        assert_eq!(rollup.progress_percentage, 75);
        assert!(!rollup.manual_override);
    }

    #[tokio::test]
    async fn test_project_counts_only_reachable_tasks() {
        let world = World::new().await;
        // Cascades to the project, which also covers the legacy task
        world.assign(EntityKind::SubProject, world.sub_projects[0].id, world.acme.id).await;
        approve_directly(&world, world.tasks[0].id, world.acme.id).await;
        // Another company's approval does not count
        approve_directly(&world, world.tasks[1].id, world.globex.id).await;

        let rollup = single(
            world
                .portal
                .progress
                .read(&world.acme_user, EntityKind::Project, world.project.id, Some(world.acme.id))
                .await
                .unwrap(),
        );
        assert_eq!((rollup.completed_tasks, rollup.total_tasks), (1, 5));
        assert_eq!(rollup.progress_percentage, 20);
    }

    #[tokio::test]
    async fn test_no_tasks_is_zero() {
        let world = World::new().await;
        let rollup = world
            .portal
            .progress
            .recompute(&world.consultant, EntityKind::SubProject, world.sub_projects[1].id, world.acme.id)
            .await
            .unwrap();
        assert_eq!(rollup.progress_percentage, 0);
        assert_eq!(rollup.total_tasks, 0);
    }

    #[tokio::test]
    async fn test_override_is_pinned_until_recomputed() {
        let world = World::new().await;
        let sub_project = &world.sub_projects[0];
        world.assign(EntityKind::SubProject, sub_project.id, world.acme.id).await;

        let pinned = world
            .portal
            .progress
            .manual_override(
                &world.consultant,
                EntityKind::SubProject,
                sub_project.id,
                world.acme.id,
                ProgressOverrideData {
                    progress_percentage: 60,
                    completed_tasks: None,
                    total_tasks: None,
                },
            )
            .await
            .unwrap();
        assert!(pinned.manual_override);
        assert_eq!(pinned.total_tasks, 4);
        assert_eq!(pinned.overridden_by.as_deref(), Some("consultant@firm.test"));

        let read = single(
            world
                .portal
                .progress
                .read(&world.acme_user, EntityKind::SubProject, sub_project.id, Some(world.acme.id))
                .await
                .unwrap(),
        );
        assert_eq!(read.progress_percentage, 60);

        world.portal.progress.cascade_for_task(&world.tasks[0], world.acme.id).await;
        let stored = world
            .store
            .rollup(EntityKind::SubProject, sub_project.id, world.acme.id)
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.manual_override);
        assert_eq!(stored.progress_percentage, 0);
    }

    #[tokio::test]
    async fn test_list_for_all_assigned_companies() {
        let world = World::new().await;
        world.assign(EntityKind::Project, world.project.id, world.acme.id).await;
        world.assign(EntityKind::Project, world.project.id, world.globex.id).await;

        let view = world
            .portal
            .progress
            .read(&world.consultant, EntityKind::Project, world.project.id, None)
            .await
            .unwrap();
        match view {
            ProgressView::PerCompany(rollups) => {
                let companies: Vec<Id> = rollups.iter().map(|r| r.company_id).collect();
                assert_eq!(companies, vec![world.acme.id, world.globex.id]);
            }
            other => panic!("expected a list, got {other:?}"),
        }

        let err = world
            .portal
            .progress
            .read(&world.acme_user, EntityKind::Project, world.project.id, None)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "forbidden");
    }

    #[tokio::test]
    async fn test_tasks_have_no_rollup() {
        let world = World::new().await;
        let err = world
            .portal
            .progress
            .recompute(&world.consultant, EntityKind::Task, world.tasks[0].id, world.acme.id)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_input");
    }

    #[tokio::test]
    async fn test_company_cannot_override() {
        let world = World::new().await;
        let err = world
            .portal
            .progress
            .manual_override(
                &world.acme_user,
                EntityKind::Project,
                world.project.id,
                world.acme.id,
                ProgressOverrideData {
                    progress_percentage: 90,
                    completed_tasks: None,
                    total_tasks: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "forbidden");
    }
}
