//! Which tasks a company may act on
//!
//! A company acts on a task through an active assignment on the task's
//! sub-project (or on its project for tasks without a sub-project), with a
//! task-level assignment as fallback.

use std::collections::HashSet;

use cp_core::error::CoreResult;
use cp_core::traits::Id;
use cp_core::types::EntityKind;
use cp_db::Store;
use cp_models::Task;

async fn holds_active(store: &dyn Store, kind: EntityKind, entity_id: Id, company_id: Id) -> CoreResult<bool> {
    Ok(store
        .find_assignment(kind, entity_id, company_id)
        .await?
        .map_or(false, |a| a.is_active()))
}

pub(crate) async fn can_act_on_task(store: &dyn Store, task: &Task, company_id: Id) -> CoreResult<bool> {
    let (kind, parent_id) = task.parent();
    if holds_active(store, kind, parent_id, company_id).await? {
        return Ok(true);
    }
    holds_active(store, EntityKind::Task, task.id, company_id).await
}

/// Snapshot of a company's active grants, for checking many tasks at once
#[derive(Debug, Default)]
pub(crate) struct AccessIndex {
    projects: HashSet<Id>,
    sub_projects: HashSet<Id>,
    tasks: HashSet<Id>,
}

impl AccessIndex {
    pub(crate) async fn load(store: &dyn Store, company_id: Id) -> CoreResult<Self> {
        let ids = |rows: Vec<cp_models::Assignment>| rows.into_iter().map(|a| a.entity_id).collect();
        Ok(Self {
            projects: ids(store.assignments_for_company(EntityKind::Project, company_id).await?),
            sub_projects: ids(store.assignments_for_company(EntityKind::SubProject, company_id).await?),
            tasks: ids(store.assignments_for_company(EntityKind::Task, company_id).await?),
        })
    }

    pub(crate) fn covers(&self, task: &Task) -> bool {
        let via_parent = match task.sub_project_id {
            Some(sub_project_id) => self.sub_projects.contains(&sub_project_id),
            None => self.projects.contains(&task.project_id),
        };
        via_parent || self.tasks.contains(&task.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_covers() {
        let index = AccessIndex {
            projects: HashSet::from([1]),
            sub_projects: HashSet::from([10]),
            tasks: HashSet::from([102]),
        };

        assert!(index.covers(&Task::new(100, 1, Some(10), "under assigned sub-project")));
        assert!(!index.covers(&Task::new(101, 1, Some(11), "project grant alone is not enough")));
        assert!(index.covers(&Task::new(102, 1, Some(11), "task-level fallback")));
        assert!(index.covers(&Task::new(103, 1, None, "legacy task")));
        assert!(!index.covers(&Task::new(104, 2, None, "other project")));
    }
}
