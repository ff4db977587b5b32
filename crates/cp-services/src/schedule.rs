//! Per-company date ranges distributed down the hierarchy
//!
//! Saving a project's range for a company splits it evenly across the
//! project's sub-projects, then splits each sub-project's stored range
//! across its tasks. Explicit overrides replace the split at their level
//! and apply unchanged to every child.

use std::sync::Arc;

use cp_contracts::{Contract, DistributeDatesContract, DistributeDatesData};
use cp_core::error::{CoreError, CoreResult};
use cp_core::traits::Id;
use cp_core::types::{DateRange, EntityKind, Principal};
use cp_db::Store;
use cp_models::{DateRangeRecord, SubProject};
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionOutcome {
    /// Human-readable summary, one line per level touched
    pub results: Vec<String>,
    pub sub_projects_updated: usize,
    pub tasks_updated: usize,
    /// Child writes that failed and were skipped
    pub failures: usize,
}

#[derive(Clone)]
pub struct DateDistributor {
    store: Arc<dyn Store>,
}

impl DateDistributor {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Save the project range for a company and distribute it downward
    ///
    /// The project range write is authoritative. Writes to children are
    /// attempted one by one and failures are logged and counted.
    pub async fn distribute(&self, principal: &Principal, data: DistributeDatesData) -> CoreResult<DistributionOutcome> {
        DistributeDatesContract::new(principal, data.company_id).validate(&data)?;

        let project = self
            .store
            .find_project(data.project_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Project", "id", data.project_id))?;
        let assigned = self
            .store
            .find_assignment(EntityKind::Project, project.id, data.company_id)
            .await?
            .map_or(false, |a| a.is_active());
        if !assigned {
            return Err(CoreError::not_found("ProjectAssignment", "companyId", data.company_id));
        }

        let actor = principal.actor();
        self.store
            .upsert_date_range(EntityKind::Project, project.id, data.company_id, data.main, actor)
            .await?;

        let mut outcome = DistributionOutcome::default();
        outcome
            .results
            .push(format!("Saved dates for project {} ({})", project.id, project.name));

        let sub_projects = self.store.sub_projects_of(project.id).await?;
        if sub_projects.is_empty() {
            return Ok(outcome);
        }

        self.distribute_to_sub_projects(&sub_projects, &data, actor, &mut outcome).await;
        self.distribute_to_tasks(&sub_projects, &data, actor, &mut outcome).await;

        tracing::info!(
            project_id = project.id,
            company_id = data.company_id,
            sub_projects = outcome.sub_projects_updated,
            tasks = outcome.tasks_updated,
            failures = outcome.failures,
            "Dates distributed"
        );
        Ok(outcome)
    }

    /// The stored range for an entity and company, if any
    pub async fn date_range(
        &self,
        principal: &Principal,
        kind: EntityKind,
        entity_id: Id,
        company_id: Id,
    ) -> CoreResult<Option<DateRangeRecord>> {
        principal.require_company(company_id, "read dates")?;
        Ok(self.store.date_range(kind, entity_id, company_id).await?)
    }

    async fn distribute_to_sub_projects(
        &self,
        sub_projects: &[SubProject],
        data: &DistributeDatesData,
        actor: &str,
        outcome: &mut DistributionOutcome,
    ) {
        let count = sub_projects.len();
        let ranges = match data.sub_project_override {
            Some(range) => vec![range; count],
            None => data.main.split_evenly(count),
        };
        if ranges.is_empty() {
            outcome
                .results
                .push("Sub-project dates unchanged: the project range needs a start and an end date".to_string());
            return;
        }

        for (sub_project, range) in sub_projects.iter().zip(ranges) {
            match self
                .store
                .upsert_date_range(EntityKind::SubProject, sub_project.id, data.company_id, range, actor)
                .await
            {
                Ok(_) => outcome.sub_projects_updated += 1,
                Err(err) => {
                    tracing::warn!(sub_project_id = sub_project.id, error = %err, "Sub-project date write failed");
                    outcome.failures += 1;
                }
            }
        }

        let mut line = format!("Updated dates for {} of {} sub-projects", outcome.sub_projects_updated, count);
        if data.sub_project_override.is_some() && count > 1 {
            line.push_str(&format!(" (the same override range was applied to all {})", count));
        }
        outcome.results.push(line);
        if let Some(range) = data.sub_project_override {
            outside_project_range(data, range, "sub-project", outcome);
        }
    }

    async fn distribute_to_tasks(
        &self,
        sub_projects: &[SubProject],
        data: &DistributeDatesData,
        actor: &str,
        outcome: &mut DistributionOutcome,
    ) {
        let mut parents = 0;
        for sub_project in sub_projects {
            let stored = match self
                .store
                .date_range(EntityKind::SubProject, sub_project.id, data.company_id)
                .await
            {
                Ok(Some(record)) => record.range(),
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(sub_project_id = sub_project.id, error = %err, "Sub-project date read failed");
                    outcome.failures += 1;
                    continue;
                }
            };
            let tasks = match self.store.tasks_of_sub_project(sub_project.id).await {
                Ok(tasks) if !tasks.is_empty() => tasks,
                Ok(_) => continue,
                Err(err) => {
                    tracing::warn!(sub_project_id = sub_project.id, error = %err, "Task lookup failed");
                    outcome.failures += 1;
                    continue;
                }
            };

            let ranges: Vec<DateRange> = match data.task_override {
                Some(range) => vec![range; tasks.len()],
                None => stored.split_evenly(tasks.len()),
            };
            if ranges.is_empty() {
                continue;
            }
            parents += 1;

            for (task, range) in tasks.iter().zip(ranges) {
                match self
                    .store
                    .upsert_date_range(EntityKind::Task, task.id, data.company_id, range, actor)
                    .await
                {
                    Ok(_) => outcome.tasks_updated += 1,
                    Err(err) => {
                        tracing::warn!(task_id = task.id, error = %err, "Task date write failed");
                        outcome.failures += 1;
                    }
                }
            }
        }

        if parents > 0 {
            outcome.results.push(format!(
                "Updated dates for {} tasks across {} sub-projects",
                outcome.tasks_updated, parents
            ));
            if let Some(range) = data.task_override {
                outside_project_range(data, range, "task", outcome);
            }
        }
    }
}

/// Overrides are written as given; one outside the project range is only
/// reported
fn outside_project_range(data: &DistributeDatesData, range: DateRange, level: &str, outcome: &mut DistributionOutcome) {
    if !data.main.contains(&range) {
        tracing::warn!(project_id = data.project_id, override_level = level, "Override range falls outside the project range");
        outcome
            .results
            .push(format!("Warning: the {} override range falls outside the project range", level));
    }
}
