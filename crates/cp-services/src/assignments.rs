//! Company assignments at every hierarchy level

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use cp_contracts::{
    AssignCompaniesContract, AssignCompaniesData, Contract, SetAssignmentStatusContract,
    SetAssignmentStatusData,
};
use cp_core::error::{CoreError, CoreResult};
use cp_core::traits::Id;
use cp_core::types::{EntityKind, Principal};
use cp_db::Store;
use cp_models::{Assignment, NewAssignment};
use cp_notifications::{Notification, NotificationType, Notifier, Recipient};
use futures::future::join_all;
use serde::Serialize;

use crate::saga::best_effort;

/// A company that could not be assigned, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedAssignment {
    pub company_id: Id,
    pub reason: String,
}

/// Result of a bulk assignment call
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentOutcome {
    /// Rows created or reactivated by this call
    pub created: Vec<Assignment>,
    /// Companies that already held an active assignment
    pub already_assigned: Vec<Id>,
    /// Project assignments made on behalf of sub-project assignments
    pub auto_assigned_parents: Vec<Assignment>,
    pub failed: Vec<FailedAssignment>,
}

impl AssignmentOutcome {
    pub fn created_company_ids(&self) -> Vec<Id> {
        self.created.iter().map(|a| a.company_id).collect()
    }
}

#[derive(Clone)]
pub struct AssignmentService {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
}

impl AssignmentService {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Assign companies to a project, sub-project or task
    ///
    /// Duplicates are reported in `already_assigned` instead of failing.
    /// Inactive rows are reactivated. A sub-project assignment also makes
    /// sure the company holds an active assignment on the owning project.
    pub async fn assign(&self, principal: &Principal, data: AssignCompaniesData) -> CoreResult<AssignmentOutcome> {
        AssignCompaniesContract::new(principal).validate(&data)?;

        let parent_project = self.parent_project(data.kind, data.parent_id).await?;
        let company_ids = dedupe(&data.company_ids);
        self.ensure_companies_exist(&company_ids).await?;

        let existing: HashMap<Id, Assignment> = self
            .store
            .assignments_for(data.kind, data.parent_id)
            .await?
            .into_iter()
            .map(|a| (a.company_id, a))
            .collect();

        let mut outcome = AssignmentOutcome::default();
        let mut fresh = Vec::new();
        let mut reactivate = Vec::new();
        for company_id in company_ids {
            let row = NewAssignment::new(data.kind, data.parent_id, company_id, principal.actor());
            match existing.get(&company_id) {
                Some(assignment) if assignment.is_active() => outcome.already_assigned.push(company_id),
                Some(_) => reactivate.push(row),
                None => fresh.push(row),
            }
        }

        if !fresh.is_empty() {
            match self.store.insert_assignments(&fresh).await {
                Ok(created) => outcome.created.extend(created),
                Err(err) => {
                    tracing::warn!(
                        kind = %data.kind,
                        parent_id = data.parent_id,
                        rows = fresh.len(),
                        error = %err,
                        "Batch assignment insert failed, retrying row by row"
                    );
                    reactivate.extend(fresh);
                }
            }
        }
        for row in reactivate {
            match self.store.upsert_assignment(&row).await {
                Ok(assignment) => outcome.created.push(assignment),
                Err(err) => {
                    tracing::warn!(company_id = row.company_id, error = %err, "Assignment failed");
                    outcome.failed.push(FailedAssignment {
                        company_id: row.company_id,
                        reason: "could not be assigned".to_string(),
                    });
                }
            }
        }

        if let Some(project_id) = parent_project {
            for company_id in outcome.created_company_ids() {
                if let Some(parent) = self.cascade_to_project(project_id, company_id, principal).await {
                    outcome.auto_assigned_parents.push(parent);
                }
            }
        }

        let notifications = outcome.created.iter().map(|assignment| {
            let notification = Notification::new(
                Recipient::Company(assignment.company_id),
                NotificationType::CompanyAssigned,
                format!("Assigned to {}", assignment.kind.label()),
                format!("Your company was assigned to {} {}", assignment.kind.label(), assignment.entity_id),
            )
            .about(assignment.kind, assignment.entity_id);
            best_effort("notify assigned company", self.notifier.notify(notification))
        });
        join_all(notifications).await;

        tracing::info!(
            kind = %data.kind,
            parent_id = data.parent_id,
            created = outcome.created.len(),
            already_assigned = outcome.already_assigned.len(),
            failed = outcome.failed.len(),
            "Companies assigned"
        );
        Ok(outcome)
    }

    /// All assignments of an entity. Company users only see their own.
    pub async fn list(&self, principal: &Principal, kind: EntityKind, entity_id: Id) -> CoreResult<Vec<Assignment>> {
        self.parent_project(kind, entity_id).await?;
        let rows = self.store.assignments_for(kind, entity_id).await?;
        if principal.is_staff() {
            return Ok(rows);
        }
        Ok(rows
            .into_iter()
            .filter(|a| principal.company_id == Some(a.company_id))
            .collect())
    }

    /// Active assignments a company holds at one level
    pub async fn list_for_company(
        &self,
        principal: &Principal,
        company_id: Id,
        kind: EntityKind,
    ) -> CoreResult<Vec<Assignment>> {
        principal.require_company(company_id, "list assignments")?;
        Ok(self.store.assignments_for_company(kind, company_id).await?)
    }

    /// Activate or deactivate one of a company's assignments
    pub async fn set_status(
        &self,
        principal: &Principal,
        company_id: Id,
        data: SetAssignmentStatusData,
    ) -> CoreResult<Assignment> {
        SetAssignmentStatusContract::new(principal).validate(&data)?;

        let current = self
            .store
            .get_assignment(data.kind, data.assignment_id)
            .await?
            .filter(|a| a.company_id == company_id)
            .ok_or_else(|| CoreError::not_found("Assignment", "id", data.assignment_id))?;
        if current.status == data.status {
            return Ok(current);
        }

        let updated = self
            .store
            .set_assignment_status(data.kind, data.assignment_id, data.status, principal.actor())
            .await?;
        tracing::info!(
            kind = %data.kind,
            assignment_id = updated.id,
            company_id,
            status = updated.status.as_str(),
            "Assignment status changed"
        );
        Ok(updated)
    }

    /// Verify the parent exists. For a sub-project, returns its project.
    async fn parent_project(&self, kind: EntityKind, id: Id) -> CoreResult<Option<Id>> {
        let not_found = || CoreError::not_found(kind.label(), "id", id);
        match kind {
            EntityKind::Project => {
                self.store.find_project(id).await?.ok_or_else(not_found)?;
                Ok(None)
            }
            EntityKind::SubProject => {
                let sub_project = self.store.find_sub_project(id).await?.ok_or_else(not_found)?;
                Ok(Some(sub_project.project_id))
            }
            EntityKind::Task => {
                self.store.find_task(id).await?.ok_or_else(not_found)?;
                Ok(None)
            }
        }
    }

    async fn ensure_companies_exist(&self, company_ids: &[Id]) -> CoreResult<()> {
        let known: BTreeSet<Id> = self
            .store
            .existing_company_ids(company_ids)
            .await?
            .into_iter()
            .collect();
        let unknown: Vec<String> = company_ids
            .iter()
            .filter(|id| !known.contains(id))
            .map(|id| id.to_string())
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(CoreError::invalid(
                "companyIds",
                format!("references unknown companies: {}", unknown.join(", ")),
            ))
        }
    }

    async fn cascade_to_project(&self, project_id: Id, company_id: Id, principal: &Principal) -> Option<Assignment> {
        let current = best_effort(
            "look up project assignment",
            self.store.find_assignment(EntityKind::Project, project_id, company_id),
        )
        .await?;
        if current.map_or(false, |a| a.is_active()) {
            return None;
        }
        let row = NewAssignment::new(EntityKind::Project, project_id, company_id, principal.actor());
        best_effort("assign company to parent project", self.store.upsert_assignment(&row)).await
    }
}

fn dedupe(ids: &[Id]) -> Vec<Id> {
    let mut seen = BTreeSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}
