//! Per-company task completion and review
//!
//! Each `(task, company)` pair moves through
//! `pending -> in_progress -> submitted_for_approval -> approved | rejected`.
//! A rejected pair can be restarted or resubmitted. An approved pair is
//! final. The task row itself follows the latest review.

use std::sync::Arc;

use chrono::Utc;
use cp_contracts::{
    CompanyActionContract, Contract, ReviewApprovalData, ReviewContract, ReviewRejectionData,
    StartTaskData, SubmitCompletionData,
};
use cp_core::error::{CoreError, CoreResult};
use cp_core::traits::Id;
use cp_core::types::{EntityKind, Principal};
use cp_db::Store;
use cp_models::{
    CompanyTaskProgress, CompletionStatus, HistoryAction, NewHistoryEntry, Task, TaskHistoryEntry,
    TaskStatus,
};
use cp_notifications::{Notification, NotificationType, Notifier, Recipient};
use serde_json::json;

use crate::access::can_act_on_task;
use crate::progress::ProgressAggregator;
use crate::saga::best_effort;

/// Progress a rejected task falls back to, at least
const REJECTION_FLOOR: i32 = 50;

#[derive(Clone)]
pub struct CompletionService {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    progress: ProgressAggregator,
}

impl CompletionService {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>, progress: ProgressAggregator) -> Self {
        Self {
            store,
            notifier,
            progress,
        }
    }

    /// Move the company's record to `in_progress`
    ///
    /// Starting twice is a no-op. The task leaves `pending` the first time
    /// any company starts it.
    pub async fn start(&self, principal: &Principal, data: StartTaskData) -> CoreResult<CompanyTaskProgress> {
        CompanyActionContract::start(principal, data.company_id).validate(&data)?;
        let task = self.task(data.task_id).await?;
        self.ensure_access(&task, data.company_id).await?;

        let current = self.record_or_pending(task.id, data.company_id).await?;
        if current.status == CompletionStatus::InProgress && current.is_persisted() {
            return Ok(current);
        }
        if !current.status.can_transition_to(CompletionStatus::InProgress) {
            return Err(CoreError::conflict(format!(
                "task {} cannot be started while {}",
                task.id,
                current.status.as_str()
            )));
        }

        let mut next = current.clone();
        next.status = CompletionStatus::InProgress;
        next.started_at.get_or_insert_with(Utc::now);
        let saved = self.store.upsert_task_progress(&next).await?;

        if task.status == TaskStatus::Pending {
            best_effort(
                "mark task in progress",
                self.store.update_task_status(task.id, TaskStatus::InProgress, task.progress),
            )
            .await;
        }
        self.record_history(&task, data.company_id, HistoryAction::Started, current.status, principal, None)
            .await;

        tracing::info!(task_id = task.id, company_id = data.company_id, "Task started");
        Ok(saved)
    }

    /// Submit the company's work for review
    pub async fn submit(&self, principal: &Principal, data: SubmitCompletionData) -> CoreResult<CompanyTaskProgress> {
        CompanyActionContract::submit(principal, data.company_id).validate(&data)?;
        let task = self.task(data.task_id).await?;
        self.ensure_access(&task, data.company_id).await?;

        let current = self.record_or_pending(task.id, data.company_id).await?;
        if !current.status.can_transition_to(CompletionStatus::SubmittedForApproval) {
            return Err(CoreError::conflict(format!(
                "task {} is already approved for company {}",
                task.id, data.company_id
            )));
        }

        let mut next = current.clone();
        next.status = CompletionStatus::SubmittedForApproval;
        next.completion_note = Some(data.completion_note.clone());
        next.actual_hours = data.actual_hours;
        next.completed_by = Some(principal.actor().to_string());
        next.completed_at = Some(Utc::now());
        let saved = self.store.upsert_task_progress(&next).await?;

        self.record_history(
            &task,
            data.company_id,
            HistoryAction::Submitted,
            current.status,
            principal,
            Some(data.completion_note),
        )
        .await;
        let notification = Notification::new(
            Recipient::Reviewers,
            NotificationType::TaskSubmitted,
            "Task submitted for approval",
            format!("{} submitted \"{}\" for review", principal.actor(), task.title),
        )
        .about(EntityKind::Task, task.id)
        .with_metadata(json!({ "companyId": data.company_id }));
        best_effort("notify reviewers", self.notifier.notify(notification)).await;

        tracing::info!(task_id = task.id, company_id = data.company_id, "Task submitted for approval");
        Ok(saved)
    }

    /// Approve a submission. Final for the `(task, company)` pair.
    pub async fn approve(&self, principal: &Principal, data: ReviewApprovalData) -> CoreResult<CompanyTaskProgress> {
        ReviewContract::new(principal).validate(&data)?;
        let task = self.task(data.task_id).await?;
        let current = self.submission(task.id, data.company_id).await?;
        let company_id = current.company_id;

        let mut next = current.clone();
        next.status = CompletionStatus::Approved;
        next.progress_percentage = 100;
        next.approved_by = Some(principal.actor().to_string());
        next.approved_at = Some(Utc::now());
        next.approval_note = data.approval_note.clone();
        next.quality_score = data.quality_score;
        let saved = self.store.upsert_task_progress(&next).await?;

        best_effort(
            "mark task completed",
            self.store.update_task_status(task.id, TaskStatus::Completed, 100),
        )
        .await;
        self.record_history(
            &task,
            company_id,
            HistoryAction::Approved,
            current.status,
            principal,
            data.approval_note,
        )
        .await;
        let notification = Notification::new(
            Recipient::Company(company_id),
            NotificationType::TaskApproved,
            "Task approved",
            format!("\"{}\" was approved", task.title),
        )
        .about(EntityKind::Task, task.id)
        .with_metadata(json!({ "qualityScore": data.quality_score }));
        best_effort("notify company of approval", self.notifier.notify(notification)).await;
        self.progress.cascade_for_task(&task, company_id).await;

        tracing::info!(task_id = task.id, company_id, reviewer = principal.actor(), "Submission approved");
        Ok(saved)
    }

    /// Send a submission back to the company
    pub async fn reject(&self, principal: &Principal, data: ReviewRejectionData) -> CoreResult<CompanyTaskProgress> {
        ReviewContract::new(principal).validate(&data)?;
        let task = self.task(data.task_id).await?;
        let current = self.submission(task.id, data.company_id).await?;
        let company_id = current.company_id;

        let mut next = current.clone();
        next.status = CompletionStatus::Rejected;
        next.progress_percentage = next.progress_percentage.max(REJECTION_FLOOR);
        next.approval_note = Some(data.rejection_reason.clone());
        next.approved_by = None;
        next.approved_at = None;
        let saved = self.store.upsert_task_progress(&next).await?;

        best_effort(
            "reopen task",
            self.store
                .update_task_status(task.id, TaskStatus::InProgress, task.progress.max(REJECTION_FLOOR)),
        )
        .await;
        let notes = match &data.required_actions {
            Some(actions) => format!("{}\nRequired actions: {}", data.rejection_reason, actions),
            None => data.rejection_reason.clone(),
        };
        self.record_history(&task, company_id, HistoryAction::Rejected, current.status, principal, Some(notes))
            .await;

        let mut recipients = vec![company_id];
        if let Some(Some(project)) = best_effort("load project", self.store.find_project(task.project_id)).await {
            if let Some(owner) = project.owner_company_id.filter(|owner| *owner != company_id) {
                recipients.push(owner);
            }
        }
        for recipient in recipients {
            let notification = Notification::new(
                Recipient::Company(recipient),
                NotificationType::TaskRejected,
                "Task rejected",
                format!("\"{}\" needs revision: {}", task.title, data.rejection_reason),
            )
            .about(EntityKind::Task, task.id)
            .with_metadata(json!({
                "companyId": company_id,
                "requiredActions": data.required_actions,
            }));
            best_effort("notify rejection", self.notifier.notify(notification)).await;
        }
        self.progress.cascade_for_task(&task, company_id).await;

        tracing::info!(task_id = task.id, company_id, reviewer = principal.actor(), "Submission rejected");
        Ok(saved)
    }

    /// The company's record for a task, or a pending one if none is stored
    pub async fn progress(&self, principal: &Principal, task_id: Id, company_id: Id) -> CoreResult<CompanyTaskProgress> {
        principal.require_company(company_id, "read task progress")?;
        let task = self.task(task_id).await?;
        if let Some(stored) = self.store.task_progress(task.id, company_id).await? {
            return Ok(stored);
        }
        self.ensure_access(&task, company_id).await?;
        Ok(CompanyTaskProgress::pending(task.id, company_id))
    }

    /// Audit trail of a task. Company users see their own entries only.
    pub async fn history(&self, principal: &Principal, task_id: Id) -> CoreResult<Vec<TaskHistoryEntry>> {
        let task = self.task(task_id).await?;
        let entries = self.store.task_history(task.id).await?;
        if principal.is_staff() {
            return Ok(entries);
        }
        Ok(entries
            .into_iter()
            .filter(|e| e.company_id.is_some() && e.company_id == principal.company_id)
            .collect())
    }

    async fn task(&self, task_id: Id) -> CoreResult<Task> {
        self.store
            .find_task(task_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Task", "id", task_id))
    }

    async fn ensure_access(&self, task: &Task, company_id: Id) -> CoreResult<()> {
        if can_act_on_task(self.store.as_ref(), task, company_id).await? {
            Ok(())
        } else {
            Err(CoreError::not_found("Assignment", "companyId", company_id))
        }
    }

    async fn record_or_pending(&self, task_id: Id, company_id: Id) -> CoreResult<CompanyTaskProgress> {
        Ok(self
            .store
            .task_progress(task_id, company_id)
            .await?
            .unwrap_or_else(|| CompanyTaskProgress::pending(task_id, company_id)))
    }

    /// The submission a review applies to
    ///
    /// Without a company id the task must have exactly one open submission.
    async fn submission(&self, task_id: Id, company_id: Option<Id>) -> CoreResult<CompanyTaskProgress> {
        let submitted = |p: &CompanyTaskProgress| p.status == CompletionStatus::SubmittedForApproval;

        if let Some(company_id) = company_id {
            let record = self
                .store
                .task_progress(task_id, company_id)
                .await?
                .ok_or_else(|| CoreError::not_found("CompanyTaskProgress", "companyId", company_id))?;
            if record.is_approved() {
                return Err(CoreError::conflict(format!(
                    "task {} is already approved for company {}",
                    task_id, company_id
                )));
            }
            if !submitted(&record) {
                return Err(CoreError::not_found("Submission", "companyId", company_id));
            }
            return Ok(record);
        }

        let records = self.store.progress_for_tasks(&[task_id]).await?;
        let mut open: Vec<CompanyTaskProgress> = records.iter().filter(|p| submitted(*p)).cloned().collect();
        match open.len() {
            1 => Ok(open.remove(0)),
            0 if records.iter().any(|p| p.is_approved()) => Err(CoreError::conflict(format!(
                "task {} has no open submission; it is already approved",
                task_id
            ))),
            0 => Err(CoreError::not_found("Submission", "taskId", task_id)),
            _ => Err(CoreError::invalid(
                "companyId",
                "several companies submitted this task; specify which one to review",
            )),
        }
    }

    async fn record_history(
        &self,
        task: &Task,
        company_id: Id,
        action: HistoryAction,
        from: CompletionStatus,
        principal: &Principal,
        notes: Option<String>,
    ) {
        let to = match action {
            HistoryAction::Started => CompletionStatus::InProgress,
            HistoryAction::Submitted => CompletionStatus::SubmittedForApproval,
            HistoryAction::Approved => CompletionStatus::Approved,
            HistoryAction::Rejected => CompletionStatus::Rejected,
        };
        let entry = NewHistoryEntry {
            task_id: task.id,
            company_id: Some(company_id),
            action,
            old_value: Some(from.as_str().to_string()),
            new_value: Some(to.as_str().to_string()),
            actor: principal.actor().to_string(),
            notes,
        };
        best_effort("append task history", self.store.append_history(entry)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::World;
    use async_trait::async_trait;
    use cp_db::{HierarchyStore, ProgressStore};
    use cp_notifications::NotifyResult;
    use mockall::mock;

    mock! {
        pub Sink {}

        #[async_trait]
        impl Notifier for Sink {
            async fn notify(&self, notification: Notification) -> NotifyResult<()>;
        }
    }

    fn submit_data(task_id: Id, company_id: Id) -> SubmitCompletionData {
        SubmitCompletionData {
            task_id,
            company_id,
            completion_note: "Interviews done, notes uploaded".to_string(),
            actual_hours: Some(6.5),
        }
    }

    fn approval(task_id: Id, company_id: Option<Id>) -> ReviewApprovalData {
        ReviewApprovalData {
            task_id,
            company_id,
            approval_note: Some("Thorough".to_string()),
            quality_score: Some(5),
        }
    }

    fn rejection(task_id: Id, company_id: Option<Id>) -> ReviewRejectionData {
        ReviewRejectionData {
            task_id,
            company_id,
            rejection_reason: "Missing the finance team".to_string(),
            required_actions: Some("Interview finance".to_string()),
        }
    }

    /// Acme assigned to the first sub-project
    async fn assigned_world() -> World {
        let world = World::new().await;
        world.assign(EntityKind::SubProject, world.sub_projects[0].id, world.acme.id).await;
        world
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let world = assigned_world().await;
        let task = &world.tasks[0];
        let completion = &world.portal.completion;

        let started = completion
            .start(&world.acme_user, StartTaskData { task_id: task.id, company_id: world.acme.id })
            .await
            .unwrap();
        assert_eq!(started.status, CompletionStatus::InProgress);
        assert!(started.started_at.is_some());
        let stored_task = world.store.find_task(task.id).await.unwrap().unwrap();
        assert_eq!(stored_task.status, TaskStatus::InProgress);

        let submitted = completion
            .submit(&world.acme_user, submit_data(task.id, world.acme.id))
            .await
            .unwrap();
        assert_eq!(submitted.status, CompletionStatus::SubmittedForApproval);
        assert_eq!(submitted.completed_by.as_deref(), Some("ops@acme.test"));
        assert_eq!(world.notifier.sent_to(&Recipient::Reviewers).await.len(), 1);

        let approved = completion.approve(&world.consultant, approval(task.id, None)).await.unwrap();
        assert_eq!(approved.status, CompletionStatus::Approved);
        assert_eq!(approved.progress_percentage, 100);
        assert_eq!(approved.quality_score, Some(5));

        let stored_task = world.store.find_task(task.id).await.unwrap().unwrap();
        assert_eq!(stored_task.status, TaskStatus::Completed);
        assert_eq!(stored_task.progress, 100);

        let rollup = world
            .store
            .rollup(EntityKind::SubProject, world.sub_projects[0].id, world.acme.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!((rollup.completed_tasks, rollup.total_tasks), (1, 4));
        assert_eq!(rollup.progress_percentage, 25);

        let history = completion.history(&world.acme_user, task.id).await.unwrap();
        let actions: Vec<HistoryAction> = history.iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![HistoryAction::Started, HistoryAction::Submitted, HistoryAction::Approved]
        );
    }

    #[tokio::test]
    async fn test_approved_pair_is_final() {
        let world = assigned_world().await;
        let task = &world.tasks[0];
        let completion = &world.portal.completion;
        completion.submit(&world.acme_user, submit_data(task.id, world.acme.id)).await.unwrap();
        completion
            .approve(&world.consultant, approval(task.id, Some(world.acme.id)))
            .await
            .unwrap();

        let again = completion
            .approve(&world.consultant, approval(task.id, Some(world.acme.id)))
            .await
            .unwrap_err();
        assert_eq!(again.error_code(), "conflict");

        let reject = completion
            .reject(&world.consultant, rejection(task.id, Some(world.acme.id)))
            .await
            .unwrap_err();
        assert_eq!(reject.error_code(), "conflict");

        let unscoped = completion.reject(&world.consultant, rejection(task.id, None)).await.unwrap_err();
        assert_eq!(unscoped.error_code(), "conflict");

        let resubmit = completion
            .submit(&world.acme_user, submit_data(task.id, world.acme.id))
            .await
            .unwrap_err();
        assert_eq!(resubmit.error_code(), "conflict");
    }

    #[tokio::test]
    async fn test_rejection_floor() {
        let world = assigned_world().await;
        let task = &world.tasks[1];
        world.store.update_task_status(task.id, TaskStatus::InProgress, 30).await.unwrap();
        let mut row = CompanyTaskProgress::pending(task.id, world.acme.id);
        row.status = CompletionStatus::SubmittedForApproval;
        row.progress_percentage = 30;
        world.store.upsert_task_progress(&row).await.unwrap();

        let rejected = world
            .portal
            .completion
            .reject(&world.consultant, rejection(task.id, Some(world.acme.id)))
            .await
            .unwrap();

        assert_eq!(rejected.status, CompletionStatus::Rejected);
        assert_eq!(rejected.progress_percentage, 50);
        assert_eq!(rejected.approval_note.as_deref(), Some("Missing the finance team"));
        let stored_task = world.store.find_task(task.id).await.unwrap().unwrap();
        assert_eq!(stored_task.status, TaskStatus::InProgress);
        assert_eq!(stored_task.progress, 50);
    }

    #[tokio::test]
    async fn test_rejection_notifies_company_and_owner() {
        let world = assigned_world().await;
        let task = &world.tasks[0];
        world
            .portal
            .completion
            .submit(&world.acme_user, submit_data(task.id, world.acme.id))
            .await
            .unwrap();
        world
            .portal
            .completion
            .reject(&world.consultant, rejection(task.id, None))
            .await
            .unwrap();

        let to_company = world.notifier.sent_to(&Recipient::Company(world.acme.id)).await;
        let rejections = to_company
            .iter()
            .filter(|n| n.notification_type == NotificationType::TaskRejected)
            .count();
        assert_eq!(rejections, 1);
        assert_eq!(world.notifier.sent_to(&Recipient::Company(world.initech.id)).await.len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_task_can_be_restarted() {
        let world = assigned_world().await;
        let task = &world.tasks[0];
        let completion = &world.portal.completion;
        completion.submit(&world.acme_user, submit_data(task.id, world.acme.id)).await.unwrap();
        completion.reject(&world.consultant, rejection(task.id, None)).await.unwrap();

        let restarted = completion
            .start(&world.acme_user, StartTaskData { task_id: task.id, company_id: world.acme.id })
            .await
            .unwrap();
        assert_eq!(restarted.status, CompletionStatus::InProgress);
    }

    #[tokio::test]
    async fn test_ambiguous_review_needs_company() {
        let world = assigned_world().await;
        world.assign(EntityKind::SubProject, world.sub_projects[0].id, world.globex.id).await;
        let task = &world.tasks[0];
        let completion = &world.portal.completion;
        let globex_user = Principal::company("pm@globex.test", world.globex.id);
        completion.submit(&world.acme_user, submit_data(task.id, world.acme.id)).await.unwrap();
        completion.submit(&globex_user, submit_data(task.id, world.globex.id)).await.unwrap();

        let err = completion.approve(&world.consultant, approval(task.id, None)).await.unwrap_err();
        assert_eq!(err.error_code(), "invalid_input");

        let approved = completion
            .approve(&world.consultant, approval(task.id, Some(world.globex.id)))
            .await
            .unwrap();
        assert_eq!(approved.company_id, world.globex.id);
    }

    #[tokio::test]
    async fn test_review_without_submission() {
        let world = assigned_world().await;
        let task = &world.tasks[2];
        let err = world
            .portal
            .completion
            .approve(&world.consultant, approval(task.id, Some(world.acme.id)))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "not_found");

        world
            .portal
            .completion
            .start(&world.acme_user, StartTaskData { task_id: task.id, company_id: world.acme.id })
            .await
            .unwrap();
        let err = world
            .portal
            .completion
            .approve(&world.consultant, approval(task.id, Some(world.acme.id)))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "not_found");
    }

    #[tokio::test]
    async fn test_unassigned_company_cannot_submit() {
        let world = assigned_world().await;
        let globex_user = Principal::company("pm@globex.test", world.globex.id);
        let err = world
            .portal
            .completion
            .submit(&globex_user, submit_data(world.tasks[0].id, world.globex.id))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "not_found");

        // Project-level assignment alone does not reach sub-project tasks
        world.assign(EntityKind::Project, world.project.id, world.globex.id).await;
        let err = world
            .portal
            .completion
            .submit(&globex_user, submit_data(world.tasks[0].id, world.globex.id))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "not_found");

        // but does reach tasks attached directly to the project
        world
            .portal
            .completion
            .submit(&globex_user, submit_data(world.legacy_task.id, world.globex.id))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_task_level_assignment_grants_access() {
        let world = World::new().await;
        world.assign(EntityKind::Task, world.handover.id, world.globex.id).await;
        let globex_user = Principal::company("pm@globex.test", world.globex.id);

        let progress = world
            .portal
            .completion
            .progress(&globex_user, world.handover.id, world.globex.id)
            .await
            .unwrap();
        assert_eq!(progress.status, CompletionStatus::Pending);
        assert!(!progress.is_persisted());
    }

    #[tokio::test]
    async fn test_notifier_failure_does_not_fail_review() {
        let mut sink = MockSink::new();
        sink.expect_notify()
            .returning(|_| Err(cp_notifications::NotifyError::Delivery("smtp unavailable".to_string())));
        let world = World::with_notifier(Arc::new(sink)).await;
        world.assign(EntityKind::SubProject, world.sub_projects[0].id, world.acme.id).await;
        let task = &world.tasks[0];

        world
            .portal
            .completion
            .submit(&world.acme_user, submit_data(task.id, world.acme.id))
            .await
            .unwrap();
        let approved = world
            .portal
            .completion
            .approve(&world.admin, approval(task.id, None))
            .await
            .unwrap();
        assert_eq!(approved.status, CompletionStatus::Approved);
    }

    #[tokio::test]
    async fn test_company_sees_only_own_history() {
        let world = assigned_world().await;
        world.assign(EntityKind::SubProject, world.sub_projects[0].id, world.globex.id).await;
        let task = &world.tasks[0];
        let globex_user = Principal::company("pm@globex.test", world.globex.id);
        let completion = &world.portal.completion;
        completion
            .start(&world.acme_user, StartTaskData { task_id: task.id, company_id: world.acme.id })
            .await
            .unwrap();
        completion
            .start(&globex_user, StartTaskData { task_id: task.id, company_id: world.globex.id })
            .await
            .unwrap();

        assert_eq!(completion.history(&world.consultant, task.id).await.unwrap().len(), 2);
        let own = completion.history(&globex_user, task.id).await.unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].company_id, Some(world.globex.id));
    }

    #[tokio::test]
    async fn test_reviews_require_staff() {
        let world = assigned_world().await;
        let err = world
            .portal
            .completion
            .approve(&world.acme_user, approval(world.tasks[0].id, Some(world.acme.id)))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "forbidden");
    }
}
