//! Task completion handlers

use axum::{
    extract::{Path, State},
    Json,
};
use cp_contracts::{ReviewApprovalData, ReviewRejectionData, StartTaskData, SubmitCompletionData};
use cp_core::error::CoreError;
use cp_core::traits::Id;
use cp_models::{CompanyTaskProgress, TaskHistoryEntry, TaskStatus};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::extractors::{AppState, AuthenticatedPrincipal, JsonBody, QueryParams};
use crate::handlers::CompanyQuery;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTaskDto {
    pub company_id: Option<Id>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteTaskDto {
    pub company_id: Option<Id>,
    #[serde(default)]
    pub completion_note: String,
    pub actual_hours: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveTaskDto {
    pub company_id: Option<Id>,
    pub approval_note: Option<String>,
    pub quality_score: Option<i16>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectTaskDto {
    pub company_id: Option<Id>,
    #[serde(default)]
    pub rejection_reason: String,
    pub required_actions: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionResponse {
    pub status: &'static str,
    pub progress: CompanyTaskProgress,
}

/// Explicit company id, or the caller's own
fn company_of(principal: &AuthenticatedPrincipal, company_id: Option<Id>) -> ApiResult<Id> {
    Ok(company_id
        .or(principal.company_id)
        .ok_or_else(|| CoreError::invalid("companyId", "can't be blank"))?)
}

/// POST /tasks/:id/start
pub async fn start_task(
    State(state): State<AppState>,
    principal: AuthenticatedPrincipal,
    Path(task_id): Path<Id>,
    JsonBody(dto): JsonBody<StartTaskDto>,
) -> ApiResult<Json<TransitionResponse>> {
    let company_id = company_of(&principal, dto.company_id)?;
    let progress = state
        .portal
        .completion
        .start(&principal, StartTaskData { task_id, company_id })
        .await?;
    Ok(Json(TransitionResponse {
        status: progress.status.as_str(),
        progress,
    }))
}

/// POST /tasks/:id/complete
pub async fn complete_task(
    State(state): State<AppState>,
    principal: AuthenticatedPrincipal,
    Path(task_id): Path<Id>,
    JsonBody(dto): JsonBody<CompleteTaskDto>,
) -> ApiResult<Json<TransitionResponse>> {
    let data = SubmitCompletionData {
        task_id,
        company_id: company_of(&principal, dto.company_id)?,
        completion_note: dto.completion_note,
        actual_hours: dto.actual_hours,
    };
    let progress = state.portal.completion.submit(&principal, data).await?;
    Ok(Json(TransitionResponse {
        status: progress.status.as_str(),
        progress,
    }))
}

/// POST /tasks/:id/approve
pub async fn approve_task(
    State(state): State<AppState>,
    principal: AuthenticatedPrincipal,
    Path(task_id): Path<Id>,
    JsonBody(dto): JsonBody<ApproveTaskDto>,
) -> ApiResult<Json<TransitionResponse>> {
    let data = ReviewApprovalData {
        task_id,
        company_id: dto.company_id,
        approval_note: dto.approval_note,
        quality_score: dto.quality_score,
    };
    let progress = state.portal.completion.approve(&principal, data).await?;
    Ok(Json(TransitionResponse {
        status: progress.status.as_str(),
        progress,
    }))
}

/// POST /tasks/:id/reject
///
/// Reports the task's status, which returns to `in_progress`.
pub async fn reject_task(
    State(state): State<AppState>,
    principal: AuthenticatedPrincipal,
    Path(task_id): Path<Id>,
    JsonBody(dto): JsonBody<RejectTaskDto>,
) -> ApiResult<Json<TransitionResponse>> {
    let data = ReviewRejectionData {
        task_id,
        company_id: dto.company_id,
        rejection_reason: dto.rejection_reason,
        required_actions: dto.required_actions,
    };
    let progress = state.portal.completion.reject(&principal, data).await?;
    Ok(Json(TransitionResponse {
        status: TaskStatus::InProgress.as_str(),
        progress,
    }))
}

/// GET /tasks/:id/progress?companyId=
pub async fn task_progress(
    State(state): State<AppState>,
    principal: AuthenticatedPrincipal,
    Path(task_id): Path<Id>,
    QueryParams(query): QueryParams<CompanyQuery>,
) -> ApiResult<Json<CompanyTaskProgress>> {
    let company_id = company_of(&principal, query.company_id)?;
    Ok(Json(state.portal.completion.progress(&principal, task_id, company_id).await?))
}

/// GET /tasks/:id/history
pub async fn task_history(
    State(state): State<AppState>,
    principal: AuthenticatedPrincipal,
    Path(task_id): Path<Id>,
) -> ApiResult<Json<Vec<TaskHistoryEntry>>> {
    Ok(Json(state.portal.completion.history(&principal, task_id).await?))
}
