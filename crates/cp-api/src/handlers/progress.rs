//! Progress rollup handlers, shared by projects and sub-projects
//!
//! The hierarchy level comes from the router as an `Extension<EntityKind>`.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use cp_contracts::ProgressOverrideData;
use cp_core::traits::Id;
use cp_core::types::EntityKind;
use cp_models::ProgressRollup;
use cp_services::ProgressView;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::extractors::{AppState, AuthenticatedPrincipal, JsonBody, QueryParams};
use crate::handlers::CompanyQuery;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideProgressDto {
    pub progress_percentage: i32,
    pub completed_tasks: Option<i32>,
    pub total_tasks: Option<i32>,
}

/// GET /{projects|sub-projects}/:id/progress?companyId=
pub async fn read_progress(
    State(state): State<AppState>,
    Extension(kind): Extension<EntityKind>,
    principal: AuthenticatedPrincipal,
    Path(id): Path<Id>,
    QueryParams(query): QueryParams<CompanyQuery>,
) -> ApiResult<Json<ProgressView>> {
    let view = state.portal.progress.read(&principal, kind, id, query.company_id).await?;
    Ok(Json(view))
}

/// PUT /{projects|sub-projects}/:id/progress/:company_id
pub async fn override_progress(
    State(state): State<AppState>,
    Extension(kind): Extension<EntityKind>,
    principal: AuthenticatedPrincipal,
    Path((id, company_id)): Path<(Id, Id)>,
    JsonBody(dto): JsonBody<OverrideProgressDto>,
) -> ApiResult<Json<ProgressRollup>> {
    let data = ProgressOverrideData {
        progress_percentage: dto.progress_percentage,
        completed_tasks: dto.completed_tasks,
        total_tasks: dto.total_tasks,
    };
    let rollup = state
        .portal
        .progress
        .manual_override(&principal, kind, id, company_id, data)
        .await?;
    Ok(Json(rollup))
}
