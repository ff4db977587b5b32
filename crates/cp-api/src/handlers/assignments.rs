//! Assignment handlers

use axum::{
    extract::{Path, State},
    Json,
};
use cp_contracts::{AssignCompaniesData, SetAssignmentStatusData};
use cp_core::traits::Id;
use cp_core::types::EntityKind;
use cp_models::{Assignment, AssignmentStatus};
use cp_services::AssignmentOutcome;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::extractors::{AppState, AuthenticatedPrincipal, JsonBody, QueryParams};
use crate::handlers::KindQuery;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignCompaniesDto {
    #[serde(default)]
    pub kind: Option<EntityKind>,
    pub parent_entity_id: Id,
    #[serde(default)]
    pub company_ids: Vec<Id>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetStatusDto {
    #[serde(default)]
    pub kind: Option<EntityKind>,
    pub status: AssignmentStatus,
}

/// POST /assignments
pub async fn assign_companies(
    State(state): State<AppState>,
    principal: AuthenticatedPrincipal,
    JsonBody(dto): JsonBody<AssignCompaniesDto>,
) -> ApiResult<Json<AssignmentOutcome>> {
    let data = AssignCompaniesData {
        kind: dto.kind.unwrap_or(EntityKind::Project),
        parent_id: dto.parent_entity_id,
        company_ids: dto.company_ids,
    };
    Ok(Json(state.portal.assignments.assign(&principal, data).await?))
}

/// GET /assignments/:id?kind=
pub async fn list_assignments(
    State(state): State<AppState>,
    principal: AuthenticatedPrincipal,
    Path(id): Path<Id>,
    QueryParams(query): QueryParams<KindQuery>,
) -> ApiResult<Json<Vec<Assignment>>> {
    Ok(Json(state.portal.assignments.list(&principal, query.kind(), id).await?))
}

/// GET /companies/:company_id/assignments?kind=
pub async fn list_company_assignments(
    State(state): State<AppState>,
    principal: AuthenticatedPrincipal,
    Path(company_id): Path<Id>,
    QueryParams(query): QueryParams<KindQuery>,
) -> ApiResult<Json<Vec<Assignment>>> {
    let rows = state
        .portal
        .assignments
        .list_for_company(&principal, company_id, query.kind())
        .await?;
    Ok(Json(rows))
}

/// PATCH /companies/:company_id/assignments/:assignment_id
pub async fn set_assignment_status(
    State(state): State<AppState>,
    principal: AuthenticatedPrincipal,
    Path((company_id, assignment_id)): Path<(Id, Id)>,
    JsonBody(dto): JsonBody<SetStatusDto>,
) -> ApiResult<Json<Assignment>> {
    let data = SetAssignmentStatusData {
        kind: dto.kind.unwrap_or(EntityKind::Project),
        assignment_id,
        status: dto.status,
    };
    Ok(Json(state.portal.assignments.set_status(&principal, company_id, data).await?))
}
