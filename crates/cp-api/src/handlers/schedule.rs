//! Date distribution handlers

use axum::{
    extract::{Path, State},
    Json,
};
use cp_contracts::DistributeDatesData;
use cp_core::error::CoreError;
use cp_core::traits::Id;
use cp_core::types::{DateRange, EntityKind};
use cp_models::DateRangeRecord;
use cp_services::DistributionOutcome;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::extractors::{AppState, AuthenticatedPrincipal, JsonBody, QueryParams};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributeDatesDto {
    pub company_id: Id,
    #[serde(default)]
    pub main_project_dates: DateRange,
    pub sub_project_dates: Option<DateRange>,
    pub task_dates: Option<DateRange>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRangeQuery {
    pub company_id: Option<Id>,
    pub kind: Option<EntityKind>,
}

/// POST /assignments/:id/dates
pub async fn distribute_dates(
    State(state): State<AppState>,
    principal: AuthenticatedPrincipal,
    Path(project_id): Path<Id>,
    JsonBody(dto): JsonBody<DistributeDatesDto>,
) -> ApiResult<Json<DistributionOutcome>> {
    let data = DistributeDatesData {
        project_id,
        company_id: dto.company_id,
        main: dto.main_project_dates,
        sub_project_override: dto.sub_project_dates,
        task_override: dto.task_dates,
    };
    Ok(Json(state.portal.schedule.distribute(&principal, data).await?))
}

/// GET /assignments/:id/dates?companyId=&kind=
pub async fn get_dates(
    State(state): State<AppState>,
    principal: AuthenticatedPrincipal,
    Path(entity_id): Path<Id>,
    QueryParams(query): QueryParams<DateRangeQuery>,
) -> ApiResult<Json<Option<DateRangeRecord>>> {
    let company_id = query
        .company_id
        .or(principal.company_id)
        .ok_or_else(|| CoreError::invalid("companyId", "can't be blank"))?;
    let kind = query.kind.unwrap_or(EntityKind::Project);
    let record = state
        .portal
        .schedule
        .date_range(&principal, kind, entity_id, company_id)
        .await?;
    Ok(Json(record))
}
