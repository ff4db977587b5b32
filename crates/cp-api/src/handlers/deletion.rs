//! Guarded delete handlers for every hierarchy level

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use cp_core::traits::Id;
use cp_core::types::EntityKind;
use cp_services::DeletionReport;

use crate::error::ApiResult;
use crate::extractors::{AppState, AuthenticatedPrincipal};

/// GET /{projects|sub-projects|tasks}/:id/deletion-check
pub async fn deletion_check(
    State(state): State<AppState>,
    Extension(kind): Extension<EntityKind>,
    principal: AuthenticatedPrincipal,
    Path(id): Path<Id>,
) -> ApiResult<Json<DeletionReport>> {
    Ok(Json(state.portal.deletion.can_delete(&principal, kind, id).await?))
}

/// DELETE /{projects|sub-projects|tasks}/:id
pub async fn delete_entity(
    State(state): State<AppState>,
    Extension(kind): Extension<EntityKind>,
    principal: AuthenticatedPrincipal,
    Path(id): Path<Id>,
) -> ApiResult<Json<DeletionReport>> {
    Ok(Json(state.portal.deletion.delete(&principal, kind, id).await?))
}
