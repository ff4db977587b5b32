use async_trait::async_trait;
use cp_core::traits::Id;
use cp_core::types::{EntityKind, Facet};
use cp_models::{Assignment, AssignmentStatus, NewAssignment};

use super::rows::{collect, AssignmentRow};
use super::{entity_column, PgStore};
use crate::error::{StoreError, StoreResult};
use crate::store::AssignmentStore;

fn select(kind: EntityKind) -> String {
    format!(
        "SELECT id, {} AS entity_id, company_id, status, assigned_by, assigned_at, updated_by, updated_at FROM {}",
        entity_column(kind),
        kind.table(Facet::Assignment)
    )
}

const RETURNING: &str = "RETURNING id, company_id, status, assigned_by, assigned_at, updated_by, updated_at";

fn returning(kind: EntityKind) -> String {
    format!("{}, {} AS entity_id", RETURNING, entity_column(kind))
}

#[async_trait]
impl AssignmentStore for PgStore {
    async fn find_assignment(&self, kind: EntityKind, entity_id: Id, company_id: Id) -> StoreResult<Option<Assignment>> {
        let row = sqlx::query_as::<_, AssignmentRow>(&format!(
            "{} WHERE {} = $1 AND company_id = $2",
            select(kind),
            entity_column(kind)
        ))
        .bind(entity_id)
        .bind(company_id)
        .fetch_optional(self.pool())
        .await?;
        row.map(|r| r.into_model(kind)).transpose()
    }

    async fn get_assignment(&self, kind: EntityKind, id: Id) -> StoreResult<Option<Assignment>> {
        let row = sqlx::query_as::<_, AssignmentRow>(&format!("{} WHERE id = $1", select(kind)))
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.map(|r| r.into_model(kind)).transpose()
    }

    async fn assignments_for(&self, kind: EntityKind, entity_id: Id) -> StoreResult<Vec<Assignment>> {
        let rows = sqlx::query_as::<_, AssignmentRow>(&format!(
            "{} WHERE {} = $1 ORDER BY assigned_at ASC, id ASC",
            select(kind),
            entity_column(kind)
        ))
        .bind(entity_id)
        .fetch_all(self.pool())
        .await?;
        collect(rows, |r| r.into_model(kind))
    }

    async fn active_assignments_for(&self, kind: EntityKind, entity_ids: &[Id]) -> StoreResult<Vec<Assignment>> {
        let rows = sqlx::query_as::<_, AssignmentRow>(&format!(
            "{} WHERE {} = ANY($1) AND status = 'active' ORDER BY id ASC",
            select(kind),
            entity_column(kind)
        ))
        .bind(entity_ids)
        .fetch_all(self.pool())
        .await?;
        collect(rows, |r| r.into_model(kind))
    }

    async fn assignments_for_company(&self, kind: EntityKind, company_id: Id) -> StoreResult<Vec<Assignment>> {
        let rows = sqlx::query_as::<_, AssignmentRow>(&format!(
            "{} WHERE company_id = $1 AND status = 'active' ORDER BY assigned_at ASC, id ASC",
            select(kind)
        ))
        .bind(company_id)
        .fetch_all(self.pool())
        .await?;
        collect(rows, |r| r.into_model(kind))
    }

    async fn insert_assignments(&self, rows: &[NewAssignment]) -> StoreResult<Vec<Assignment>> {
        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };
        let kind = first.kind;
        if rows.iter().any(|r| r.kind != kind) {
            return Err(StoreError::Unsupported(
                "batch insert across hierarchy levels".to_string(),
            ));
        }

        let entity_ids: Vec<i64> = rows.iter().map(|r| r.entity_id).collect();
        let company_ids: Vec<i64> = rows.iter().map(|r| r.company_id).collect();
        let actors: Vec<String> = rows.iter().map(|r| r.assigned_by.clone()).collect();

        // A single statement, so either every row lands or none does
        let inserted = sqlx::query_as::<_, AssignmentRow>(&format!(
            "INSERT INTO {} ({}, company_id, assigned_by) \
             SELECT * FROM UNNEST($1::BIGINT[], $2::BIGINT[], $3::TEXT[]) {}",
            kind.table(Facet::Assignment),
            entity_column(kind),
            returning(kind)
        ))
        .bind(&entity_ids)
        .bind(&company_ids)
        .bind(&actors)
        .fetch_all(self.pool())
        .await?;

        collect(inserted, |r| r.into_model(kind))
    }

    async fn upsert_assignment(&self, row: &NewAssignment) -> StoreResult<Assignment> {
        let column = entity_column(row.kind);
        let saved = sqlx::query_as::<_, AssignmentRow>(&format!(
            "INSERT INTO {table} ({column}, company_id, assigned_by) VALUES ($1, $2, $3) \
             ON CONFLICT ({column}, company_id) DO UPDATE \
             SET status = 'active', updated_by = EXCLUDED.assigned_by, updated_at = NOW() {returning}",
            table = row.kind.table(Facet::Assignment),
            column = column,
            returning = returning(row.kind)
        ))
        .bind(row.entity_id)
        .bind(row.company_id)
        .bind(&row.assigned_by)
        .fetch_one(self.pool())
        .await?;

        saved.into_model(row.kind)
    }

    async fn set_assignment_status(
        &self,
        kind: EntityKind,
        id: Id,
        status: AssignmentStatus,
        actor: &str,
    ) -> StoreResult<Assignment> {
        let saved = sqlx::query_as::<_, AssignmentRow>(&format!(
            "UPDATE {} SET status = $2, updated_by = $3, updated_at = NOW() WHERE id = $1 {}",
            kind.table(Facet::Assignment),
            returning(kind)
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(actor)
        .fetch_optional(self.pool())
        .await?;

        saved
            .ok_or_else(|| StoreError::not_found("Assignment", id))?
            .into_model(kind)
    }
}
