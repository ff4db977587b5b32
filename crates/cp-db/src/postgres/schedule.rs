use async_trait::async_trait;
use cp_core::traits::Id;
use cp_core::types::{DateRange, EntityKind, Facet};
use cp_models::DateRangeRecord;

use super::rows::DateRangeRow;
use super::{entity_column, PgStore};
use crate::error::StoreResult;
use crate::store::ScheduleStore;

#[async_trait]
impl ScheduleStore for PgStore {
    async fn date_range(&self, kind: EntityKind, entity_id: Id, company_id: Id) -> StoreResult<Option<DateRangeRecord>> {
        let column = entity_column(kind);
        let row = sqlx::query_as::<_, DateRangeRow>(&format!(
            "SELECT {column} AS entity_id, company_id, start_date, end_date, updated_by, updated_at \
             FROM {table} WHERE {column} = $1 AND company_id = $2",
            table = kind.table(Facet::Dates)
        ))
        .bind(entity_id)
        .bind(company_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(|r| r.into_model(kind)))
    }

    async fn upsert_date_range(
        &self,
        kind: EntityKind,
        entity_id: Id,
        company_id: Id,
        range: DateRange,
        actor: &str,
    ) -> StoreResult<DateRangeRecord> {
        let column = entity_column(kind);
        let row = sqlx::query_as::<_, DateRangeRow>(&format!(
            "INSERT INTO {table} ({column}, company_id, start_date, end_date, updated_by, updated_at) \
             VALUES ($1, $2, $3, $4, $5, NOW()) \
             ON CONFLICT ({column}, company_id) DO UPDATE SET \
             start_date = EXCLUDED.start_date, end_date = EXCLUDED.end_date, \
             updated_by = EXCLUDED.updated_by, updated_at = NOW() \
             RETURNING {column} AS entity_id, company_id, start_date, end_date, updated_by, updated_at",
            table = kind.table(Facet::Dates)
        ))
        .bind(entity_id)
        .bind(company_id)
        .bind(range.start_date)
        .bind(range.end_date)
        .bind(actor)
        .fetch_one(self.pool())
        .await?;
        Ok(row.into_model(kind))
    }
}
