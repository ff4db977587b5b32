use async_trait::async_trait;
use cp_core::traits::Id;
use cp_core::types::{EntityKind, Facet};
use cp_models::{CompanyTaskProgress, ProgressRollup};

use super::rows::{collect, RollupRow, TaskProgressRow, PROGRESS_COLUMNS};
use super::{entity_column, PgStore};
use crate::error::{StoreError, StoreResult};
use crate::store::ProgressStore;

fn rollup_table(kind: EntityKind) -> StoreResult<&'static str> {
    if kind.has_rollup() {
        Ok(kind.table(Facet::Progress))
    } else {
        Err(StoreError::Unsupported(format!("{} rollups", kind)))
    }
}

#[async_trait]
impl ProgressStore for PgStore {
    async fn task_progress(&self, task_id: Id, company_id: Id) -> StoreResult<Option<CompanyTaskProgress>> {
        let row = sqlx::query_as::<_, TaskProgressRow>(&format!(
            "SELECT {} FROM company_task_progress WHERE task_id = $1 AND company_id = $2",
            PROGRESS_COLUMNS
        ))
        .bind(task_id)
        .bind(company_id)
        .fetch_optional(self.pool())
        .await?;
        row.map(TaskProgressRow::into_model).transpose()
    }

    async fn progress_for_tasks(&self, task_ids: &[Id]) -> StoreResult<Vec<CompanyTaskProgress>> {
        let rows = sqlx::query_as::<_, TaskProgressRow>(&format!(
            "SELECT {} FROM company_task_progress WHERE task_id = ANY($1) ORDER BY task_id, company_id",
            PROGRESS_COLUMNS
        ))
        .bind(task_ids)
        .fetch_all(self.pool())
        .await?;
        collect(rows, TaskProgressRow::into_model)
    }

    async fn upsert_task_progress(&self, progress: &CompanyTaskProgress) -> StoreResult<CompanyTaskProgress> {
        let row = sqlx::query_as::<_, TaskProgressRow>(&format!(
            r#"
            INSERT INTO company_task_progress (
                task_id, company_id, status, progress_percentage, completion_note, actual_hours,
                completed_by, completed_at, approved_by, approved_at, approval_note,
                quality_score, started_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, NOW())
            ON CONFLICT (task_id, company_id) DO UPDATE SET
                status = EXCLUDED.status,
                progress_percentage = EXCLUDED.progress_percentage,
                completion_note = EXCLUDED.completion_note,
                actual_hours = EXCLUDED.actual_hours,
                completed_by = EXCLUDED.completed_by,
                completed_at = EXCLUDED.completed_at,
                approved_by = EXCLUDED.approved_by,
                approved_at = EXCLUDED.approved_at,
                approval_note = EXCLUDED.approval_note,
                quality_score = EXCLUDED.quality_score,
                started_at = EXCLUDED.started_at,
                updated_at = NOW()
            RETURNING {}
            "#,
            PROGRESS_COLUMNS
        ))
        .bind(progress.task_id)
        .bind(progress.company_id)
        .bind(progress.status.as_str())
        .bind(progress.progress_percentage)
        .bind(&progress.completion_note)
        .bind(progress.actual_hours)
        .bind(&progress.completed_by)
        .bind(progress.completed_at)
        .bind(&progress.approved_by)
        .bind(progress.approved_at)
        .bind(&progress.approval_note)
        .bind(progress.quality_score)
        .bind(progress.started_at)
        .fetch_one(self.pool())
        .await?;

        row.into_model()
    }

    async fn rollup(&self, kind: EntityKind, entity_id: Id, company_id: Id) -> StoreResult<Option<ProgressRollup>> {
        let table = rollup_table(kind)?;
        let column = entity_column(kind);
        let row = sqlx::query_as::<_, RollupRow>(&format!(
            "SELECT {column} AS entity_id, company_id, progress_percentage, completed_tasks, \
             total_tasks, manual_override, overridden_by, last_updated \
             FROM {table} WHERE {column} = $1 AND company_id = $2"
        ))
        .bind(entity_id)
        .bind(company_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(|r| r.into_model(kind)))
    }

    async fn upsert_rollup(&self, rollup: &ProgressRollup) -> StoreResult<ProgressRollup> {
        let table = rollup_table(rollup.kind)?;
        let column = entity_column(rollup.kind);
        let row = sqlx::query_as::<_, RollupRow>(&format!(
            "INSERT INTO {table} ({column}, company_id, progress_percentage, completed_tasks, \
             total_tasks, manual_override, overridden_by, last_updated) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT ({column}, company_id) DO UPDATE SET \
             progress_percentage = EXCLUDED.progress_percentage, \
             completed_tasks = EXCLUDED.completed_tasks, \
             total_tasks = EXCLUDED.total_tasks, \
             manual_override = EXCLUDED.manual_override, \
             overridden_by = EXCLUDED.overridden_by, \
             last_updated = EXCLUDED.last_updated \
             RETURNING {column} AS entity_id, company_id, progress_percentage, completed_tasks, \
             total_tasks, manual_override, overridden_by, last_updated"
        ))
        .bind(rollup.entity_id)
        .bind(rollup.company_id)
        .bind(rollup.progress_percentage)
        .bind(rollup.completed_tasks)
        .bind(rollup.total_tasks)
        .bind(rollup.manual_override)
        .bind(&rollup.overridden_by)
        .bind(rollup.last_updated)
        .fetch_one(self.pool())
        .await?;
        Ok(row.into_model(rollup.kind))
    }
}
