use async_trait::async_trait;
use cp_core::traits::Id;
use cp_models::{ActivityRecord, NewHistoryEntry, TaskHistoryEntry};

use super::rows::{collect, ActivityRow, HistoryRow};
use super::PgStore;
use crate::error::StoreResult;
use crate::store::{ActivityStore, HistoryStore};

#[async_trait]
impl HistoryStore for PgStore {
    async fn append_history(&self, entry: NewHistoryEntry) -> StoreResult<TaskHistoryEntry> {
        let row = sqlx::query_as::<_, HistoryRow>(
            r#"
            INSERT INTO task_history (task_id, company_id, action, old_value, new_value, actor, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, task_id, company_id, action, old_value, new_value, actor, notes, created_at
            "#,
        )
        .bind(entry.task_id)
        .bind(entry.company_id)
        .bind(entry.action.as_str())
        .bind(&entry.old_value)
        .bind(&entry.new_value)
        .bind(&entry.actor)
        .bind(&entry.notes)
        .fetch_one(self.pool())
        .await?;
        row.into_model()
    }

    async fn task_history(&self, task_id: Id) -> StoreResult<Vec<TaskHistoryEntry>> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT id, task_id, company_id, action, old_value, new_value, actor, notes, created_at
            FROM task_history
            WHERE task_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(task_id)
        .fetch_all(self.pool())
        .await?;
        collect(rows, HistoryRow::into_model)
    }
}

#[async_trait]
impl ActivityStore for PgStore {
    async fn activity_for_tasks(&self, task_ids: &[Id]) -> StoreResult<Vec<ActivityRecord>> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            r#"
            SELECT 'comment' AS kind, task_id, company_id FROM task_comments WHERE task_id = ANY($1)
            UNION ALL
            SELECT 'file' AS kind, task_id, company_id FROM task_files WHERE task_id = ANY($1)
            "#,
        )
        .bind(task_ids)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(ActivityRow::into_model).collect())
    }
}
