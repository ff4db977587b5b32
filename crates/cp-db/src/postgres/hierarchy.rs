use async_trait::async_trait;
use cp_core::traits::Id;
use cp_core::types::EntityKind;
use cp_models::{Project, SubProject, Task, TaskStatus};

use super::rows::{collect, ProjectRow, SubProjectRow, TaskRow, PROJECT_COLUMNS, SUB_PROJECT_COLUMNS, TASK_COLUMNS};
use super::PgStore;
use crate::error::{StoreError, StoreResult};
use crate::store::HierarchyStore;

#[async_trait]
impl HierarchyStore for PgStore {
    async fn existing_company_ids(&self, ids: &[Id]) -> StoreResult<Vec<Id>> {
        let found = sqlx::query_scalar::<_, i64>("SELECT id FROM companies WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(self.pool())
            .await?;
        Ok(found)
    }

    async fn find_project(&self, id: Id) -> StoreResult<Option<Project>> {
        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            "SELECT {} FROM projects WHERE id = $1",
            PROJECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        row.map(ProjectRow::into_model).transpose()
    }

    async fn find_sub_project(&self, id: Id) -> StoreResult<Option<SubProject>> {
        let row = sqlx::query_as::<_, SubProjectRow>(&format!(
            "SELECT {} FROM sub_projects WHERE id = $1",
            SUB_PROJECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        row.map(SubProjectRow::into_model).transpose()
    }

    async fn find_task(&self, id: Id) -> StoreResult<Option<Task>> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {} FROM tasks WHERE id = $1",
            TASK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        row.map(TaskRow::into_model).transpose()
    }

    async fn sub_projects_of(&self, project_id: Id) -> StoreResult<Vec<SubProject>> {
        let rows = sqlx::query_as::<_, SubProjectRow>(&format!(
            "SELECT {} FROM sub_projects WHERE project_id = $1 ORDER BY created_at ASC, id ASC",
            SUB_PROJECT_COLUMNS
        ))
        .bind(project_id)
        .fetch_all(self.pool())
        .await?;
        collect(rows, SubProjectRow::into_model)
    }

    async fn tasks_of_sub_project(&self, sub_project_id: Id) -> StoreResult<Vec<Task>> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {} FROM tasks WHERE sub_project_id = $1 ORDER BY created_at ASC, id ASC",
            TASK_COLUMNS
        ))
        .bind(sub_project_id)
        .fetch_all(self.pool())
        .await?;
        collect(rows, TaskRow::into_model)
    }

    async fn tasks_of_project(&self, project_id: Id) -> StoreResult<Vec<Task>> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {} FROM tasks WHERE project_id = $1 ORDER BY created_at ASC, id ASC",
            TASK_COLUMNS
        ))
        .bind(project_id)
        .fetch_all(self.pool())
        .await?;
        collect(rows, TaskRow::into_model)
    }

    async fn update_task_status(&self, task_id: Id, status: TaskStatus, progress: i32) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE tasks SET status = $2, progress = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(task_id)
        .bind(status.as_str())
        .bind(progress)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("Task", task_id));
        }
        Ok(())
    }

    async fn delete_entity(&self, kind: EntityKind, id: Id) -> StoreResult<()> {
        // Child rows go through ON DELETE CASCADE
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", kind.entity_table()))
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(kind.label(), id));
        }
        tracing::debug!(kind = %kind, id, "Deleted hierarchy entity");
        Ok(())
    }

    async fn refresh_sub_project_count(&self, project_id: Id) -> StoreResult<i32> {
        let count = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE projects
            SET sub_project_count = (SELECT COUNT(*) FROM sub_projects WHERE project_id = $1),
                updated_at = NOW()
            WHERE id = $1
            RETURNING sub_project_count
            "#,
        )
        .bind(project_id)
        .fetch_optional(self.pool())
        .await?;

        count.ok_or_else(|| StoreError::not_found("Project", project_id))
    }
}
