//! PostgreSQL store
//!
//! Multi-statement operations are not wrapped in transactions; each
//! statement is atomic on its own and callers sequence them as a
//! best-effort saga.

mod assignments;
mod hierarchy;
mod history;
mod progress;
pub mod rows;
mod schedule;

use cp_core::types::EntityKind;
use sqlx::PgPool;

use crate::pool::Database;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn from_database(db: &Database) -> Self {
        Self::new(db.pool().clone())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Column referencing the owning entity in per-company tables
pub(crate) fn entity_column(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Project => "project_id",
        EntityKind::SubProject => "sub_project_id",
        EntityKind::Task => "task_id",
    }
}
