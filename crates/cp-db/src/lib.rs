//! # cp-db
//!
//! Persistence layer for the consulting portal.
//!
//! - Store traits, one per persisted concern, combined into [`Store`]
//! - [`MemoryStore`] for tests and local development
//! - [`PgStore`] backed by a PostgreSQL pool (SQLx), with migrations
//!
//! ## Example
//!
//! ```ignore
//! use cp_db::{Database, DatabaseConfig, PgStore};
//!
//! let db = Database::connect(&DatabaseConfig::with_url(url)).await?;
//! db.migrate().await?;
//! let store = PgStore::from_database(&db);
//! ```

pub mod error;
pub mod memory;
pub mod pool;
pub mod postgres;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use pool::{Database, DatabaseConfig};
pub use postgres::PgStore;
pub use store::{
    ActivityStore, AssignmentStore, HierarchyStore, HistoryStore, ProgressStore, ScheduleStore,
    Store,
};
