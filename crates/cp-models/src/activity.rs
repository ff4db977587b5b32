//! Company activity on tasks that is owned by other parts of the portal
//! (discussion threads and uploads) but gates hierarchy deletes.
//!
//! Tables: task_comments, task_files

use cp_core::traits::Id;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Comment,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub kind: ActivityKind,
    pub task_id: Id,
    pub company_id: Id,
}

