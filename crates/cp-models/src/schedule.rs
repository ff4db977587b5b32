//! Per-company schedules
//!
//! Tables: project_date_ranges, sub_project_date_ranges, task_date_ranges

use chrono::{DateTime, NaiveDate, Utc};
use cp_core::traits::Id;
use cp_core::types::{DateRange, EntityKind};
use serde::{Deserialize, Serialize};

/// One independent range per `(entity, company)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRangeRecord {
    pub kind: EntityKind,
    pub entity_id: Id,
    pub company_id: Id,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

impl DateRangeRecord {
    pub fn range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }
}

