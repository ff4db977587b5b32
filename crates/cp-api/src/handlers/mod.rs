//! Request handlers, one module per service

pub mod assignments;
pub mod deletion;
pub mod progress;
pub mod schedule;
pub mod tasks;

use cp_core::traits::Id;
use cp_core::types::EntityKind;
use serde::Deserialize;

/// `?kind=`, defaulting to project
#[derive(Debug, Default, Deserialize)]
pub struct KindQuery {
    pub kind: Option<EntityKind>,
}

impl KindQuery {
    pub fn kind(&self) -> EntityKind {
        self.kind.unwrap_or(EntityKind::Project)
    }
}

/// `?companyId=`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyQuery {
    pub company_id: Option<Id>,
}
