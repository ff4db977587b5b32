//! Date distribution contract

use cp_core::error::{CoreResult, ValidationErrors};
use cp_core::traits::Id;
use cp_core::types::{DateRange, Principal};

use crate::base::Contract;

#[derive(Debug, Clone)]
pub struct DistributeDatesData {
    pub project_id: Id,
    pub company_id: Id,
    pub main: DateRange,
    /// Applied to every sub-project in the call
    pub sub_project_override: Option<DateRange>,
    /// Applied to every task in the call
    pub task_override: Option<DateRange>,
}

pub struct DistributeDatesContract<'a> {
    principal: &'a Principal,
    company_id: Id,
}

impl<'a> DistributeDatesContract<'a> {
    pub fn new(principal: &'a Principal, company_id: Id) -> Self {
        Self {
            principal,
            company_id,
        }
    }

    fn validate_range(field: &str, range: &DateRange, errors: &mut ValidationErrors) {
        if range.is_inverted() {
            errors.add(field, "end date must not be before start date");
        }
    }

    fn validate_override(field: &str, range: &DateRange, errors: &mut ValidationErrors) {
        if !range.is_complete() {
            errors.add(field, "requires both startDate and endDate");
        }
        Self::validate_range(field, range, errors);
    }
}

impl<'a> Contract<DistributeDatesData> for DistributeDatesContract<'a> {
    fn authorize(&self) -> CoreResult<()> {
        self.principal.require_company(self.company_id, "schedule dates")
    }

    fn validate_input(&self, input: &DistributeDatesData, errors: &mut ValidationErrors) {
        if input.company_id <= 0 {
            errors.add("companyId", "must be a positive id");
        }
        Self::validate_range("mainProjectDates", &input.main, errors);
        if let Some(range) = &input.sub_project_override {
            Self::validate_override("subProjectDates", range, errors);
        }
        if let Some(range) = &input.task_override {
            Self::validate_override("taskDates", range, errors);
        }
    }
}
