//! Assignment contracts

use cp_core::error::{CoreResult, ValidationErrors};
use cp_core::traits::Id;
use cp_core::types::{EntityKind, Principal};
use cp_models::AssignmentStatus;

use crate::base::Contract;

/// Upper bound on companies per assign call
pub const MAX_COMPANIES_PER_CALL: usize = 200;

#[derive(Debug, Clone)]
pub struct AssignCompaniesData {
    pub kind: EntityKind,
    pub parent_id: Id,
    pub company_ids: Vec<Id>,
}

pub struct AssignCompaniesContract<'a> {
    principal: &'a Principal,
}

impl<'a> AssignCompaniesContract<'a> {
    pub fn new(principal: &'a Principal) -> Self {
        Self { principal }
    }
}

impl<'a> Contract<AssignCompaniesData> for AssignCompaniesContract<'a> {
    fn authorize(&self) -> CoreResult<()> {
        self.principal.require_staff("assign companies")
    }

    fn validate_input(&self, input: &AssignCompaniesData, errors: &mut ValidationErrors) {
        if input.parent_id <= 0 {
            errors.add("parentEntityId", "must be a positive id");
        }
        if input.company_ids.is_empty() {
            errors.add("companyIds", "can't be blank");
        } else if input.company_ids.len() > MAX_COMPANIES_PER_CALL {
            errors.add(
                "companyIds",
                format!("is too long (maximum is {} companies)", MAX_COMPANIES_PER_CALL),
            );
        }
        if input.company_ids.iter().any(|id| *id <= 0) {
            errors.add("companyIds", "must contain only positive ids");
        }
    }
}

#[derive(Debug, Clone)]
pub struct SetAssignmentStatusData {
    pub kind: EntityKind,
    pub assignment_id: Id,
    pub status: AssignmentStatus,
}

pub struct SetAssignmentStatusContract<'a> {
    principal: &'a Principal,
}

impl<'a> SetAssignmentStatusContract<'a> {
    pub fn new(principal: &'a Principal) -> Self {
        Self { principal }
    }
}

impl<'a> Contract<SetAssignmentStatusData> for SetAssignmentStatusContract<'a> {
    fn authorize(&self) -> CoreResult<()> {
        self.principal.require_staff("change assignments")
    }

    fn validate_input(&self, input: &SetAssignmentStatusData, errors: &mut ValidationErrors) {
        if input.assignment_id <= 0 {
            errors.add("assignmentId", "must be a positive id");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cp_core::types::Role;

    fn data(company_ids: Vec<Id>) -> AssignCompaniesData {
        AssignCompaniesData {
            kind: EntityKind::SubProject,
            parent_id: 3,
            company_ids,
        }
    }

    #[test]
    fn test_staff_can_assign() {
        let consultant = Principal::new("c@firm.test", Role::Consultant);
        let contract = AssignCompaniesContract::new(&consultant);
        assert!(contract.validate(&data(vec![1, 2])).is_ok());
    }

    #[test]
    fn test_company_cannot_assign() {
        let company = Principal::company("ops@acme.test", 1);
        let contract = AssignCompaniesContract::new(&company);
        let err = contract.validate(&data(vec![1])).unwrap_err();
        assert_eq!(err.error_code(), "forbidden");
    }

    #[test]
    fn test_empty_company_list() {
        let admin = Principal::new("a@firm.test", Role::Admin);
        let contract = AssignCompaniesContract::new(&admin);
        let err = contract.validate(&data(vec![])).unwrap_err();
        assert_eq!(err.error_code(), "invalid_input");
    }
}
