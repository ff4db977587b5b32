//! Progress read and manual override contracts

use cp_core::error::{CoreResult, ValidationErrors};
use cp_core::traits::Id;
use cp_core::types::{EntityKind, Principal};
use validator::Validate;

use crate::base::{merge_derived, Contract};

#[derive(Debug, Clone, Validate)]
pub struct ProgressOverrideData {
    #[validate(range(min = 0, max = 100, message = "must be between 0 and 100"))]
    pub progress_percentage: i32,
    #[validate(range(min = 0, message = "must not be negative"))]
    pub completed_tasks: Option<i32>,
    #[validate(range(min = 0, message = "must not be negative"))]
    pub total_tasks: Option<i32>,
}

pub struct ProgressOverrideContract<'a> {
    principal: &'a Principal,
    kind: EntityKind,
}

impl<'a> ProgressOverrideContract<'a> {
    pub fn new(principal: &'a Principal, kind: EntityKind) -> Self {
        Self { principal, kind }
    }
}

impl<'a> Contract<ProgressOverrideData> for ProgressOverrideContract<'a> {
    fn authorize(&self) -> CoreResult<()> {
        self.principal.require_staff("override progress")
    }

    fn validate_input(&self, input: &ProgressOverrideData, errors: &mut ValidationErrors) {
        if !self.kind.has_rollup() {
            errors.add("kind", "progress can only be overridden on projects and sub-projects");
        }
        merge_derived(errors, input.validate());
        if let (Some(completed), Some(total)) = (input.completed_tasks, input.total_tasks) {
            if completed > total {
                errors.add("completedTasks", "must not exceed totalTasks");
            }
        }
    }
}

/// Who may read rollups: staff for any company (or all companies), a
/// company principal only for itself.
pub struct ProgressReadContract<'a> {
    principal: &'a Principal,
}

impl<'a> ProgressReadContract<'a> {
    pub fn new(principal: &'a Principal) -> Self {
        Self { principal }
    }
}

impl<'a> Contract<Option<Id>> for ProgressReadContract<'a> {
    fn authorize(&self) -> CoreResult<()> {
        Ok(())
    }

    fn validate_input(&self, _input: &Option<Id>, _errors: &mut ValidationErrors) {}

    fn validate(&self, company_id: &Option<Id>) -> CoreResult<()> {
        match company_id {
            Some(company_id) => self.principal.require_company(*company_id, "read progress"),
            None => self.principal.require_staff("list progress for all companies"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cp_core::types::Role;

    fn consultant() -> Principal {
        Principal::new("c@firm.test", Role::Consultant)
    }

    #[test]
    fn test_override_range() {
        let principal = consultant();
        let contract = ProgressOverrideContract::new(&principal, EntityKind::Project);
        let input = ProgressOverrideData {
            progress_percentage: 101,
            completed_tasks: None,
            total_tasks: None,
        };
        let err = contract.validate(&input).unwrap_err();
        match err {
            cp_core::CoreError::InvalidInput(errors) => {
                assert!(errors.has_error("progress_percentage"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_override_counts() {
        let principal = consultant();
        let contract = ProgressOverrideContract::new(&principal, EntityKind::SubProject);
        let mut input = ProgressOverrideData {
            progress_percentage: 40,
            completed_tasks: Some(5),
            total_tasks: Some(4),
        };
        assert!(contract.validate(&input).is_err());
        input.completed_tasks = Some(2);
        assert!(contract.validate(&input).is_ok());
    }

    #[test]
    fn test_override_rejected_for_tasks() {
        let principal = consultant();
        let contract = ProgressOverrideContract::new(&principal, EntityKind::Task);
        let input = ProgressOverrideData {
            progress_percentage: 40,
            completed_tasks: None,
            total_tasks: None,
        };
        assert!(contract.validate(&input).is_err());
    }

    #[test]
    fn test_read_scope() {
        let company = Principal::company("ops@acme.test", 3);
        let contract = ProgressReadContract::new(&company);
        assert!(contract.validate(&Some(3)).is_ok());
        assert!(contract.validate(&Some(4)).is_err());
        assert!(contract.validate(&None).is_err());

        let staff = consultant();
        assert!(ProgressReadContract::new(&staff).validate(&None).is_ok());
    }
}
