//! Delete contracts for hierarchy entities

use cp_core::error::{CoreResult, ValidationErrors};
use cp_core::traits::Id;
use cp_core::types::{EntityKind, Principal};

use crate::base::Contract;

#[derive(Debug, Clone, Copy)]
pub struct DeleteData {
    pub kind: EntityKind,
    pub id: Id,
}

/// Only administrators delete. Staff may inspect the deletion report.
pub struct DeleteContract<'a> {
    principal: &'a Principal,
    execute: bool,
}

impl<'a> DeleteContract<'a> {
    pub fn check(principal: &'a Principal) -> Self {
        Self {
            principal,
            execute: false,
        }
    }

    pub fn execute(principal: &'a Principal) -> Self {
        Self {
            principal,
            execute: true,
        }
    }
}

impl<'a> Contract<DeleteData> for DeleteContract<'a> {
    fn authorize(&self) -> CoreResult<()> {
        if self.execute {
            self.principal.require_admin("delete hierarchy entities")
        } else {
            self.principal.require_staff("inspect deletion dependencies")
        }
    }

    fn validate_input(&self, input: &DeleteData, errors: &mut ValidationErrors) {
        if input.id <= 0 {
            errors.add("id", "must be a positive id");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cp_core::types::Role;

    #[test]
    fn test_admin_can_delete() {
        let admin = Principal::new("a@firm.test", Role::MasterAdmin);
        let data = DeleteData {
            kind: EntityKind::Project,
            id: 1,
        };
        assert!(DeleteContract::execute(&admin).validate(&data).is_ok());
    }

    #[test]
    fn test_consultant_can_only_check() {
        let consultant = Principal::new("c@firm.test", Role::Consultant);
        let data = DeleteData {
            kind: EntityKind::SubProject,
            id: 1,
        };
        assert!(DeleteContract::check(&consultant).validate(&data).is_ok());
        let err = DeleteContract::execute(&consultant).validate(&data).unwrap_err();
        assert_eq!(err.error_code(), "forbidden");
    }
}
