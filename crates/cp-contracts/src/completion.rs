//! Completion and review contracts

use cp_core::error::{CoreResult, ValidationErrors};
use cp_core::traits::Id;
use cp_core::types::Principal;

use crate::base::{limit_text, require_text, Contract};

const NOTE_MAX: usize = 5000;

#[derive(Debug, Clone)]
pub struct StartTaskData {
    pub task_id: Id,
    pub company_id: Id,
}

/// Company-side transitions: start and submit
pub struct CompanyActionContract<'a> {
    principal: &'a Principal,
    company_id: Id,
    action: &'static str,
}

impl<'a> CompanyActionContract<'a> {
    pub fn start(principal: &'a Principal, company_id: Id) -> Self {
        Self {
            principal,
            company_id,
            action: "start tasks",
        }
    }

    pub fn submit(principal: &'a Principal, company_id: Id) -> Self {
        Self {
            principal,
            company_id,
            action: "submit tasks",
        }
    }
}

impl<'a> Contract<StartTaskData> for CompanyActionContract<'a> {
    fn authorize(&self) -> CoreResult<()> {
        self.principal.require_company(self.company_id, self.action)
    }

    fn validate_input(&self, input: &StartTaskData, errors: &mut ValidationErrors) {
        if input.company_id <= 0 {
            errors.add("companyId", "must be a positive id");
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubmitCompletionData {
    pub task_id: Id,
    pub company_id: Id,
    pub completion_note: String,
    pub actual_hours: Option<f64>,
}

impl<'a> Contract<SubmitCompletionData> for CompanyActionContract<'a> {
    fn authorize(&self) -> CoreResult<()> {
        self.principal.require_company(self.company_id, self.action)
    }

    fn validate_input(&self, input: &SubmitCompletionData, errors: &mut ValidationErrors) {
        if input.company_id <= 0 {
            errors.add("companyId", "must be a positive id");
        }
        require_text(errors, "completionNote", &input.completion_note, NOTE_MAX);
        if let Some(hours) = input.actual_hours {
            if !hours.is_finite() || hours < 0.0 {
                errors.add("actualHours", "must be a non-negative number");
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReviewApprovalData {
    pub task_id: Id,
    pub company_id: Option<Id>,
    pub approval_note: Option<String>,
    pub quality_score: Option<i16>,
}

#[derive(Debug, Clone)]
pub struct ReviewRejectionData {
    pub task_id: Id,
    pub company_id: Option<Id>,
    pub rejection_reason: String,
    pub required_actions: Option<String>,
}

/// Reviewer-side transitions: approve and reject
pub struct ReviewContract<'a> {
    principal: &'a Principal,
}

impl<'a> ReviewContract<'a> {
    pub fn new(principal: &'a Principal) -> Self {
        Self { principal }
    }
}

impl<'a> Contract<ReviewApprovalData> for ReviewContract<'a> {
    fn authorize(&self) -> CoreResult<()> {
        self.principal.require_staff("approve submissions")
    }

    fn validate_input(&self, input: &ReviewApprovalData, errors: &mut ValidationErrors) {
        limit_text(errors, "approvalNote", input.approval_note.as_deref(), NOTE_MAX);
        if let Some(score) = input.quality_score {
            if !(1..=5).contains(&score) {
                errors.add("qualityScore", "must be between 1 and 5");
            }
        }
    }
}

impl<'a> Contract<ReviewRejectionData> for ReviewContract<'a> {
    fn authorize(&self) -> CoreResult<()> {
        self.principal.require_staff("reject submissions")
    }

    fn validate_input(&self, input: &ReviewRejectionData, errors: &mut ValidationErrors) {
        require_text(errors, "rejectionReason", &input.rejection_reason, NOTE_MAX);
        limit_text(errors, "requiredActions", input.required_actions.as_deref(), NOTE_MAX);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cp_core::types::Role;

    #[test]
    fn test_submit_requires_note() {
        let company = Principal::company("ops@acme.test", 4);
        let contract = CompanyActionContract::submit(&company, 4);
        let input = SubmitCompletionData {
            task_id: 1,
            company_id: 4,
            completion_note: "  ".to_string(),
            actual_hours: Some(-1.0),
        };
        let err = contract.validate(&input).unwrap_err();
        match err {
            cp_core::CoreError::InvalidInput(errors) => {
                assert!(errors.has_error("completionNote"));
                assert!(errors.has_error("actualHours"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_submit_for_other_company_forbidden() {
        let company = Principal::company("ops@acme.test", 4);
        let contract = CompanyActionContract::submit(&company, 5);
        let input = SubmitCompletionData {
            task_id: 1,
            company_id: 5,
            completion_note: "done".to_string(),
            actual_hours: None,
        };
        assert_eq!(contract.validate(&input).unwrap_err().error_code(), "forbidden");
    }

    #[test]
    fn test_review_requires_staff() {
        let company = Principal::company("ops@acme.test", 4);
        let input = ReviewApprovalData {
            task_id: 1,
            company_id: Some(4),
            approval_note: None,
            quality_score: None,
        };
        let err = ReviewContract::new(&company).validate(&input).unwrap_err();
        assert_eq!(err.error_code(), "forbidden");
    }

    #[test]
    fn test_quality_score_range() {
        let admin = Principal::new("a@firm.test", Role::Admin);
        let mut input = ReviewApprovalData {
            task_id: 1,
            company_id: None,
            approval_note: Some("good".to_string()),
            quality_score: Some(6),
        };
        assert!(ReviewContract::new(&admin).validate(&input).is_err());
        input.quality_score = Some(5);
        assert!(ReviewContract::new(&admin).validate(&input).is_ok());
    }

    #[test]
    fn test_rejection_reason_required() {
        let consultant = Principal::new("c@firm.test", Role::Consultant);
        let input = ReviewRejectionData {
            task_id: 1,
            company_id: None,
            rejection_reason: String::new(),
            required_actions: None,
        };
        let err = ReviewContract::new(&consultant).validate(&input).unwrap_err();
        assert_eq!(err.error_code(), "invalid_input");
    }
}
