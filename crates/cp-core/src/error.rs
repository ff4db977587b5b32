//! Core error types for the consulting portal
//!
//! Every core operation returns `CoreResult<T>`. The variants form the
//! stable taxonomy exposed to API callers.

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::traits::Id;
use crate::types::{BlockReason, EntityKind};

/// Standard Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type for all portal operations
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationErrors),

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Deletion of {entity} {id} is blocked by existing activity")]
    DependencyBlocked {
        entity: EntityKind,
        id: Id,
        reasons: Vec<BlockReason>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        CoreError::Unauthorized {
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        CoreError::Forbidden {
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, field: &'static str, value: impl ToString) -> Self {
        CoreError::NotFound {
            entity,
            field,
            value: value.to_string(),
        }
    }

    /// Single-field input error
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(field, message);
        CoreError::InvalidInput(errors)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        CoreError::Conflict {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CoreError::Internal(message.into())
    }

    /// HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::Unauthorized { .. } => 401,
            CoreError::Forbidden { .. } => 403,
            CoreError::NotFound { .. } => 404,
            CoreError::InvalidInput(_) => 400,
            CoreError::Conflict { .. } => 409,
            CoreError::DependencyBlocked { .. } => 400,
            CoreError::Internal(_) => 500,
        }
    }

    /// Stable machine-readable error string
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::Unauthorized { .. } => "unauthorized",
            CoreError::Forbidden { .. } => "forbidden",
            CoreError::NotFound { .. } => "not_found",
            CoreError::InvalidInput(_) => "invalid_input",
            CoreError::Conflict { .. } => "conflict",
            CoreError::DependencyBlocked { .. } => "dependency_blocked",
            CoreError::Internal(_) => "internal_error",
        }
    }
}

/// Validation errors collection: field-specific messages plus base messages
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    pub errors: BTreeMap<String, Vec<String>>,
    pub base_errors: Vec<String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn add_base(&mut self, message: impl Into<String>) {
        self.base_errors.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.base_errors.is_empty()
    }

    /// Check if there are errors for a specific field
    pub fn has_error(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&Vec<String>> {
        self.errors.get(field)
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, messages) in other.errors {
            self.errors.entry(field).or_default().extend(messages);
        }
        self.base_errors.extend(other.base_errors);
    }

    pub fn full_messages(&self) -> Vec<String> {
        let mut messages = self.base_errors.clone();
        for (field, field_messages) in &self.errors {
            for msg in field_messages {
                messages.push(format!("{} {}", field, msg));
            }
        }
        messages
    }

    /// `Ok(())` when empty, otherwise the collected errors as `InvalidInput`
    pub fn into_result(self) -> CoreResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(CoreError::InvalidInput(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_messages().join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_messages() {
        let mut errors = ValidationErrors::new();
        errors.add("company_ids", "can't be blank");
        errors.add_base("Request is incomplete");

        assert!(errors.has_error("company_ids"));
        assert_eq!(
            errors.full_messages(),
            vec![
                "Request is incomplete".to_string(),
                "company_ids can't be blank".to_string()
            ]
        );
    }

    #[test]
    fn test_into_result() {
        assert!(ValidationErrors::new().into_result().is_ok());

        let mut errors = ValidationErrors::new();
        errors.add("reason", "can't be blank");
        let err = errors.into_result().unwrap_err();
        assert_eq!(err.error_code(), "invalid_input");
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(CoreError::unauthorized("x").status_code(), 401);
        assert_eq!(CoreError::forbidden("x").status_code(), 403);
        assert_eq!(CoreError::not_found("Task", "id", 1).status_code(), 404);
        assert_eq!(CoreError::conflict("x").status_code(), 409);
        assert_eq!(CoreError::internal("x").status_code(), 500);

        let blocked = CoreError::DependencyBlocked {
            entity: EntityKind::SubProject,
            id: 3,
            reasons: vec![],
        };
        assert_eq!(blocked.status_code(), 400);
        assert_eq!(blocked.error_code(), "dependency_blocked");
    }
}
