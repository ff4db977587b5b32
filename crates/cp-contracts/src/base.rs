//! Base contract system

use cp_core::error::{CoreResult, ValidationErrors};

/// Contract evaluated before a core operation touches the store.
///
/// `authorize` gates on the principal and fails with `Forbidden`;
/// `validate_input` collects field errors which surface as `InvalidInput`.
pub trait Contract<T>: Send + Sync {
    fn authorize(&self) -> CoreResult<()>;

    fn validate_input(&self, input: &T, errors: &mut ValidationErrors);

    fn validate(&self, input: &T) -> CoreResult<()> {
        self.authorize()?;
        let mut errors = ValidationErrors::new();
        self.validate_input(input, &mut errors);
        errors.into_result()
    }
}

/// Fold `validator` derive output into the portal's error collection
pub fn merge_derived(errors: &mut ValidationErrors, result: Result<(), validator::ValidationErrors>) {
    let Err(derived) = result else {
        return;
    };
    for (field, field_errors) in derived.field_errors() {
        for error in field_errors {
            let message = match &error.message {
                Some(message) => message.to_string(),
                None => format!("is invalid ({})", error.code),
            };
            errors.add(field, message);
        }
    }
}

pub(crate) fn require_text(errors: &mut ValidationErrors, field: &str, value: &str, max: usize) {
    if value.trim().is_empty() {
        errors.add(field, "can't be blank");
    } else if value.chars().count() > max {
        errors.add(field, format!("is too long (maximum is {} characters)", max));
    }
}

pub(crate) fn limit_text(errors: &mut ValidationErrors, field: &str, value: Option<&str>, max: usize) {
    if let Some(value) = value {
        if value.chars().count() > max {
            errors.add(field, format!("is too long (maximum is {} characters)", max));
        }
    }
}
