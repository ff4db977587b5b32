//! Store error type

use std::str::FromStr;

use cp_core::traits::Id;
use cp_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Id },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Cannot decode {column}: {message}")]
    Decode { column: &'static str, message: String },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn not_found(entity: &'static str, id: Id) -> Self {
        StoreError::NotFound { entity, id }
    }

    /// Unique constraint violated at the database level
    pub fn is_unique_violation(&self) -> bool {
        match self {
            StoreError::Conflict(_) => true,
            StoreError::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        if err.is_unique_violation() {
            return CoreError::conflict(match err {
                StoreError::Conflict(message) => message,
                _ => "record already exists".to_string(),
            });
        }
        match err {
            StoreError::NotFound { entity, id } => CoreError::not_found(entity, "id", id),
            other => CoreError::internal(other.to_string()),
        }
    }
}

/// Parse a text column into one of the model enums
pub(crate) fn decode<T>(column: &'static str, value: &str) -> StoreResult<T>
where
    T: FromStr<Err = CoreError>,
{
    value.parse().map_err(|err: CoreError| StoreError::Decode {
        column,
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cp_models::CompletionStatus;

    #[test]
    fn test_mapping_to_core_error() {
        let err: CoreError = StoreError::not_found("Task", 9).into();
        assert_eq!(err.error_code(), "not_found");

        let err: CoreError = StoreError::Conflict("duplicate".into()).into();
        assert_eq!(err.error_code(), "conflict");

        let err: CoreError = StoreError::Database(sqlx::Error::PoolTimedOut).into();
        assert_eq!(err.error_code(), "internal_error");
    }

    #[test]
    fn test_decode() {
        let status: CompletionStatus = decode("status", "approved").unwrap();
        assert_eq!(status, CompletionStatus::Approved);
        assert!(decode::<CompletionStatus>("status", "done").is_err());
    }
}
