//! API error handling
//!
//! Every failure is answered with `{error, message, details?}` where `error`
//! is the stable code of the underlying [`CoreError`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cp_auth::AuthError;
use cp_core::CoreError;
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug)]
pub struct ApiError(pub CoreError);

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError(err)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError(err.into())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.0.error_code();
        let (message, details) = match &self.0 {
            CoreError::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed");
                ("An internal error occurred".to_string(), None)
            }
            CoreError::InvalidInput(errors) => (
                errors.full_messages().join(", "),
                Some(json!({ "fields": errors.errors, "base": errors.base_errors })),
            ),
            CoreError::NotFound { entity, field, value } => (
                self.0.to_string(),
                Some(json!({ "entity": entity, "field": field, "value": value })),
            ),
            CoreError::DependencyBlocked { entity, id, reasons } => (
                self.0.to_string(),
                Some(json!({ "entityType": entity, "entityId": id, "reasons": reasons })),
            ),
            other => (other.to_string(), None),
        };

        let body = ErrorBody {
            error: code,
            message,
            details,
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
