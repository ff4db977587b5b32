//! Request authentication
//!
//! Strategies are tried in order. The first one whose credentials are
//! present decides the outcome; an absent credential moves on to the next.

use std::sync::Arc;

use axum::http::HeaderMap;
use cp_core::error::CoreError;
use cp_core::traits::Id;
use cp_core::types::{Principal, Role};
use thiserror::Error;

use crate::jwt::{extract_bearer_token, extract_cookie, JwtError, JwtService};

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const COMPANY_ID_HEADER: &str = "x-company-id";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication required")]
    Required,
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
    #[error("Token expired")]
    TokenExpired,
}

impl From<AuthError> for CoreError {
    fn from(err: AuthError) -> Self {
        CoreError::unauthorized(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    /// `Authorization: Bearer <jwt>`
    Jwt,
    /// JWT in the access token cookie
    Cookie,
    /// Identity headers injected by a trusted gateway
    Gateway,
}

#[derive(Debug)]
pub enum AuthResult {
    Authenticated(Principal),
    Failed(AuthError),
}

impl AuthResult {
    pub fn into_result(self) -> Result<Principal, AuthError> {
        match self {
            Self::Authenticated(principal) => Ok(principal),
            Self::Failed(err) => Err(err),
        }
    }
}

#[derive(Clone, Default)]
pub struct AuthConfig {
    pub jwt_service: Option<Arc<JwtService>>,
    /// Enabled strategies, in order of preference
    pub strategies: Vec<AuthStrategy>,
}

impl AuthConfig {
    /// Bearer token and cookie authentication
    pub fn jwt(service: JwtService) -> Self {
        Self {
            jwt_service: Some(Arc::new(service)),
            strategies: vec![AuthStrategy::Jwt, AuthStrategy::Cookie],
        }
    }

    /// Trust identity headers. Only for deployments behind a gateway that
    /// strips them from client requests.
    pub fn with_gateway_headers(mut self) -> Self {
        if !self.strategies.contains(&AuthStrategy::Gateway) {
            self.strategies.push(AuthStrategy::Gateway);
        }
        self
    }

    pub fn gateway() -> Self {
        Self::default().with_gateway_headers()
    }
}

pub struct Authenticator {
    config: AuthConfig,
}

impl Authenticator {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    pub async fn authenticate(&self, headers: &RequestHeaders) -> AuthResult {
        for strategy in &self.config.strategies {
            let attempt = match strategy {
                AuthStrategy::Jwt => self.try_bearer(headers),
                AuthStrategy::Cookie => self.try_cookie(headers),
                AuthStrategy::Gateway => try_gateway(headers),
            };
            if let Some(result) = attempt {
                if let AuthResult::Failed(err) = &result {
                    tracing::debug!(strategy = ?strategy, error = %err, "Authentication failed");
                }
                return result;
            }
        }
        AuthResult::Failed(AuthError::Required)
    }

    fn try_bearer(&self, headers: &RequestHeaders) -> Option<AuthResult> {
        let token = extract_bearer_token(headers.authorization.as_deref()?)?;
        Some(self.verify(token))
    }

    fn try_cookie(&self, headers: &RequestHeaders) -> Option<AuthResult> {
        let token = extract_cookie(headers.cookie.as_deref()?, ACCESS_TOKEN_COOKIE)?;
        Some(self.verify(token))
    }

    fn verify(&self, token: &str) -> AuthResult {
        let Some(service) = self.config.jwt_service.as_ref() else {
            return AuthResult::Failed(AuthError::InvalidCredentials("token authentication is disabled".to_string()));
        };
        match service.principal(token) {
            Ok(principal) => AuthResult::Authenticated(principal),
            Err(JwtError::Expired) => AuthResult::Failed(AuthError::TokenExpired),
            Err(err) => AuthResult::Failed(AuthError::InvalidCredentials(err.to_string())),
        }
    }
}

fn try_gateway(headers: &RequestHeaders) -> Option<AuthResult> {
    let email = headers.user_email.as_deref()?.trim();
    if email.is_empty() {
        return Some(AuthResult::Failed(AuthError::Required));
    }
    let role: Role = match headers.user_role.as_deref().unwrap_or("company").parse() {
        Ok(role) => role,
        Err(err) => return Some(AuthResult::Failed(AuthError::InvalidCredentials(err.to_string()))),
    };
    let company_id = match headers.company_id.as_deref().map(|v| v.trim().parse::<Id>()) {
        None => None,
        Some(Ok(id)) if id > 0 => Some(id),
        Some(_) => {
            return Some(AuthResult::Failed(AuthError::InvalidCredentials(format!(
                "{} must be a positive integer",
                COMPANY_ID_HEADER
            ))))
        }
    };

    let principal = Principal::new(email, role);
    Some(match (role, company_id) {
        (_, Some(company_id)) => AuthResult::Authenticated(principal.with_company(company_id)),
        (Role::Company, None) => AuthResult::Failed(AuthError::InvalidCredentials(format!(
            "company users need {}",
            COMPANY_ID_HEADER
        ))),
        _ => AuthResult::Authenticated(principal),
    })
}

/// Request headers relevant for authentication
#[derive(Debug, Default)]
pub struct RequestHeaders {
    pub authorization: Option<String>,
    pub cookie: Option<String>,
    pub user_email: Option<String>,
    pub user_role: Option<String>,
    pub company_id: Option<String>,
}

impl RequestHeaders {
    pub fn from_header_map(headers: &HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Self {
            authorization: get("authorization"),
            cookie: get("cookie"),
            user_email: get(USER_EMAIL_HEADER),
            user_role: get(USER_ROLE_HEADER),
            company_id: get(COMPANY_ID_HEADER),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret-key-at-least-32-bytes";

    fn gateway(email: &str, role: Option<&str>, company: Option<&str>) -> RequestHeaders {
        RequestHeaders {
            user_email: Some(email.to_string()),
            user_role: role.map(str::to_string),
            company_id: company.map(str::to_string),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_bearer_authentication() {
        let service = JwtService::new(SECRET);
        let token = service
            .create_token(&Principal::new("c@firm.test", Role::Consultant), 3600)
            .unwrap();
        let authenticator = Authenticator::new(AuthConfig::jwt(JwtService::new(SECRET)));

        let headers = RequestHeaders {
            authorization: Some(format!("Bearer {}", token)),
            ..Default::default()
        };
        let principal = authenticator.authenticate(&headers).await.into_result().unwrap();
        assert_eq!(principal.role, Role::Consultant);
    }

    #[tokio::test]
    async fn test_cookie_authentication() {
        let token = JwtService::new(SECRET)
            .create_token(&Principal::company("ops@acme.test", 3), 3600)
            .unwrap();
        let authenticator = Authenticator::new(AuthConfig::jwt(JwtService::new(SECRET)));

        let headers = RequestHeaders {
            cookie: Some(format!("theme=dark; access_token={}", token)),
            ..Default::default()
        };
        let principal = authenticator.authenticate(&headers).await.into_result().unwrap();
        assert_eq!(principal.company_id, Some(3));
    }

    #[tokio::test]
    async fn test_bad_token_does_not_fall_through() {
        let config = AuthConfig::jwt(JwtService::new(SECRET)).with_gateway_headers();
        let authenticator = Authenticator::new(config);
        let mut headers = gateway("a@firm.test", Some("admin"), None);
        headers.authorization = Some("Bearer not-a-jwt".to_string());

        match authenticator.authenticate(&headers).await {
            AuthResult::Failed(AuthError::InvalidCredentials(_)) => {}
            other => panic!("expected invalid credentials, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_gateway_headers() {
        let authenticator = Authenticator::new(AuthConfig::gateway());

        let admin = authenticator
            .authenticate(&gateway("a@firm.test", Some("Admin"), None))
            .await
            .into_result()
            .unwrap();
        assert!(admin.is_admin());

        let company = authenticator
            .authenticate(&gateway("ops@acme.test", None, Some("7")))
            .await
            .into_result()
            .unwrap();
        assert_eq!(company, Principal::company("ops@acme.test", 7));

        let missing_company = authenticator.authenticate(&gateway("ops@acme.test", None, None)).await;
        assert!(matches!(missing_company, AuthResult::Failed(AuthError::InvalidCredentials(_))));

        let bad_role = authenticator
            .authenticate(&gateway("x@firm.test", Some("superuser"), None))
            .await;
        assert!(matches!(bad_role, AuthResult::Failed(_)));
    }

    #[tokio::test]
    async fn test_gateway_disabled_by_default() {
        let authenticator = Authenticator::new(AuthConfig::jwt(JwtService::new(SECRET)));
        let result = authenticator
            .authenticate(&gateway("a@firm.test", Some("admin"), None))
            .await;
        assert!(matches!(result, AuthResult::Failed(AuthError::Required)));
    }

    #[test]
    fn test_from_header_map() {
        let mut map = HeaderMap::new();
        map.insert("authorization", "Bearer abc".parse().unwrap());
        map.insert("x-company-id", "12".parse().unwrap());

        let headers = RequestHeaders::from_header_map(&map);
        assert_eq!(headers.authorization.as_deref(), Some("Bearer abc"));
        assert_eq!(headers.company_id.as_deref(), Some("12"));
        assert!(headers.cookie.is_none());
    }
}
