//! JWT authentication

use chrono::Utc;
use cp_core::traits::Id;
use cp_core::types::{Principal, Role};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user email)
    pub sub: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl Claims {
    /// Principal named by the claims
    ///
    /// Company users must carry a company id.
    pub fn principal(&self) -> Result<Principal, JwtError> {
        let role: Role = self
            .role
            .parse()
            .map_err(|_| JwtError::Invalid(format!("unknown role '{}'", self.role)))?;
        let principal = Principal::new(self.sub.clone(), role);
        match (role, self.company_id) {
            (_, Some(company_id)) => Ok(principal.with_company(company_id)),
            (Role::Company, None) => Err(JwtError::Invalid("company token without company_id".to_string())),
            _ => Ok(principal),
        }
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Token is expired")]
    Expired,
    #[error("Invalid token: {0}")]
    Invalid(String),
    #[error("Token encoding failed: {0}")]
    EncodingFailed(String),
}

/// Issues and validates HS256 tokens
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: Option<String>,
}

impl JwtService {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: None,
        }
    }

    /// Set the issuer written into and required from tokens
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn create_token(&self, principal: &Principal, expires_in_seconds: i64) -> Result<String, JwtError> {
        let now = Utc::now().timestamp().max(0) as usize;
        let claims = Claims {
            sub: principal.email.clone(),
            role: principal.role.as_str().to_string(),
            company_id: principal.company_id,
            iss: self.issuer.clone(),
            exp: now + expires_in_seconds.max(0) as usize,
            iat: now,
            jti: Some(uuid::Uuid::new_v4().to_string()),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingFailed(e.to_string()))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::default();
        if let Some(ref issuer) = self.issuer {
            validation.set_issuer(&[issuer.clone()]);
        }

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
            _ => JwtError::Invalid(e.to_string()),
        })?;

        Ok(token_data.claims)
    }

    /// Validate a token and resolve its principal
    pub fn principal(&self, token: &str) -> Result<Principal, JwtError> {
        self.validate_token(token)?.principal()
    }
}

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(authorization: &str) -> Option<&str> {
    let (scheme, token) = authorization.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") {
        Some(token.trim())
    } else {
        None
    }
}

/// Value of a cookie from a `Cookie` header
pub fn extract_cookie<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    cookie_header.split(';').find_map(|part| {
        let (key, value) = part.trim().split_once('=')?;
        (key.trim() == name).then(|| value.trim())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret-key-at-least-32-bytes";

    #[test]
    fn test_create_and_validate_token() {
        let service = JwtService::new(SECRET).with_issuer("consulting-portal");
        let token = service
            .create_token(&Principal::company("ops@acme.test", 4), 3600)
            .unwrap();

        let claims = service.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "ops@acme.test");
        assert_eq!(claims.role, "company");
        assert_eq!(claims.company_id, Some(4));

        let principal = service.principal(&token).unwrap();
        assert_eq!(principal, Principal::company("ops@acme.test", 4));
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let token = JwtService::new(SECRET)
            .with_issuer("someone-else")
            .create_token(&Principal::new("a@firm.test", Role::Admin), 3600)
            .unwrap();
        let service = JwtService::new(SECRET).with_issuer("consulting-portal");
        assert!(matches!(service.validate_token(&token), Err(JwtError::Invalid(_))));
    }

    #[test]
    fn test_company_claims_need_company_id() {
        let claims = Claims {
            sub: "ops@acme.test".to_string(),
            role: "company".to_string(),
            company_id: None,
            iss: None,
            exp: 0,
            iat: 0,
            jti: None,
        };
        assert!(claims.principal().is_err());
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer_token("bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer_token("Basic abc123"), None);
    }

    #[test]
    fn test_extract_cookie() {
        let header = "theme=dark; access_token=abc.def.ghi; lang=en";
        assert_eq!(extract_cookie(header, "access_token"), Some("abc.def.ghi"));
        assert_eq!(extract_cookie(header, "session"), None);
    }
}
