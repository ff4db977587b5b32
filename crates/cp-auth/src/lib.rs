//! # cp-auth
//!
//! Resolves the [`Principal`](cp_core::types::Principal) behind a request.
//!
//! ## Strategies
//!
//! - JWT bearer token (`Authorization: Bearer ...`)
//! - JWT in the `access_token` cookie
//! - Identity headers set by a trusted gateway (`x-user-email`,
//!   `x-user-role`, `x-company-id`)

pub mod jwt;
pub mod middleware;

pub use jwt::{Claims, JwtError, JwtService};
pub use middleware::{AuthConfig, AuthError, AuthResult, AuthStrategy, Authenticator, RequestHeaders};
