//! # cp-api
//!
//! JSON over HTTP surface of the consulting portal.
//!
//! Handlers resolve the caller through [`extractors::AuthenticatedPrincipal`],
//! call into `cp-services` and map [`CoreError`](cp_core::CoreError) to a
//! response with a stable `error` code.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod routes;

pub use extractors::AppState;
pub use routes::router;
