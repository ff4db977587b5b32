//! Axum extractors for API handlers

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{
        rejection::QueryRejection,
        FromRef, FromRequest, FromRequestParts, Query, Request,
    },
    http::request::Parts,
    Json,
};
use cp_auth::{Authenticator, RequestHeaders};
use cp_core::types::Principal;
use cp_core::CoreError;
use cp_services::Portal;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub portal: Portal,
    pub authenticator: Arc<Authenticator>,
}

impl AppState {
    pub fn new(portal: Portal, authenticator: Authenticator) -> Self {
        Self {
            portal,
            authenticator: Arc::new(authenticator),
        }
    }
}

/// The caller, resolved once per request
pub struct AuthenticatedPrincipal(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedPrincipal
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let headers = RequestHeaders::from_header_map(&parts.headers);
        let principal = app_state.authenticator.authenticate(&headers).await.into_result()?;
        Ok(AuthenticatedPrincipal(principal))
    }
}

impl std::ops::Deref for AuthenticatedPrincipal {
    type Target = Principal;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// JSON body whose rejections are reported as `invalid_input`
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(CoreError::invalid("body", rejection.body_text()).into()),
        }
    }
}

/// Query string whose rejections are reported as `invalid_input`
pub struct QueryParams<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| QueryParams(value))
            .map_err(|rejection: QueryRejection| CoreError::invalid("query", rejection.body_text()).into())
    }
}
