use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};

use crate::{access::AccessControl, error::ApiError, models::Identity, token::extract_bearer};

/// AuthUser Extractor Result
///
/// The resolved identity of an authenticated request. Using it as a handler
/// argument makes the route mandatory-auth: absent, invalid, expired or
/// orphaned tokens are rejected with 401 before the handler runs.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

/// MaybeAuthUser Extractor Result
///
/// Optional authentication for public routes. A missing or unusable token
/// resolves to `None` (anonymous) instead of rejecting the request.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<Identity>);

/// Reads the token from `Authorization: Bearer <token>`. Any other scheme
/// counts as no token.
fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_bearer)
        .map(str::to_owned)
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AccessControl: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let access = AccessControl::from_ref(state);
        let token = bearer_token(parts);
        access.authenticate(token.as_deref()).await.map(AuthUser)
    }
}

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
    AccessControl: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let access = AccessControl::from_ref(state);
        let token = bearer_token(parts);
        access
            .authenticate_optional(token.as_deref())
            .await
            .map(MaybeAuthUser)
    }
}
