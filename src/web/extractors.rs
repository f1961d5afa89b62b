//! Axum extractors for authentication and request bodies.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Json, Request};
use axum::http::header;
use http::HeaderMap;
use http::request::Parts;
use serde::de::DeserializeOwned;

use crate::state::AppState;
use crate::store::models::User;
use crate::store::{StoreError, sessions};
use crate::web::error::ApiError;

/// Pull the opaque bearer token out of the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
}

/// Extractor that resolves the bearer token to an authenticated [`User`].
///
/// Rejects with 401 when the header is missing or the session is unknown or
/// expired; storage trouble surfaces as 503, not as a silent auth failure.
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("missing bearer token"))?;

        let now = state.clock.now();
        match sessions::lookup_session(&state.db_pool, &token, now).await {
            Ok((_, user)) => Ok(AuthUser { user, token }),
            Err(StoreError::NotFound) => Err(ApiError::unauthorized("invalid session token")),
            Err(StoreError::Expired) => Err(ApiError::session_expired()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Optional authentication: `None` when no `Authorization` header is present,
/// but a header that fails to authenticate is still a hard 401.
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if bearer_token(&parts.headers).is_none() {
            return Ok(MaybeAuthUser(None));
        }
        AuthUser::from_request_parts(parts, state)
            .await
            .map(|auth| MaybeAuthUser(Some(auth)))
    }
}

/// JSON body extractor that rejects with the service envelope instead of
/// axum's plain-text default.
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(json_rejection_to_error(rejection)),
        }
    }
}

fn json_rejection_to_error(rejection: JsonRejection) -> ApiError {
    ApiError::invalid_request(rejection.body_text())
}
