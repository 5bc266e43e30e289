use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Request},
    http::{header, request::Parts},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::auth::decode_token;
use crate::error::ApiError;
use crate::policy::Actor;
use crate::state::{AppState, run_blocking};

/// Requires a valid bearer token whose user still exists.
#[derive(Debug)]
pub struct AuthUser(pub Actor);

/// Like `AuthUser`, but a request without an Authorization header is
/// anonymous instead of rejected. A present but invalid token is still 401.
#[derive(Debug)]
pub struct MaybeUser(pub Option<Actor>);

impl MaybeUser {
    pub fn id(&self) -> Option<i64> {
        self.0.as_ref().map(|a| a.id)
    }
}

async fn resolve_actor(parts: &mut Parts, state: &AppState) -> Result<Actor, ApiError> {
    let TypedHeader(Authorization(bearer)) =
        TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::Unauthorized)?;

    let claims = decode_token(&state.jwt_secret, bearer.token())?;

    // Reload the user so role changes apply at once and stale tokens die.
    let user_id = claims.sub;
    let user = run_blocking(state, move |db| Ok(db.get_user_by_id(user_id)?))
        .await?
        .ok_or_else(|| {
            warn!("Token for unknown user {}", user_id);
            ApiError::Unauthorized
        })?;

    Ok(Actor {
        id: user.id,
        username: user.username,
        role: user.role,
    })
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        resolve_actor(parts, state).await.map(AuthUser)
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if !parts.headers.contains_key(header::AUTHORIZATION) {
            return Ok(MaybeUser(None));
        }
        resolve_actor(parts, state).await.map(|a| MaybeUser(Some(a)))
    }
}

/// JSON body extractor whose rejections use the API error format.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            warn!("Rejected request body: {}", rejection.body_text());
            ApiError::validation("body", rejection.body_text())
        })?;
        Ok(ApiJson(value))
    }
}
