use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use jsonwebtoken::{decode, DecodingKey, Validation};
use nestly_core::models::SafeUser;
use serde::{Deserialize, Serialize};

use crate::auth::{clear_session_cookie, TOKEN_COOKIE};
use crate::error::AppError;
use crate::state::{AppState, AuthConfig};

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User id, as a string.
    pub sub: String,
    pub email: String,
    pub username: String,
    pub exp: usize,
}

impl Claims {
    pub fn user_id(&self) -> Option<i32> {
        self.sub.parse().ok()
    }
}

pub fn decode_token(auth: &AuthConfig, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}

// ============================================================================
// Current User
// ============================================================================

/// The user restored from the session cookie.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub SafeUser);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(authentication_required)
    }
}

impl<S> OptionalFromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<CurrentUser>().cloned())
    }
}

fn authentication_required() -> AppError {
    AppError::AuthenticationError("Authentication required".to_string())
}

// ============================================================================
// Session Middleware
// ============================================================================

/// Runs on every request. A valid `token` cookie attaches a [`CurrentUser`];
/// an invalid or stale one is cleared and the request continues anonymously.
pub async fn restore_user(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    // 1. No cookie, nothing to restore
    let Some(token) = jar.get(TOKEN_COOKIE).map(|c| c.value().to_owned()) else {
        return next.run(req).await;
    };

    // 2. Decode and verify the JWT
    let Some(user_id) = decode_token(&state.auth, &token).and_then(|c| c.user_id()) else {
        tracing::debug!("Discarding invalid session token");
        return (clear_session_cookie(jar), next.run(req).await).into_response();
    };

    // 3. Load the user the token points at
    match state.users.find_by_id(user_id).await {
        Ok(Some(user)) => {
            req.extensions_mut().insert(CurrentUser(SafeUser::from(&user)));
            next.run(req).await
        }
        Ok(None) => {
            tracing::debug!("Session token refers to missing user {}", user_id);
            (clear_session_cookie(jar), next.run(req).await).into_response()
        }
        Err(e) => {
            tracing::error!("Failed to restore user {}: {}", user_id, e);
            next.run(req).await
        }
    }
}

/// Rejects the request with 401 unless [`restore_user`] attached a user.
pub async fn require_auth(req: Request, next: Next) -> Result<Response, AppError> {
    if req.extensions().get::<CurrentUser>().is_none() {
        return Err(authentication_required());
    }
    Ok(next.run(req).await)
}
