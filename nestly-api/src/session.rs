use axum::{extract::State, routing::get, Json, Router};
use axum_extra::extract::CookieJar;
use nestly_core::models::SafeUser;
use nestly_core::validation::validate_login;
use serde::{Deserialize, Serialize};

use crate::auth::{clear_session_cookie, set_session_cookie, verify_password};
use crate::error::AppError;
use crate::extract::AppJson;
use crate::middleware::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    /// Username or email.
    pub credential: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: Option<SafeUser>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/session", get(current_session).post(login).delete(logout))
}

async fn current_session(user: Option<CurrentUser>) -> Json<SessionResponse> {
    Json(SessionResponse {
        user: user.map(|CurrentUser(u)| u),
    })
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<(CookieJar, Json<SessionResponse>), AppError> {
    // 1. Shape checks
    validate_login(&payload.credential, &payload.password)?;

    // 2. Look up and verify; unknown user and wrong password look the same
    let user = state
        .users
        .find_by_credential(payload.credential.trim())
        .await?
        .filter(|u| verify_password(&payload.password, &u.password_hash))
        .ok_or_else(|| AppError::AuthenticationError("Invalid credentials".to_string()))?;

    // 3. Issue the session cookie
    let jar = set_session_cookie(&state.auth, jar, &user)?;
    tracing::info!("User {} logged in", user.id);

    Ok((
        jar,
        Json(SessionResponse {
            user: Some(SafeUser::from(&user)),
        }),
    ))
}

async fn logout(jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    (clear_session_cookie(jar), Json(MessageResponse { message: "success" }))
}
