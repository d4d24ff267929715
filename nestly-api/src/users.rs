use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use axum_extra::extract::CookieJar;
use nestly_core::models::{NewUser, SafeUser, Signup};
use nestly_core::validation::validate_signup;

use crate::auth::{hash_password, set_session_cookie};
use crate::error::AppError;
use crate::extract::AppJson;
use crate::session::SessionResponse;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/users", post(signup))
}

/// Create an account and log it in.
async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(payload): AppJson<Signup>,
) -> Result<(StatusCode, CookieJar, Json<SessionResponse>), AppError> {
    validate_signup(&payload)?;

    let password_hash = hash_password(&payload.password)
        .map_err(|e| AppError::InternalServerError(format!("Password hashing failed: {}", e)))?;

    let user = state
        .users
        .create_user(NewUser::from_signup(&payload, password_hash))
        .await?;
    tracing::info!("User {} signed up", user.id);

    let jar = set_session_cookie(&state.auth, jar, &user)?;
    Ok((
        StatusCode::CREATED,
        jar,
        Json(SessionResponse {
            user: Some(SafeUser::from(&user)),
        }),
    ))
}
