use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use nestly_core::models::User;

use crate::error::AppError;
use crate::middleware::auth::Claims;
use crate::state::AuthConfig;

pub const TOKEN_COOKIE: &str = "token";

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

pub fn issue_token(auth: &AuthConfig, user: &User) -> Result<String, AppError> {
    let expires_at = Utc::now()
        .checked_add_signed(auth.token_lifetime()?)
        .ok_or_else(|| AppError::InternalServerError("Token expiry overflow".to_string()))?;
    let claims = Claims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        username: user.username.clone(),
        exp: expires_at.timestamp() as usize,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(auth.secret.as_bytes()))
        .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))
}

/// Sign a token for `user` and add it to the jar as the session cookie.
pub fn set_session_cookie(auth: &AuthConfig, jar: CookieJar, user: &User) -> Result<CookieJar, AppError> {
    let token = issue_token(auth, user)?;
    let lifetime = auth.token_lifetime()?;
    let cookie = Cookie::build((TOKEN_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(auth.secure_cookies)
        .max_age(time::Duration::seconds(lifetime.num_seconds()));

    Ok(jar.add(cookie))
}

pub fn clear_session_cookie(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(TOKEN_COOKIE).path("/"))
}
