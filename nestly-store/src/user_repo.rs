use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use nestly_core::models::{NewUser, User};
use nestly_core::repository::UserRepository;
use nestly_core::{CoreError, CoreResult};

use crate::database::db_error;

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i32,
    first_name: String,
    last_name: String,
    email: String,
    username: String,
    hashed_password: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            username: row.username,
            password_hash: row.hashed_password,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Translate a unique violation on `users` into the field that collided.
fn duplicate_user(err: &sqlx::Error, user: &NewUser) -> Option<CoreError> {
    let sqlx::Error::Database(db) = err else {
        return None;
    };
    if !db.is_unique_violation() {
        return None;
    }
    let duplicate = match db.constraint() {
        Some("users_username_key") => CoreError::AlreadyExists {
            field: "username",
            value: user.username.clone(),
        },
        _ => CoreError::AlreadyExists {
            field: "email",
            value: user.email.clone(),
        },
    };
    Some(duplicate)
}

const USER_COLUMNS: &str =
    "id, first_name, last_name, email, username, hashed_password, created_at, updated_at";

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create_user(&self, user: NewUser) -> CoreResult<User> {
        let sql = format!(
            "INSERT INTO users (first_name, last_name, email, username, hashed_password) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.email)
            .bind(&user.username)
            .bind(&user.password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| duplicate_user(&e, &user).unwrap_or_else(|| db_error(e)))?;

        Ok(row.into())
    }

    async fn find_by_credential(&self, credential: &str) -> CoreResult<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1 OR email = lower($1) LIMIT 1"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(credential)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(row.map(User::from))
    }

    async fn find_by_id(&self, id: i32) -> CoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(row.map(User::from))
    }
}
