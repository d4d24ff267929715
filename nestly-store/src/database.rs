use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::info;

use nestly_core::CoreError;

const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed successfully.");
        Ok(())
    }
}

/// Map a driver error onto the domain error.
///
/// Serialization failures and deadlocks mean a concurrent write won the race;
/// everything else is internal.
pub(crate) fn db_error(err: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db) = &err {
        if matches!(db.code().as_deref(), Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED)) {
            tracing::warn!("Write aborted by a concurrent transaction: {}", db.message());
            return CoreError::Contention(
                "Booking could not be completed, please try again".to_string(),
            );
        }
    }
    tracing::error!("Database error: {}", err);
    CoreError::Internal(err.to_string())
}
