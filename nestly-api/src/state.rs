use std::sync::Arc;

use anyhow::anyhow;
use chrono::{TimeDelta, Utc};
use nestly_core::repository::{BookingRepository, SpotRepository, UserRepository};
use nestly_store::{DbClient, MemoryStore, PgBookingRepository, PgSpotRepository, PgUserRepository};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
    pub secure_cookies: bool,
}

impl AuthConfig {
    /// Session lifetime, or an error when `expiration` is zero or too large
    /// to add to the current time.
    pub fn token_lifetime(&self) -> anyhow::Result<TimeDelta> {
        i64::try_from(self.expiration)
            .ok()
            .filter(|secs| *secs > 0)
            .and_then(TimeDelta::try_seconds)
            .filter(|lifetime| Utc::now().checked_add_signed(*lifetime).is_some())
            .ok_or_else(|| anyhow!("auth.jwt_expiration_seconds out of range: {}", self.expiration))
    }
}

impl TryFrom<&nestly_store::app_config::AuthConfig> for AuthConfig {
    type Error = anyhow::Error;

    fn try_from(config: &nestly_store::app_config::AuthConfig) -> anyhow::Result<Self> {
        let auth = Self {
            secret: config.jwt_secret.clone(),
            expiration: config.jwt_expiration_seconds,
            secure_cookies: config.secure_cookies,
        };
        auth.token_lifetime()?;
        Ok(auth)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub spots: Arc<dyn SpotRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub auth: AuthConfig,
}

impl AppState {
    pub fn postgres(db: &DbClient, auth: AuthConfig) -> Self {
        Self {
            users: Arc::new(PgUserRepository::new(db.pool.clone())),
            spots: Arc::new(PgSpotRepository::new(db.pool.clone())),
            bookings: Arc::new(PgBookingRepository::new(db.pool.clone())),
            auth,
        }
    }

    pub fn in_memory(auth: AuthConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            users: store.clone(),
            spots: store.clone(),
            bookings: store,
            auth,
        }
    }
}
