use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use nestly_core::models::{Spot, SpotDraft, SpotFilter};
use nestly_core::repository::SpotRepository;
use nestly_core::{CoreError, CoreResult};

use crate::database::db_error;

pub struct PgSpotRepository {
    pool: PgPool,
}

impl PgSpotRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SpotRow {
    id: i32,
    owner_id: i32,
    address: String,
    city: String,
    state: String,
    country: String,
    lat: f64,
    lng: f64,
    name: String,
    description: String,
    price: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SpotRow> for Spot {
    fn from(row: SpotRow) -> Self {
        Spot {
            id: row.id,
            owner_id: row.owner_id,
            address: row.address,
            city: row.city,
            state: row.state,
            country: row.country,
            lat: row.lat,
            lng: row.lng,
            name: row.name,
            description: row.description,
            price: row.price,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SPOT_COLUMNS: &str = "id, owner_id, address, city, state, country, lat, lng, name, \
     description, price, created_at, updated_at";

#[async_trait]
impl SpotRepository for PgSpotRepository {
    async fn create_spot(&self, owner_id: i32, draft: SpotDraft) -> CoreResult<Spot> {
        let sql = format!(
            "INSERT INTO spots (owner_id, address, city, state, country, lat, lng, name, description, price) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {SPOT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, SpotRow>(&sql)
            .bind(owner_id)
            .bind(&draft.address)
            .bind(&draft.city)
            .bind(&draft.state)
            .bind(&draft.country)
            .bind(draft.lat)
            .bind(draft.lng)
            .bind(&draft.name)
            .bind(&draft.description)
            .bind(draft.price)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;

        tracing::info!("Spot {} created by user {}", row.id, owner_id);
        Ok(row.into())
    }

    async fn get_spot(&self, id: i32) -> CoreResult<Option<Spot>> {
        let sql = format!("SELECT {SPOT_COLUMNS} FROM spots WHERE id = $1");
        let row = sqlx::query_as::<_, SpotRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(row.map(Spot::from))
    }

    async fn list_spots(&self, filter: &SpotFilter) -> CoreResult<Vec<Spot>> {
        // Unset bounds bind as NULL and drop out of the predicate
        let sql = format!(
            r#"
            SELECT {SPOT_COLUMNS} FROM spots
            WHERE ($1::float8 IS NULL OR lat >= $1)
              AND ($2::float8 IS NULL OR lat <= $2)
              AND ($3::float8 IS NULL OR lng >= $3)
              AND ($4::float8 IS NULL OR lng <= $4)
              AND ($5::float8 IS NULL OR price >= $5)
              AND ($6::float8 IS NULL OR price <= $6)
            ORDER BY id
            LIMIT $7 OFFSET $8
            "#
        );
        let rows = sqlx::query_as::<_, SpotRow>(&sql)
            .bind(filter.min_lat)
            .bind(filter.max_lat)
            .bind(filter.min_lng)
            .bind(filter.max_lng)
            .bind(filter.min_price)
            .bind(filter.max_price)
            .bind(i64::from(filter.size))
            .bind(i64::from(filter.offset()))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(rows.into_iter().map(Spot::from).collect())
    }

    async fn list_spots_by_owner(&self, owner_id: i32) -> CoreResult<Vec<Spot>> {
        let sql = format!("SELECT {SPOT_COLUMNS} FROM spots WHERE owner_id = $1 ORDER BY id");
        let rows = sqlx::query_as::<_, SpotRow>(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(rows.into_iter().map(Spot::from).collect())
    }

    async fn update_spot(&self, id: i32, draft: SpotDraft) -> CoreResult<Spot> {
        let sql = format!(
            r#"
            UPDATE spots
            SET address = $2, city = $3, state = $4, country = $5, lat = $6, lng = $7,
                name = $8, description = $9, price = $10, updated_at = now()
            WHERE id = $1
            RETURNING {SPOT_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, SpotRow>(&sql)
            .bind(id)
            .bind(&draft.address)
            .bind(&draft.city)
            .bind(&draft.state)
            .bind(&draft.country)
            .bind(draft.lat)
            .bind(draft.lng)
            .bind(&draft.name)
            .bind(&draft.description)
            .bind(draft.price)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .ok_or_else(|| CoreError::NotFound("Spot couldn't be found".to_string()))?;

        Ok(row.into())
    }

    async fn delete_spot(&self, id: i32) -> CoreResult<()> {
        // bookings go with it via ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM spots WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound("Spot couldn't be found".to_string()));
        }
        tracing::info!("Spot {} deleted", id);
        Ok(())
    }
}
