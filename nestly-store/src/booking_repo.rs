use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use nestly_core::booking::{self, BookingCandidate, DateRange};
use nestly_core::models::Booking;
use nestly_core::repository::BookingRepository;
use nestly_core::{CoreError, CoreResult};

use crate::database::db_error;

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: i32,
    spot_id: i32,
    user_id: i32,
    start_date: NaiveDate,
    end_date: NaiveDate,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BookingRow> for Booking {
    fn from(row: BookingRow) -> Self {
        Booking {
            id: row.id,
            spot_id: row.spot_id,
            user_id: row.user_id,
            start_date: row.start_date,
            end_date: row.end_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const BOOKING_COLUMNS: &str = "id, spot_id, user_id, start_date, end_date, created_at, updated_at";

fn spot_not_found() -> CoreError {
    CoreError::NotFound("Spot couldn't be found".to_string())
}

fn booking_not_found() -> CoreError {
    CoreError::NotFound("Booking couldn't be found".to_string())
}

// ============================================================================
// Transaction helpers
// ============================================================================

/// Open a serializable transaction for a booking write.
async fn begin_serializable(pool: &PgPool) -> CoreResult<Transaction<'static, Postgres>> {
    let mut tx = pool.begin().await.map_err(db_error)?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
    Ok(tx)
}

/// Take the spot row lock. Every booking write for a spot queues here, so the
/// overlap scan below always sees the latest committed bookings.
async fn lock_spot(tx: &mut Transaction<'_, Postgres>, spot_id: i32) -> CoreResult<()> {
    let locked: Option<(i32,)> = sqlx::query_as("SELECT id FROM spots WHERE id = $1 FOR UPDATE")
        .bind(spot_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(db_error)?;

    locked.map(|_| ()).ok_or_else(spot_not_found)
}

/// Bookings of `spot_id` whose dates touch `range`.
async fn bookings_touching(
    tx: &mut Transaction<'_, Postgres>,
    spot_id: i32,
    range: &DateRange,
) -> CoreResult<Vec<Booking>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings \
         WHERE spot_id = $1 AND start_date <= $3 AND end_date >= $2 \
         ORDER BY start_date, id"
    );
    let rows = sqlx::query_as::<_, BookingRow>(&sql)
        .bind(spot_id)
        .bind(range.start())
        .bind(range.end())
        .fetch_all(&mut **tx)
        .await
        .map_err(db_error)?;

    Ok(rows.into_iter().map(Booking::from).collect())
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn get_booking(&self, id: i32) -> CoreResult<Option<Booking>> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1");
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(row.map(Booking::from))
    }

    async fn list_by_user(&self, user_id: i32) -> CoreResult<Vec<Booking>> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = $1 ORDER BY start_date, id"
        );
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(rows.into_iter().map(Booking::from).collect())
    }

    async fn list_by_spot(&self, spot_id: i32) -> CoreResult<Vec<Booking>> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE spot_id = $1 ORDER BY start_date, id"
        );
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(spot_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(rows.into_iter().map(Booking::from).collect())
    }

    async fn create_booking(&self, user_id: i32, candidate: BookingCandidate) -> CoreResult<Booking> {
        // 1. Serialize writers on the spot
        let mut tx = begin_serializable(&self.pool).await?;
        lock_spot(&mut tx, candidate.spot_id).await?;

        // 2. Overlap check against what is committed now
        let existing = bookings_touching(&mut tx, candidate.spot_id, &candidate.range).await?;
        booking::validate(&candidate, &existing)?;

        // 3. Insert
        let sql = format!(
            "INSERT INTO bookings (spot_id, user_id, start_date, end_date) \
             VALUES ($1, $2, $3, $4) RETURNING {BOOKING_COLUMNS}"
        );
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(candidate.spot_id)
            .bind(user_id)
            .bind(candidate.range.start())
            .bind(candidate.range.end())
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;

        tracing::info!("Booking {} created for spot {}", row.id, row.spot_id);
        Ok(row.into())
    }

    async fn update_booking(&self, id: i32, range: DateRange) -> CoreResult<Booking> {
        let current = self.get_booking(id).await?.ok_or_else(booking_not_found)?;

        // Spot lock first, then the booking row, same order as delete_spot's cascade
        let mut tx = begin_serializable(&self.pool).await?;
        lock_spot(&mut tx, current.spot_id).await?;

        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1 FOR UPDATE");
        let current: Booking = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error)?
            .ok_or_else(booking_not_found)?
            .into();

        let candidate = BookingCandidate::replacing(&current, range);
        let existing = bookings_touching(&mut tx, current.spot_id, &range).await?;
        booking::validate(&candidate, &existing)?;

        let sql = format!(
            "UPDATE bookings SET start_date = $2, end_date = $3, updated_at = now() \
             WHERE id = $1 RETURNING {BOOKING_COLUMNS}"
        );
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .bind(range.start())
            .bind(range.end())
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;

        tracing::info!("Booking {} moved to {} - {}", id, range.start(), range.end());
        Ok(row.into())
    }

    async fn delete_booking(&self, id: i32) -> CoreResult<()> {
        let result = sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(booking_not_found());
        }
        tracing::info!("Booking {} deleted", id);
        Ok(())
    }
}
