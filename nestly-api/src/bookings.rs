use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, put},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use nestly_core::booking::{check_booking_dates, check_rescheduled_dates, BookingCandidate};
use nestly_core::models::{Booking, BookingInput, SafeUser, Spot};
use serde::Serialize;

use crate::error::AppError;
use crate::extract::{AppJson, AppPath};
use crate::middleware::{require_auth, CurrentUser};
use crate::session::MessageResponse;
use crate::spots::find_spot;
use crate::state::AppState;

// ============================================================================
// Response shapes
// ============================================================================

#[derive(Debug, Serialize)]
pub struct BookingWithSpot {
    #[serde(flatten)]
    pub booking: Booking,
    #[serde(rename = "Spot")]
    pub spot: Option<Spot>,
}

#[derive(Debug, Serialize)]
pub struct BookingWithGuest {
    #[serde(rename = "User")]
    pub user: Option<SafeUser>,
    #[serde(flatten)]
    pub booking: Booking,
}

/// What a non-owner may see of another guest's booking.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookedDates {
    pub spot_id: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl From<Booking> for BookedDates {
    fn from(booking: Booking) -> Self {
        Self {
            spot_id: booking.spot_id,
            start_date: booking.start_date,
            end_date: booking.end_date,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SpotBookings {
    Owner(Vec<BookingWithGuest>),
    Public(Vec<BookedDates>),
}

#[derive(Debug, Serialize)]
pub struct BookingsResponse<T> {
    #[serde(rename = "Bookings")]
    pub bookings: T,
}

// ============================================================================
// Routes
// ============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/bookings/current", get(list_my_bookings))
        .route("/bookings/{booking_id}", put(update_booking).delete(delete_booking))
        .route(
            "/spots/{spot_id}/bookings",
            get(list_spot_bookings).post(create_booking),
        )
        .route_layer(middleware::from_fn(require_auth))
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn booking_not_found() -> AppError {
    AppError::NotFoundError("Booking couldn't be found".to_string())
}

async fn find_booking(state: &AppState, booking_id: i32) -> Result<Booking, AppError> {
    state
        .bookings
        .get_booking(booking_id)
        .await?
        .ok_or_else(booking_not_found)
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_my_bookings(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<BookingsResponse<Vec<BookingWithSpot>>>, AppError> {
    let bookings = state.bookings.list_by_user(user.id).await?;

    let mut out = Vec::with_capacity(bookings.len());
    for booking in bookings {
        let spot = state.spots.get_spot(booking.spot_id).await?;
        out.push(BookingWithSpot { booking, spot });
    }

    Ok(Json(BookingsResponse { bookings: out }))
}

async fn list_spot_bookings(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(spot_id): AppPath<i32>,
) -> Result<Json<BookingsResponse<SpotBookings>>, AppError> {
    let spot = find_spot(&state, spot_id).await?;
    let bookings = state.bookings.list_by_spot(spot.id).await?;

    if spot.owner_id != user.id {
        let dates = bookings.into_iter().map(BookedDates::from).collect();
        return Ok(Json(BookingsResponse {
            bookings: SpotBookings::Public(dates),
        }));
    }

    let mut out = Vec::with_capacity(bookings.len());
    for booking in bookings {
        let guest = state.users.find_by_id(booking.user_id).await?;
        out.push(BookingWithGuest {
            user: guest.as_ref().map(SafeUser::from),
            booking,
        });
    }

    Ok(Json(BookingsResponse {
        bookings: SpotBookings::Owner(out),
    }))
}

async fn create_booking(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(spot_id): AppPath<i32>,
    AppJson(payload): AppJson<BookingInput>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    // 1. Spot must exist and belong to someone else
    let spot = find_spot(&state, spot_id).await?;
    if spot.owner_id == user.id {
        return Err(AppError::forbidden());
    }

    // 2. Field-level date checks
    let range = check_booking_dates(&payload, today())?;

    // 3. Overlap check and insert happen together in the repository
    let booking = state
        .bookings
        .create_booking(user.id, BookingCandidate::new(spot.id, range))
        .await?;

    Ok((StatusCode::CREATED, Json(booking)))
}

async fn update_booking(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(booking_id): AppPath<i32>,
    AppJson(payload): AppJson<BookingInput>,
) -> Result<Json<Booking>, AppError> {
    let today = today();

    // 1. Existence, ownership, not already over
    let booking = find_booking(&state, booking_id).await?;
    if booking.user_id != user.id {
        return Err(AppError::forbidden());
    }
    if booking.end_date < today {
        return Err(AppError::AuthorizationError(
            "Past bookings can't be modified".to_string(),
        ));
    }

    // 2. New dates, checked against every other booking of the spot
    let range = check_rescheduled_dates(&payload, today, &booking)?;
    let booking = state.bookings.update_booking(booking.id, range).await?;

    Ok(Json(booking))
}

async fn delete_booking(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(booking_id): AppPath<i32>,
) -> Result<Json<MessageResponse>, AppError> {
    let booking = find_booking(&state, booking_id).await?;

    // Guest or spot owner
    if booking.user_id != user.id {
        let spot = state.spots.get_spot(booking.spot_id).await?;
        if spot.map_or(true, |s| s.owner_id != user.id) {
            return Err(AppError::forbidden());
        }
    }

    if booking.start_date <= today() {
        return Err(AppError::AuthorizationError(
            "Bookings that have been started can't be deleted".to_string(),
        ));
    }

    state.bookings.delete_booking(booking.id).await?;
    tracing::info!("Booking {} deleted by user {}", booking.id, user.id);

    Ok(Json(MessageResponse {
        message: "Successfully deleted",
    }))
}
