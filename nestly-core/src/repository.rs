use async_trait::async_trait;

use crate::booking::{BookingCandidate, DateRange};
use crate::models::{Booking, NewUser, Spot, SpotDraft, SpotFilter, User};
use crate::CoreResult;

/// Repository trait for user accounts
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `AlreadyExists` when the email or username is taken.
    async fn create_user(&self, user: NewUser) -> CoreResult<User>;

    /// Look a user up by email or username.
    async fn find_by_credential(&self, credential: &str) -> CoreResult<Option<User>>;

    async fn find_by_id(&self, id: i32) -> CoreResult<Option<User>>;
}

/// Repository trait for spot data access
#[async_trait]
pub trait SpotRepository: Send + Sync {
    async fn create_spot(&self, owner_id: i32, draft: SpotDraft) -> CoreResult<Spot>;

    async fn get_spot(&self, id: i32) -> CoreResult<Option<Spot>>;

    async fn list_spots(&self, filter: &SpotFilter) -> CoreResult<Vec<Spot>>;

    async fn list_spots_by_owner(&self, owner_id: i32) -> CoreResult<Vec<Spot>>;

    async fn update_spot(&self, id: i32, draft: SpotDraft) -> CoreResult<Spot>;

    /// Removes the spot together with its bookings.
    async fn delete_spot(&self, id: i32) -> CoreResult<()>;
}

/// Repository trait for bookings.
///
/// Writes run the overlap validator against the spot's current bookings in
/// the same unit of work as the insert or update, so two overlapping writes
/// cannot both commit.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn get_booking(&self, id: i32) -> CoreResult<Option<Booking>>;

    async fn list_by_user(&self, user_id: i32) -> CoreResult<Vec<Booking>>;

    async fn list_by_spot(&self, spot_id: i32) -> CoreResult<Vec<Booking>>;

    /// Fails with `NotFound` if the spot is gone and `BookingConflict` on overlap.
    async fn create_booking(&self, user_id: i32, candidate: BookingCandidate) -> CoreResult<Booking>;

    async fn update_booking(&self, id: i32, range: DateRange) -> CoreResult<Booking>;

    async fn delete_booking(&self, id: i32) -> CoreResult<()>;
}
