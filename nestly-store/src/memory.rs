//! In-process implementation of every repository.
//!
//! Semantics match the Postgres repositories: unique email/username, cascading
//! spot deletes, and booking writes validated under the same lock that
//! performs the write.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use nestly_core::booking::{self, BookingCandidate, DateRange};
use nestly_core::models::{Booking, NewUser, Spot, SpotDraft, SpotFilter, User};
use nestly_core::repository::{BookingRepository, SpotRepository, UserRepository};
use nestly_core::{CoreError, CoreResult};

#[derive(Default)]
struct Tables {
    users: BTreeMap<i32, User>,
    spots: BTreeMap<i32, Spot>,
    bookings: BTreeMap<i32, Booking>,
    next_user_id: i32,
    next_spot_id: i32,
    next_booking_id: i32,
}

fn next_id(counter: &mut i32) -> i32 {
    *counter += 1;
    *counter
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Bookings of `spot_id` in the order the Postgres scan returns them.
fn bookings_of_spot(tables: &Tables, spot_id: i32) -> Vec<&Booking> {
    let mut bookings: Vec<&Booking> = tables
        .bookings
        .values()
        .filter(|b| b.spot_id == spot_id)
        .collect();
    bookings.sort_by_key(|b| (b.start_date, b.id));
    bookings
}

fn spot_not_found() -> CoreError {
    CoreError::NotFound("Spot couldn't be found".to_string())
}

fn booking_not_found() -> CoreError {
    CoreError::NotFound("Booking couldn't be found".to_string())
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, user: NewUser) -> CoreResult<User> {
        let mut tables = self.tables.lock().await;

        if tables.users.values().any(|u| u.email == user.email) {
            return Err(CoreError::AlreadyExists {
                field: "email",
                value: user.email,
            });
        }
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(CoreError::AlreadyExists {
                field: "username",
                value: user.username,
            });
        }

        let now = Utc::now();
        let created = User {
            id: next_id(&mut tables.next_user_id),
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            username: user.username,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_credential(&self, credential: &str) -> CoreResult<Option<User>> {
        let tables = self.tables.lock().await;
        let email = credential.to_lowercase();
        Ok(tables
            .users
            .values()
            .find(|u| u.username == credential || u.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: i32) -> CoreResult<Option<User>> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }
}

#[async_trait]
impl SpotRepository for MemoryStore {
    async fn create_spot(&self, owner_id: i32, draft: SpotDraft) -> CoreResult<Spot> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        let spot = Spot {
            id: next_id(&mut tables.next_spot_id),
            owner_id,
            address: draft.address,
            city: draft.city,
            state: draft.state,
            country: draft.country,
            lat: draft.lat,
            lng: draft.lng,
            name: draft.name,
            description: draft.description,
            price: draft.price,
            created_at: now,
            updated_at: now,
        };
        tables.spots.insert(spot.id, spot.clone());
        Ok(spot)
    }

    async fn get_spot(&self, id: i32) -> CoreResult<Option<Spot>> {
        Ok(self.tables.lock().await.spots.get(&id).cloned())
    }

    async fn list_spots(&self, filter: &SpotFilter) -> CoreResult<Vec<Spot>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .spots
            .values()
            .filter(|s| filter.matches(s))
            .skip(filter.offset() as usize)
            .take(filter.size as usize)
            .cloned()
            .collect())
    }

    async fn list_spots_by_owner(&self, owner_id: i32) -> CoreResult<Vec<Spot>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .spots
            .values()
            .filter(|s| s.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn update_spot(&self, id: i32, draft: SpotDraft) -> CoreResult<Spot> {
        let mut tables = self.tables.lock().await;
        let spot = tables.spots.get_mut(&id).ok_or_else(spot_not_found)?;
        spot.address = draft.address;
        spot.city = draft.city;
        spot.state = draft.state;
        spot.country = draft.country;
        spot.lat = draft.lat;
        spot.lng = draft.lng;
        spot.name = draft.name;
        spot.description = draft.description;
        spot.price = draft.price;
        spot.updated_at = Utc::now();
        Ok(spot.clone())
    }

    async fn delete_spot(&self, id: i32) -> CoreResult<()> {
        let mut tables = self.tables.lock().await;
        tables.spots.remove(&id).ok_or_else(spot_not_found)?;
        tables.bookings.retain(|_, b| b.spot_id != id);
        Ok(())
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn get_booking(&self, id: i32) -> CoreResult<Option<Booking>> {
        Ok(self.tables.lock().await.bookings.get(&id).cloned())
    }

    async fn list_by_user(&self, user_id: i32) -> CoreResult<Vec<Booking>> {
        let tables = self.tables.lock().await;
        let mut bookings: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| (b.start_date, b.id));
        Ok(bookings)
    }

    async fn list_by_spot(&self, spot_id: i32) -> CoreResult<Vec<Booking>> {
        let tables = self.tables.lock().await;
        Ok(bookings_of_spot(&tables, spot_id).into_iter().cloned().collect())
    }

    async fn create_booking(&self, user_id: i32, candidate: BookingCandidate) -> CoreResult<Booking> {
        let mut tables = self.tables.lock().await;
        if !tables.spots.contains_key(&candidate.spot_id) {
            return Err(spot_not_found());
        }

        booking::validate(&candidate, bookings_of_spot(&tables, candidate.spot_id))?;

        let now = Utc::now();
        let created = Booking {
            id: next_id(&mut tables.next_booking_id),
            spot_id: candidate.spot_id,
            user_id,
            start_date: candidate.range.start(),
            end_date: candidate.range.end(),
            created_at: now,
            updated_at: now,
        };
        tables.bookings.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_booking(&self, id: i32, range: DateRange) -> CoreResult<Booking> {
        let mut tables = self.tables.lock().await;
        let current = tables.bookings.get(&id).ok_or_else(booking_not_found)?;

        let candidate = BookingCandidate::replacing(current, range);
        booking::validate(&candidate, bookings_of_spot(&tables, candidate.spot_id))?;

        let updated = tables.bookings.get_mut(&id).ok_or_else(booking_not_found)?;
        updated.start_date = range.start();
        updated.end_date = range.end();
        updated.updated_at = Utc::now();
        Ok(updated.clone())
    }

    async fn delete_booking(&self, id: i32) -> CoreResult<()> {
        let mut tables = self.tables.lock().await;
        tables.bookings.remove(&id).map(|_| ()).ok_or_else(booking_not_found)
    }
}
