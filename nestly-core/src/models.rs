use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public projection of a user; never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeUser {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
}

impl From<&User> for SafeUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            username: user.username.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Signup {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
}

impl NewUser {
    pub fn from_signup(signup: &Signup, password_hash: String) -> Self {
        Self {
            first_name: signup.first_name.trim().to_string(),
            last_name: signup.last_name.trim().to_string(),
            email: signup.email.trim().to_lowercase(),
            username: signup.username.trim().to_string(),
            password_hash,
        }
    }
}

// ============================================================================
// Spots
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spot {
    pub id: i32,
    pub owner_id: i32,
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub lat: f64,
    pub lng: f64,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw spot body as sent by clients. Missing fields are reported by validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpotInput {
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub name: String,
    pub description: String,
    pub price: Option<f64>,
}

/// A validated spot ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct SpotDraft {
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub lat: f64,
    pub lng: f64,
    pub name: String,
    pub description: String,
    pub price: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotQuery {
    pub page: Option<i64>,
    pub size: Option<i64>,
    pub min_lat: Option<f64>,
    pub max_lat: Option<f64>,
    pub min_lng: Option<f64>,
    pub max_lng: Option<f64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpotFilter {
    pub page: u32,
    pub size: u32,
    pub min_lat: Option<f64>,
    pub max_lat: Option<f64>,
    pub min_lng: Option<f64>,
    pub max_lng: Option<f64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

impl SpotFilter {
    pub fn offset(&self) -> u32 {
        (self.page - 1) * self.size
    }

    pub fn matches(&self, spot: &Spot) -> bool {
        self.min_lat.map_or(true, |v| spot.lat >= v)
            && self.max_lat.map_or(true, |v| spot.lat <= v)
            && self.min_lng.map_or(true, |v| spot.lng >= v)
            && self.max_lng.map_or(true, |v| spot.lng <= v)
            && self.min_price.map_or(true, |v| spot.price >= v)
            && self.max_price.map_or(true, |v| spot.price <= v)
    }
}

impl Default for SpotFilter {
    fn default() -> Self {
        Self {
            page: 1,
            size: crate::validation::MAX_PAGE_SIZE,
            min_lat: None,
            max_lat: None,
            min_lng: None,
            max_lng: None,
            min_price: None,
            max_price: None,
        }
    }
}

// ============================================================================
// Bookings
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: i32,
    pub spot_id: i32,
    pub user_id: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Booking body as sent by clients; dates arrive as `YYYY-MM-DD` strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookingInput {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}
