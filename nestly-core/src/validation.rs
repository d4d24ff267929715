use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{Signup, SpotDraft, SpotFilter, SpotInput, SpotQuery};

pub const MAX_PAGE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 20;
pub const MAX_NAME_LEN: usize = 50;
pub const MIN_USERNAME_LEN: usize = 4;
pub const MAX_USERNAME_LEN: usize = 30;
pub const MAX_EMAIL_LEN: usize = 256;
pub const MAX_PERSON_NAME_LEN: usize = 50;
pub const MAX_ADDRESS_LEN: usize = 255;
pub const MIN_PASSWORD_LEN: usize = 6;

/// Field-keyed validation messages, one message per field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message` for `field`. The first message for a field wins.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `Ok(value)` when nothing was recorded, otherwise `Err(self)`.
    pub fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{joined}")
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Length of the trimmed value in characters, as the columns count it.
fn char_len(value: &str) -> usize {
    value.trim().chars().count()
}

fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
}

// ============================================================================
// Users & Sessions
// ============================================================================

pub fn validate_signup(signup: &Signup) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();

    if !looks_like_email(signup.email.trim()) {
        errors.add("email", "Invalid email");
    } else if char_len(&signup.email) > MAX_EMAIL_LEN {
        errors.add("email", "Email must be 256 characters or fewer");
    }

    let username = signup.username.trim();
    if username.is_empty() {
        errors.add("username", "Username is required");
    } else if looks_like_email(username) {
        errors.add("username", "Username cannot be an email.");
    } else if username.chars().count() < MIN_USERNAME_LEN {
        errors.add("username", "Please provide a username with at least 4 characters.");
    } else if username.chars().count() > MAX_USERNAME_LEN {
        errors.add("username", "Username must be 30 characters or fewer");
    }

    if is_blank(&signup.first_name) {
        errors.add("firstName", "First Name is required");
    } else if char_len(&signup.first_name) > MAX_PERSON_NAME_LEN {
        errors.add("firstName", "First Name must be 50 characters or fewer");
    }
    if is_blank(&signup.last_name) {
        errors.add("lastName", "Last Name is required");
    } else if char_len(&signup.last_name) > MAX_PERSON_NAME_LEN {
        errors.add("lastName", "Last Name must be 50 characters or fewer");
    }
    if signup.password.chars().count() < MIN_PASSWORD_LEN {
        errors.add("password", "Password must be 6 characters or more.");
    }

    errors.into_result(())
}

pub fn validate_login(credential: &str, password: &str) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    if is_blank(credential) {
        errors.add("credential", "Email or username is required");
    }
    if password.is_empty() {
        errors.add("password", "Password is required");
    }
    errors.into_result(())
}

// ============================================================================
// Spots
// ============================================================================

fn lat_in_range(value: f64) -> bool {
    value.is_finite() && (-90.0..=90.0).contains(&value)
}

fn lng_in_range(value: f64) -> bool {
    value.is_finite() && (-180.0..=180.0).contains(&value)
}

/// Check a spot body and produce the trimmed draft that gets persisted.
pub fn validate_spot(input: &SpotInput) -> Result<SpotDraft, FieldErrors> {
    let mut errors = FieldErrors::new();

    if is_blank(&input.address) {
        errors.add("address", "Street address is required");
    }
    if is_blank(&input.city) {
        errors.add("city", "City is required");
    }
    if is_blank(&input.state) {
        errors.add("state", "State is required");
    }
    if is_blank(&input.country) {
        errors.add("country", "Country is required");
    }
    for (field, value) in [
        ("address", &input.address),
        ("city", &input.city),
        ("state", &input.state),
        ("country", &input.country),
    ] {
        if char_len(value) > MAX_ADDRESS_LEN {
            errors.add(field, format!("{field} must be 255 characters or fewer"));
        }
    }

    let lat = input.lat.filter(|v| lat_in_range(*v));
    if lat.is_none() {
        errors.add("lat", "Latitude must be within -90 and 90");
    }
    let lng = input.lng.filter(|v| lng_in_range(*v));
    if lng.is_none() {
        errors.add("lng", "Longitude must be within -180 and 180");
    }

    let name = input.name.trim();
    if name.is_empty() || name.chars().count() >= MAX_NAME_LEN {
        errors.add("name", "Name must be less than 50 characters");
    }
    if is_blank(&input.description) {
        errors.add("description", "Description is required");
    }

    let price = input.price.filter(|p| p.is_finite() && *p > 0.0);
    if price.is_none() {
        errors.add("price", "Price per day must be a positive number");
    }

    match (lat, lng, price) {
        (Some(lat), Some(lng), Some(price)) if errors.is_empty() => Ok(SpotDraft {
            address: input.address.trim().to_string(),
            city: input.city.trim().to_string(),
            state: input.state.trim().to_string(),
            country: input.country.trim().to_string(),
            lat,
            lng,
            name: name.to_string(),
            description: input.description.trim().to_string(),
            price,
        }),
        _ => Err(errors),
    }
}

/// Normalize listing query parameters into a filter with pagination applied.
pub fn validate_spot_query(query: &SpotQuery) -> Result<SpotFilter, FieldErrors> {
    let mut errors = FieldErrors::new();

    let page = match query.page {
        None => 1,
        Some(p) if p >= 1 => p.min(MAX_PAGE as i64) as u32,
        Some(_) => {
            errors.add("page", "Page must be greater than or equal to 1");
            1
        }
    };
    let size = match query.size {
        None => MAX_PAGE_SIZE,
        Some(s) if s >= 1 => s.min(MAX_PAGE_SIZE as i64) as u32,
        Some(_) => {
            errors.add("size", "Size must be greater than or equal to 1");
            MAX_PAGE_SIZE
        }
    };

    if query.min_lat.is_some_and(|v| !lat_in_range(v)) {
        errors.add("minLat", "Minimum latitude is invalid");
    }
    if query.max_lat.is_some_and(|v| !lat_in_range(v)) {
        errors.add("maxLat", "Maximum latitude is invalid");
    }
    if query.min_lng.is_some_and(|v| !lng_in_range(v)) {
        errors.add("minLng", "Minimum longitude is invalid");
    }
    if query.max_lng.is_some_and(|v| !lng_in_range(v)) {
        errors.add("maxLng", "Maximum longitude is invalid");
    }
    if query.min_price.is_some_and(|v| !(v.is_finite() && v >= 0.0)) {
        errors.add("minPrice", "Minimum price must be greater than or equal to 0");
    }
    if query.max_price.is_some_and(|v| !(v.is_finite() && v >= 0.0)) {
        errors.add("maxPrice", "Maximum price must be greater than or equal to 0");
    }

    errors.into_result(SpotFilter {
        page,
        size,
        min_lat: query.min_lat,
        max_lat: query.max_lat,
        min_lng: query.min_lng,
        max_lng: query.max_lng,
        min_price: query.min_price,
        max_price: query.max_price,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup() -> Signup {
        Signup {
            first_name: "Demo".to_string(),
            last_name: "Lition".to_string(),
            email: "demo@user.io".to_string(),
            username: "Demo-lition".to_string(),
            password: "password".to_string(),
        }
    }

    fn spot_input() -> SpotInput {
        SpotInput {
            address: "123 Disney Lane".to_string(),
            city: "San Francisco".to_string(),
            state: "California".to_string(),
            country: "United States of America".to_string(),
            lat: Some(37.7645358),
            lng: Some(-122.4730327),
            name: "App Academy".to_string(),
            description: "Place where web developers are created".to_string(),
            price: Some(123.0),
        }
    }

    #[test]
    fn test_valid_signup() {
        assert!(validate_signup(&signup()).is_ok());
    }

    #[test]
    fn test_signup_collects_every_field() {
        let bad = Signup {
            first_name: " ".to_string(),
            last_name: String::new(),
            email: "not-an-email".to_string(),
            username: "x@y.com".to_string(),
            password: "123".to_string(),
        };
        let errors = validate_signup(&bad).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert_eq!(errors.get("email"), Some("Invalid email"));
        assert_eq!(errors.get("username"), Some("Username cannot be an email."));
        assert_eq!(errors.get("firstName"), Some("First Name is required"));
        assert_eq!(errors.get("lastName"), Some("Last Name is required"));
    }

    #[test]
    fn test_signup_respects_column_limits() {
        let mut long = signup();
        long.username = "u".repeat(31);
        long.first_name = "f".repeat(51);
        long.last_name = "l".repeat(51);
        long.email = format!("{}@user.io", "e".repeat(250));
        let errors = validate_signup(&long).unwrap_err();
        assert_eq!(errors.get("username"), Some("Username must be 30 characters or fewer"));
        assert_eq!(errors.get("firstName"), Some("First Name must be 50 characters or fewer"));
        assert_eq!(errors.get("lastName"), Some("Last Name must be 50 characters or fewer"));
        assert_eq!(errors.get("email"), Some("Email must be 256 characters or fewer"));

        let mut edge = signup();
        edge.username = "u".repeat(30);
        edge.first_name = "f".repeat(50);
        assert!(validate_signup(&edge).is_ok());
    }

    #[test]
    fn test_spot_respects_column_limits() {
        let mut input = spot_input();
        input.address = "a".repeat(256);
        input.country = "c".repeat(256);
        input.city = "c".repeat(255);
        let errors = validate_spot(&input).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get("address"), Some("address must be 255 characters or fewer"));
        assert_eq!(errors.get("country"), Some("country must be 255 characters or fewer"));
    }

    #[test]
    fn test_login_requires_both_fields() {
        let errors = validate_login("", "").unwrap_err();
        assert_eq!(errors.get("credential"), Some("Email or username is required"));
        assert_eq!(errors.get("password"), Some("Password is required"));
        assert!(validate_login("demo@user.io", "password").is_ok());
    }

    #[test]
    fn test_spot_draft_is_trimmed() {
        let mut input = spot_input();
        input.city = "  San Francisco ".to_string();
        let draft = validate_spot(&input).unwrap();
        assert_eq!(draft.city, "San Francisco");
        assert_eq!(draft.price, 123.0);
    }

    #[test]
    fn test_spot_rejects_out_of_range_coordinates() {
        let mut input = spot_input();
        input.lat = Some(91.0);
        input.lng = None;
        input.price = Some(0.0);
        input.name = "x".repeat(50);
        let errors = validate_spot(&input).unwrap_err();
        assert_eq!(errors.get("lat"), Some("Latitude must be within -90 and 90"));
        assert_eq!(errors.get("lng"), Some("Longitude must be within -180 and 180"));
        assert_eq!(errors.get("price"), Some("Price per day must be a positive number"));
        assert_eq!(errors.get("name"), Some("Name must be less than 50 characters"));
    }

    #[test]
    fn test_spot_query_defaults_and_caps() {
        let filter = validate_spot_query(&SpotQuery::default()).unwrap();
        assert_eq!((filter.page, filter.size), (1, 20));

        let query = SpotQuery {
            page: Some(42),
            size: Some(100),
            ..SpotQuery::default()
        };
        let filter = validate_spot_query(&query).unwrap();
        assert_eq!((filter.page, filter.size), (10, 20));
    }

    #[test]
    fn test_spot_query_rejects_bad_bounds() {
        let query = SpotQuery {
            page: Some(0),
            max_lat: Some(120.0),
            min_price: Some(-1.0),
            ..SpotQuery::default()
        };
        let errors = validate_spot_query(&query).unwrap_err();
        assert!(errors.get("page").is_some());
        assert!(errors.get("maxLat").is_some());
        assert!(errors.get("minPrice").is_some());
    }
}
