use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use nestly_api::{app, state::{AppState, AuthConfig}};
use nestly_core::{BookingCandidate, DateRange};
use serde_json::{json, Value};
use tower::ServiceExt;

// ============================================================================
// Harness
// ============================================================================

fn test_state() -> AppState {
    AppState::in_memory(AuthConfig {
        secret: "test-secret".to_string(),
        expiration: 3600,
        secure_cookies: false,
    })
}

fn test_app() -> Router {
    app(test_state())
}

struct TestResponse {
    status: StatusCode,
    cookie: Option<String>,
    body: Value,
}

async fn send(app: &Router, method: Method, uri: &str, cookie: Option<&str>, body: Option<Value>) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or_default().to_string());
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    TestResponse { status, cookie, body }
}

fn date(offset: i64) -> chrono::NaiveDate {
    Utc::now().date_naive() + Duration::days(offset)
}

fn day(offset: i64) -> String {
    date(offset).format("%Y-%m-%d").to_string()
}

async fn current_user_id(app: &Router, cookie: &str) -> i32 {
    let res = send(app, Method::GET, "/api/session", Some(cookie), None).await;
    res.body["user"]["id"].as_i64().unwrap() as i32
}

async fn signup(app: &Router, username: &str) -> String {
    let res = send(
        app,
        Method::POST,
        "/api/users",
        None,
        Some(json!({
            "firstName": "Test",
            "lastName": "User",
            "email": format!("{username}@example.com"),
            "username": username,
            "password": "password123",
        })),
    )
    .await;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    res.cookie.expect("signup sets the session cookie")
}

async fn create_spot(app: &Router, cookie: &str) -> i64 {
    let res = send(
        app,
        Method::POST,
        "/api/spots",
        Some(cookie),
        Some(json!({
            "address": "123 Disney Lane",
            "city": "San Francisco",
            "state": "California",
            "country": "United States of America",
            "lat": 37.7645358,
            "lng": -122.4730327,
            "name": "App Academy",
            "description": "Place where web developers are created",
            "price": 123,
        })),
    )
    .await;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    res.body["id"].as_i64().unwrap()
}

async fn book(app: &Router, cookie: &str, spot_id: i64, start: i64, end: i64) -> TestResponse {
    send(
        app,
        Method::POST,
        &format!("/api/spots/{spot_id}/bookings"),
        Some(cookie),
        Some(json!({ "startDate": day(start), "endDate": day(end) })),
    )
    .await
}

/// Owner, guest, and a spot owned by the owner.
async fn host_and_guest(app: &Router) -> (String, String, i64) {
    let owner = signup(app, "hostuser").await;
    let guest = signup(app, "guestuser").await;
    let spot_id = create_spot(app, &owner).await;
    (owner, guest, spot_id)
}

// ============================================================================
// Session & Users
// ============================================================================

#[tokio::test]
async fn test_signup_then_restore_session() {
    let app = test_app();
    let cookie = signup(&app, "demouser").await;
    assert!(cookie.starts_with("token="));

    let res = send(&app, Method::GET, "/api/session", Some(&cookie), None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["user"]["username"], "demouser");
    assert_eq!(res.body["user"]["email"], "demouser@example.com");
    assert!(res.body["user"].get("passwordHash").is_none());
}

#[tokio::test]
async fn test_signup_rejects_duplicate_email() {
    let app = test_app();
    signup(&app, "demouser").await;

    let res = send(
        &app,
        Method::POST,
        "/api/users",
        None,
        Some(json!({
            "firstName": "Other",
            "lastName": "Person",
            "email": "DemoUser@example.com",
            "username": "someoneelse",
            "password": "password123",
        })),
    )
    .await;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.body["message"], "User already exists");
    assert_eq!(res.body["errors"]["email"], "User with that email already exists");
}

#[tokio::test]
async fn test_signup_field_errors() {
    let app = test_app();
    let res = send(
        &app,
        Method::POST,
        "/api/users",
        None,
        Some(json!({ "email": "not-an-email", "username": "ab", "password": "123" })),
    )
    .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["message"], "Bad Request");
    assert_eq!(res.body["errors"]["email"], "Invalid email");
    assert!(res.body["errors"]["username"].is_string());
    assert!(res.body["errors"]["password"].is_string());
}

#[tokio::test]
async fn test_login_and_logout() {
    let app = test_app();
    signup(&app, "demouser").await;

    let bad = send(
        &app,
        Method::POST,
        "/api/session",
        None,
        Some(json!({ "credential": "demouser", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(bad.status, StatusCode::UNAUTHORIZED);
    assert_eq!(bad.body["message"], "Invalid credentials");

    let ok = send(
        &app,
        Method::POST,
        "/api/session",
        None,
        Some(json!({ "credential": "demouser@example.com", "password": "password123" })),
    )
    .await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(ok.body["user"]["username"], "demouser");
    let cookie = ok.cookie.unwrap();

    let out = send(&app, Method::DELETE, "/api/session", Some(&cookie), None).await;
    assert_eq!(out.status, StatusCode::OK);
    assert_eq!(out.body["message"], "success");
    assert_eq!(out.cookie.as_deref(), Some("token="));
}

#[tokio::test]
async fn test_invalid_token_is_anonymous() {
    let app = test_app();
    let res = send(&app, Method::GET, "/api/session", Some("token=garbage"), None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body["user"].is_null());
    assert_eq!(res.cookie.as_deref(), Some("token="));
}

#[tokio::test]
async fn test_protected_routes_require_auth() {
    let app = test_app();
    for (method, uri) in [
        (Method::GET, "/api/bookings/current"),
        (Method::GET, "/api/spots/current"),
        (Method::POST, "/api/spots"),
        (Method::POST, "/api/spots/1/bookings"),
        (Method::DELETE, "/api/bookings/1"),
    ] {
        let res = send(&app, method, uri, None, Some(json!({}))).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(res.body["message"], "Authentication required");
    }
}

// ============================================================================
// Spots
// ============================================================================

#[tokio::test]
async fn test_spot_crud_and_listing() {
    let app = test_app();
    let (owner, guest, spot_id) = host_and_guest(&app).await;

    let list = send(&app, Method::GET, "/api/spots?page=1&size=5", None, None).await;
    assert_eq!(list.status, StatusCode::OK);
    assert_eq!(list.body["Spots"].as_array().unwrap().len(), 1);
    assert_eq!(list.body["page"], 1);
    assert_eq!(list.body["size"], 5);

    let detail = send(&app, Method::GET, &format!("/api/spots/{spot_id}"), None, None).await;
    assert_eq!(detail.status, StatusCode::OK);
    assert_eq!(detail.body["Owner"]["firstName"], "Test");

    let forbidden = send(&app, Method::DELETE, &format!("/api/spots/{spot_id}"), Some(&guest), None).await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
    assert_eq!(forbidden.body["message"], "Forbidden");

    let deleted = send(&app, Method::DELETE, &format!("/api/spots/{spot_id}"), Some(&owner), None).await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.body["message"], "Successfully deleted");

    let missing = send(&app, Method::GET, &format!("/api/spots/{spot_id}"), None, None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body["message"], "Spot couldn't be found");
}

#[tokio::test]
async fn test_spot_query_validation() {
    let app = test_app();
    let res = send(&app, Method::GET, "/api/spots?page=0&minPrice=-1", None, None).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.body["errors"]["page"].is_string());
    assert!(res.body["errors"]["minPrice"].is_string());
}

// ============================================================================
// Bookings
// ============================================================================

#[tokio::test]
async fn test_create_booking() {
    let app = test_app();
    let (_, guest, spot_id) = host_and_guest(&app).await;

    let res = book(&app, &guest, spot_id, 10, 15).await;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    assert_eq!(res.body["spotId"], spot_id);
    assert_eq!(res.body["startDate"], day(10));
    assert_eq!(res.body["endDate"], day(15));

    let mine = send(&app, Method::GET, "/api/bookings/current", Some(&guest), None).await;
    assert_eq!(mine.status, StatusCode::OK);
    assert_eq!(mine.body["Bookings"][0]["Spot"]["id"], spot_id);
}

#[tokio::test]
async fn test_owner_cannot_book_own_spot() {
    let app = test_app();
    let (owner, _, spot_id) = host_and_guest(&app).await;

    let res = book(&app, &owner, spot_id, 10, 15).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.body["message"], "Forbidden");
}

#[tokio::test]
async fn test_booking_unknown_spot() {
    let app = test_app();
    let guest = signup(&app, "guestuser").await;
    let res = book(&app, &guest, 999, 10, 15).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["message"], "Spot couldn't be found");
}

#[tokio::test]
async fn test_conflicting_start_date() {
    let app = test_app();
    let (_, guest, spot_id) = host_and_guest(&app).await;
    assert_eq!(book(&app, &guest, spot_id, 10, 15).await.status, StatusCode::CREATED);

    let res = book(&app, &guest, spot_id, 12, 20).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.body["message"], "Sorry, this spot is already booked for the specified dates");
    assert_eq!(res.body["errors"]["startDate"], "Start date conflicts with an existing booking");
    assert!(res.body["errors"].get("endDate").is_none());
}

#[tokio::test]
async fn test_conflicting_end_date() {
    let app = test_app();
    let (_, guest, spot_id) = host_and_guest(&app).await;
    assert_eq!(book(&app, &guest, spot_id, 10, 15).await.status, StatusCode::CREATED);

    // Ends on the first night of the existing stay; boundaries are inclusive
    let res = book(&app, &guest, spot_id, 5, 10).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.body["errors"]["endDate"], "End date conflicts with an existing booking");
    assert!(res.body["errors"].get("startDate").is_none());
}

#[tokio::test]
async fn test_enveloping_booking_conflicts_on_end_date() {
    let app = test_app();
    let (_, guest, spot_id) = host_and_guest(&app).await;
    assert_eq!(book(&app, &guest, spot_id, 10, 15).await.status, StatusCode::CREATED);

    let res = book(&app, &guest, spot_id, 8, 20).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert!(res.body["errors"]["endDate"].is_string());
}

#[tokio::test]
async fn test_adjacent_bookings_are_allowed() {
    let app = test_app();
    let (_, guest, spot_id) = host_and_guest(&app).await;
    assert_eq!(book(&app, &guest, spot_id, 10, 15).await.status, StatusCode::CREATED);
    assert_eq!(book(&app, &guest, spot_id, 16, 20).await.status, StatusCode::CREATED);
    assert_eq!(book(&app, &guest, spot_id, 5, 9).await.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_booking_field_errors() {
    let app = test_app();
    let (_, guest, spot_id) = host_and_guest(&app).await;

    let reversed = book(&app, &guest, spot_id, 15, 10).await;
    assert_eq!(reversed.status, StatusCode::BAD_REQUEST);
    assert_eq!(reversed.body["message"], "Bad Request");
    assert_eq!(reversed.body["errors"]["endDate"], "endDate cannot be on or before startDate");

    let same_day = book(&app, &guest, spot_id, 10, 10).await;
    assert_eq!(same_day.status, StatusCode::BAD_REQUEST);

    let past = book(&app, &guest, spot_id, -3, 2).await;
    assert_eq!(past.status, StatusCode::BAD_REQUEST);
    assert_eq!(past.body["errors"]["startDate"], "startDate cannot be in the past");

    let missing = send(
        &app,
        Method::POST,
        &format!("/api/spots/{spot_id}/bookings"),
        Some(&guest),
        Some(json!({ "startDate": "not-a-date" })),
    )
    .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.body["errors"]["startDate"], "startDate must be a valid date (YYYY-MM-DD)");
    assert_eq!(missing.body["errors"]["endDate"], "endDate is required");
}

#[tokio::test]
async fn test_update_booking_ignores_itself() {
    let app = test_app();
    let (_, guest, spot_id) = host_and_guest(&app).await;
    let created = book(&app, &guest, spot_id, 10, 15).await;
    let booking_id = created.body["id"].as_i64().unwrap();

    let res = send(
        &app,
        Method::PUT,
        &format!("/api/bookings/{booking_id}"),
        Some(&guest),
        Some(json!({ "startDate": day(12), "endDate": day(18) })),
    )
    .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["startDate"], day(12));
    assert_eq!(res.body["endDate"], day(18));
}

#[tokio::test]
async fn test_update_booking_conflicts_with_other() {
    let app = test_app();
    let (_, guest, spot_id) = host_and_guest(&app).await;
    book(&app, &guest, spot_id, 10, 15).await;
    let second = book(&app, &guest, spot_id, 20, 25).await;
    let booking_id = second.body["id"].as_i64().unwrap();

    let res = send(
        &app,
        Method::PUT,
        &format!("/api/bookings/{booking_id}"),
        Some(&guest),
        Some(json!({ "startDate": day(14), "endDate": day(22) })),
    )
    .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert!(res.body["errors"]["startDate"].is_string());
}

#[tokio::test]
async fn test_update_booking_requires_booking_owner() {
    let app = test_app();
    let (owner, guest, spot_id) = host_and_guest(&app).await;
    let created = book(&app, &guest, spot_id, 10, 15).await;
    let booking_id = created.body["id"].as_i64().unwrap();

    let res = send(
        &app,
        Method::PUT,
        &format!("/api/bookings/{booking_id}"),
        Some(&owner),
        Some(json!({ "startDate": day(11), "endDate": day(16) })),
    )
    .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let missing = send(
        &app,
        Method::PUT,
        "/api/bookings/999",
        Some(&guest),
        Some(json!({ "startDate": day(11), "endDate": day(16) })),
    )
    .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body["message"], "Booking couldn't be found");
}

#[tokio::test]
async fn test_spot_bookings_visibility() {
    let app = test_app();
    let (owner, guest, spot_id) = host_and_guest(&app).await;
    book(&app, &guest, spot_id, 10, 15).await;
    let uri = format!("/api/spots/{spot_id}/bookings");

    let as_owner = send(&app, Method::GET, &uri, Some(&owner), None).await;
    assert_eq!(as_owner.status, StatusCode::OK);
    let first = &as_owner.body["Bookings"][0];
    assert_eq!(first["User"]["username"], "guestuser");
    assert!(first["id"].is_number());

    let stranger = signup(&app, "stranger").await;
    let as_other = send(&app, Method::GET, &uri, Some(&stranger), None).await;
    assert_eq!(as_other.status, StatusCode::OK);
    let first = as_other.body["Bookings"][0].as_object().unwrap();
    assert_eq!(first.len(), 3);
    assert_eq!(first["startDate"], day(10));
}

#[tokio::test]
async fn test_delete_booking() {
    let app = test_app();
    let (owner, guest, spot_id) = host_and_guest(&app).await;
    let first = book(&app, &guest, spot_id, 10, 15).await.body["id"].as_i64().unwrap();
    let second = book(&app, &guest, spot_id, 20, 25).await.body["id"].as_i64().unwrap();

    let stranger = signup(&app, "stranger").await;
    let res = send(&app, Method::DELETE, &format!("/api/bookings/{first}"), Some(&stranger), None).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = send(&app, Method::DELETE, &format!("/api/bookings/{first}"), Some(&guest), None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["message"], "Successfully deleted");

    // Spot owner may cancel a guest's booking
    let res = send(&app, Method::DELETE, &format!("/api/bookings/{second}"), Some(&owner), None).await;
    assert_eq!(res.status, StatusCode::OK);

    // The freed dates can be booked again
    assert_eq!(book(&app, &guest, spot_id, 10, 15).await.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_started_booking_cannot_be_deleted() {
    let app = test_app();
    let (_, guest, spot_id) = host_and_guest(&app).await;
    let created = book(&app, &guest, spot_id, 0, 3).await;
    assert_eq!(created.status, StatusCode::CREATED);
    let booking_id = created.body["id"].as_i64().unwrap();

    let res = send(&app, Method::DELETE, &format!("/api/bookings/{booking_id}"), Some(&guest), None).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.body["message"], "Bookings that have been started can't be deleted");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bookings_admit_one() {
    let app = test_app();
    let (_, guest, spot_id) = host_and_guest(&app).await;

    let attempts: Vec<_> = (0..8)
        .map(|_| {
            let app = app.clone();
            let guest = guest.clone();
            tokio::spawn(async move { book(&app, &guest, spot_id, 10, 15).await.status })
        })
        .collect();

    let mut created = 0;
    for handle in attempts {
        match handle.await.unwrap() {
            StatusCode::CREATED => created += 1,
            status => assert_eq!(status, StatusCode::FORBIDDEN),
        }
    }
    assert_eq!(created, 1);
}

#[tokio::test]
async fn test_unknown_route() {
    let app = test_app();
    let res = send(&app, Method::GET, "/api/nowhere", None, None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["message"], "The requested resource couldn't be found.");
}

#[tokio::test]
async fn test_started_booking_keeps_its_dates_on_update() {
    let state = test_state();
    let app = app(state.clone());
    let (_, guest, spot_id) = host_and_guest(&app).await;
    let guest_id = current_user_id(&app, &guest).await;

    // A stay already under way cannot be made through the API
    let range = DateRange::new(date(-2), date(3)).unwrap();
    let stay = state
        .bookings
        .create_booking(guest_id, BookingCandidate::new(spot_id as i32, range))
        .await
        .unwrap();
    let uri = format!("/api/bookings/{}", stay.id);

    let same = send(
        &app,
        Method::PUT,
        &uri,
        Some(&guest),
        Some(json!({ "startDate": day(-2), "endDate": day(3) })),
    )
    .await;
    assert_eq!(same.status, StatusCode::OK, "{}", same.body);
    assert_eq!(same.body["startDate"], day(-2));

    let extended = send(
        &app,
        Method::PUT,
        &uri,
        Some(&guest),
        Some(json!({ "startDate": day(-2), "endDate": day(6) })),
    )
    .await;
    assert_eq!(extended.status, StatusCode::OK, "{}", extended.body);
    assert_eq!(extended.body["endDate"], day(6));

    let moved_back = send(
        &app,
        Method::PUT,
        &uri,
        Some(&guest),
        Some(json!({ "startDate": day(-3), "endDate": day(6) })),
    )
    .await;
    assert_eq!(moved_back.status, StatusCode::BAD_REQUEST);
    assert_eq!(moved_back.body["errors"]["startDate"], "startDate cannot be in the past");
}

#[tokio::test]
async fn test_malformed_requests_use_error_body() {
    let app = test_app();
    let (_, guest, spot_id) = host_and_guest(&app).await;
    let uri = format!("/api/spots/{spot_id}/bookings");

    let wrong_type = send(
        &app,
        Method::POST,
        &uri,
        Some(&guest),
        Some(json!({ "startDate": 20300101, "endDate": day(5) })),
    )
    .await;
    assert_eq!(wrong_type.status, StatusCode::BAD_REQUEST);
    assert_eq!(wrong_type.body["message"], "Bad Request");
    assert!(wrong_type.body["errors"]["body"].as_str().unwrap().contains("startDate"));

    let no_body = send(&app, Method::POST, &uri, Some(&guest), None).await;
    assert_eq!(no_body.status, StatusCode::BAD_REQUEST);
    assert_eq!(no_body.body["message"], "Bad Request");
    assert!(no_body.body["errors"]["body"].is_string());

    let bad_id = send(&app, Method::GET, "/api/spots/abc", None, None).await;
    assert_eq!(bad_id.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad_id.body["message"], "Bad Request");
    assert!(bad_id.body["errors"]["path"].is_string());

    let bad_query = send(&app, Method::GET, "/api/spots?page=first", None, None).await;
    assert_eq!(bad_query.status, StatusCode::BAD_REQUEST);
    assert!(bad_query.body["errors"]["query"].is_string());
}

#[tokio::test]
async fn test_signup_rejects_overlong_username() {
    let app = test_app();
    let username = "u".repeat(31);
    let res = send(
        &app,
        Method::POST,
        "/api/users",
        None,
        Some(json!({
            "firstName": "Test",
            "lastName": "User",
            "email": "long@example.com",
            "username": username,
            "password": "password123",
        })),
    )
    .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["errors"]["username"], "Username must be 30 characters or fewer");
}
