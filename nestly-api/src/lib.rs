use axum::{http::Method, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod bookings;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod session;
pub mod spots;
pub mod state;
pub mod users;

pub use state::AppState;

use crate::error::AppError;

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let api = Router::new()
        .merge(session::routes())
        .merge(users::routes())
        .merge(spots::routes())
        .merge(bookings::routes());

    Router::new()
        .nest("/api", api)
        .fallback(not_found)
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::restore_user))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> AppError {
    AppError::NotFoundError("The requested resource couldn't be found.".to_string())
}
