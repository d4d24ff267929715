use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use nestly_core::models::{Spot, SpotInput, SpotQuery, User};
use nestly_core::validation::{validate_spot, validate_spot_query};
use serde::Serialize;

use crate::error::AppError;
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::middleware::{require_auth, CurrentUser};
use crate::session::MessageResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SpotListResponse {
    #[serde(rename = "Spots")]
    pub spots: Vec<Spot>,
    pub page: u32,
    pub size: u32,
}

#[derive(Debug, Serialize)]
pub struct OwnedSpotsResponse {
    #[serde(rename = "Spots")]
    pub spots: Vec<Spot>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerSummary {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
}

impl From<&User> for OwnerSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SpotDetail {
    #[serde(flatten)]
    pub spot: Spot,
    #[serde(rename = "Owner")]
    pub owner: Option<OwnerSummary>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/spots",
            get(list_spots).merge(
                post(create_spot).route_layer(middleware::from_fn(require_auth)),
            ),
        )
        .route(
            "/spots/current",
            get(list_owned_spots).route_layer(middleware::from_fn(require_auth)),
        )
        .route(
            "/spots/{spot_id}",
            get(get_spot).merge(
                put(update_spot)
                    .delete(delete_spot)
                    .route_layer(middleware::from_fn(require_auth)),
            ),
        )
}

pub(crate) fn spot_not_found() -> AppError {
    AppError::NotFoundError("Spot couldn't be found".to_string())
}

/// Load a spot, 404 when missing.
pub(crate) async fn find_spot(state: &AppState, spot_id: i32) -> Result<Spot, AppError> {
    state.spots.get_spot(spot_id).await?.ok_or_else(spot_not_found)
}

async fn list_spots(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<SpotQuery>,
) -> Result<Json<SpotListResponse>, AppError> {
    let filter = validate_spot_query(&query)?;
    let spots = state.spots.list_spots(&filter).await?;

    Ok(Json(SpotListResponse {
        spots,
        page: filter.page,
        size: filter.size,
    }))
}

async fn list_owned_spots(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<OwnedSpotsResponse>, AppError> {
    let spots = state.spots.list_spots_by_owner(user.id).await?;
    Ok(Json(OwnedSpotsResponse { spots }))
}

async fn get_spot(
    State(state): State<AppState>,
    AppPath(spot_id): AppPath<i32>,
) -> Result<Json<SpotDetail>, AppError> {
    let spot = find_spot(&state, spot_id).await?;
    let owner = state.users.find_by_id(spot.owner_id).await?;

    Ok(Json(SpotDetail {
        owner: owner.as_ref().map(OwnerSummary::from),
        spot,
    }))
}

async fn create_spot(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(payload): AppJson<SpotInput>,
) -> Result<(StatusCode, Json<Spot>), AppError> {
    let draft = validate_spot(&payload)?;
    let spot = state.spots.create_spot(user.id, draft).await?;
    tracing::info!("Spot {} created by user {}", spot.id, user.id);

    Ok((StatusCode::CREATED, Json(spot)))
}

async fn update_spot(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(spot_id): AppPath<i32>,
    AppJson(payload): AppJson<SpotInput>,
) -> Result<Json<Spot>, AppError> {
    // 1. Existence, then ownership
    let spot = find_spot(&state, spot_id).await?;
    if spot.owner_id != user.id {
        return Err(AppError::forbidden());
    }

    // 2. Validate and write
    let draft = validate_spot(&payload)?;
    let spot = state.spots.update_spot(spot.id, draft).await?;
    Ok(Json(spot))
}

async fn delete_spot(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppPath(spot_id): AppPath<i32>,
) -> Result<Json<MessageResponse>, AppError> {
    let spot = find_spot(&state, spot_id).await?;
    if spot.owner_id != user.id {
        return Err(AppError::forbidden());
    }

    state.spots.delete_spot(spot.id).await?;
    tracing::info!("Spot {} deleted by user {}", spot.id, user.id);

    Ok(Json(MessageResponse {
        message: "Successfully deleted",
    }))
}
