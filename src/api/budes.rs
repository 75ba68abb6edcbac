//! Bude API endpoints
//!
//! - GET /api/v1/budes - active Budes for the map
//! - GET/POST/PUT/DELETE /api/v1/budes/own - the caller's own Bude

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::api::middleware::{ApiError, ApiJson, AppState, AuthenticatedUser};
use crate::models::{Bude, BudeInput, PublicBude};

/// Public routes
pub fn public_router() -> Router<AppState> {
    Router::new().route("/", get(list_budes))
}

/// Routes for signed-in users
pub fn protected_router() -> Router<AppState> {
    Router::new().route(
        "/own",
        get(get_own).post(create_own).put(update_own).delete(delete_own),
    )
}

/// GET /api/v1/budes
async fn list_budes(State(state): State<AppState>) -> Result<Json<Vec<PublicBude>>, ApiError> {
    Ok(Json(state.bude_service.list_active().await?))
}

/// GET /api/v1/budes/own - `null` when the caller owns none
async fn get_own(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Option<Bude>>, ApiError> {
    Ok(Json(state.bude_service.own(&user.0.id).await?))
}

/// POST /api/v1/budes/own
async fn create_own(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(input): ApiJson<BudeInput>,
) -> Result<(StatusCode, Json<Bude>), ApiError> {
    let bude = state.bude_service.add(&user.0.id, input).await?;
    Ok((StatusCode::CREATED, Json(bude)))
}

/// PUT /api/v1/budes/own
async fn update_own(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(input): ApiJson<BudeInput>,
) -> Result<Json<Bude>, ApiError> {
    Ok(Json(state.bude_service.update(&user.0.id, input).await?))
}

/// DELETE /api/v1/budes/own
async fn delete_own(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<StatusCode, ApiError> {
    state.bude_service.delete(&user.0.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
