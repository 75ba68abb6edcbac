//! Evaluation API endpoints
//!
//! - GET /api/v1/evaluations/{bude_id} - vote tally, plus own vote when signed in
//! - POST /api/v1/evaluations - cast a vote
//! - PUT /api/v1/evaluations - change a vote
//! - DELETE /api/v1/evaluations/{bude_id} - withdraw a vote

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};

use crate::api::middleware::{
    cache_control_private, cache_control_public, ApiError, ApiJson, AppState, AuthenticatedUser,
};
use crate::models::{EvaluationInput, EvaluationSummary};

/// Routes where the caller may be anonymous
pub fn public_router() -> Router<AppState> {
    Router::new().route("/{bude_id}", get(get_evaluation))
}

/// Routes for signed-in users
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_evaluation).put(update_evaluation))
        .route("/{bude_id}", delete(delete_evaluation))
}

/// GET /api/v1/evaluations/{bude_id}
async fn get_evaluation(
    State(state): State<AppState>,
    Path(bude_id): Path<String>,
    user: Option<AuthenticatedUser>,
) -> Result<([(header::HeaderName, String); 1], Json<EvaluationSummary>), ApiError> {
    let max_age = state.config.cache.evaluation_max_age;
    let cache_control = match user {
        Some(_) => cache_control_private(max_age),
        None => cache_control_public(max_age),
    };

    let summary = state
        .evaluation_service
        .get(&bude_id, user.as_ref().map(|u| u.0.id.as_str()))
        .await?;

    Ok(([(header::CACHE_CONTROL, cache_control)], Json(summary)))
}

/// POST /api/v1/evaluations
async fn create_evaluation(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(input): ApiJson<EvaluationInput>,
) -> Result<StatusCode, ApiError> {
    state
        .evaluation_service
        .set(&user.0.id, &input.id, input.like)
        .await?;
    Ok(StatusCode::CREATED)
}

/// PUT /api/v1/evaluations
async fn update_evaluation(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(input): ApiJson<EvaluationInput>,
) -> Result<StatusCode, ApiError> {
    state
        .evaluation_service
        .update(&user.0.id, &input.id, input.like)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/evaluations/{bude_id}
async fn delete_evaluation(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(bude_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.evaluation_service.delete(&user.0.id, &bude_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
