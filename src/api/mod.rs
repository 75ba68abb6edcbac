//! API layer - HTTP handlers and routing
//!
//! JSON endpoints live under `/api/v1`:
//! - Bude endpoints (public map, owner CRUD)
//! - Evaluation endpoints (likes and dislikes)
//! - Report endpoints
//! - Auth endpoints (current user, logout)
//! - Admin endpoints (Bude management, moderation, internals)
//!
//! The OAuth redirect flows are mounted at the site root.

pub mod admin;
pub mod auth;
pub mod budes;
pub mod evaluations;
pub mod middleware;
pub mod reports;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Json, Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use middleware::{
    cache_control_private, cache_control_public, ApiError, ApiJson, ApiQuery, AppState,
    AuthenticatedAdmin, AuthenticatedUser,
};

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (need an admin session)
    let admin_routes = Router::new()
        .nest("/admin", admin::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_admin,
        ));

    // Protected routes (need a user session)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/budes", budes::protected_router())
        .nest("/evaluations", evaluations::protected_router())
        .nest("/reports", reports::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_user,
        ));

    // Routes that show more to a signed-in user
    let optional_routes = Router::new()
        .nest("/evaluations", evaluations::public_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::optional_user,
        ));

    // Public routes
    Router::new()
        .route("/health", get(health))
        .nest("/budes", budes::public_router())
        .merge(optional_routes)
        .merge(admin_routes)
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    // Cookie auth needs credentials and an exact origin
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);
    match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors = cors.allow_origin(origin),
        Err(_) => tracing::warn!(cors_origin, "Invalid CORS origin, cross-origin requests disabled"),
    }

    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .merge(auth::redirect_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// GET /api/v1/health
async fn health(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    state.pool.ping().await.map_err(ApiError::internal_error)?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}
