//! Authentication endpoints
//!
//! Browser redirect flows at the site root:
//! - GET /auth/login, GET /auth/callback - user sign-in through the OAuth provider
//! - GET /admin/login, GET /admin/auth - admin sign-in
//! - POST /admin/signout - admin sign-out
//!
//! JSON endpoints under /api/v1/auth:
//! - GET /me - current user
//! - POST /logout - end the user session
//!
//! The redirect flows never answer with an error body: any failure is
//! logged and the browser is sent back to `/`.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{
    clear_cookie, extract_cookie, extract_session_token, session_cookie, ApiError, AppState,
    AuthenticatedUser, ADMIN_SESSION_COOKIE, AUTH_STATE_COOKIE, USER_SESSION_COOKIE,
};
use crate::models::User;
use crate::services::AuthServiceError;

/// Lifetime of the `auth_state` cookie, seconds
const AUTH_STATE_MAX_AGE: i64 = 600;

const USER_CALLBACK_PATH: &str = "/auth/callback";
const ADMIN_CALLBACK_PATH: &str = "/admin/auth";

/// Query string the provider sends back to the callback
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Root-level redirect routes
pub fn redirect_router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", get(user_login))
        .route(USER_CALLBACK_PATH, get(user_callback))
        .route("/admin/login", get(admin_login))
        .route(ADMIN_CALLBACK_PATH, get(admin_callback))
        .route("/admin/signout", post(admin_signout))
}

/// Routes under /api/v1/auth (behind the user middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_current_user))
        .route("/logout", post(logout))
}

fn redirect_uri(state: &AppState, path: &str) -> String {
    format!("{}{}", state.config.server.origin(), path)
}

/// Store a fresh `state` value and send the browser to the provider
fn start_oauth(state: &AppState, callback_path: &str) -> Response {
    let oauth_state = uuid::Uuid::new_v4().simple().to_string();
    let url = state
        .auth_service
        .authorize_url(&oauth_state, &redirect_uri(state, callback_path));

    (
        AppendHeaders([(
            header::SET_COOKIE,
            session_cookie(AUTH_STATE_COOKIE, &oauth_state, AUTH_STATE_MAX_AGE),
        )]),
        Redirect::to(&url),
    )
        .into_response()
}

/// Check the callback against the `auth_state` cookie and pull out the code
fn callback_code(headers: &HeaderMap, query: CallbackQuery) -> Option<String> {
    let expected = extract_cookie(headers, AUTH_STATE_COOKIE);
    if expected.is_none() || query.state != expected {
        tracing::warn!("OAuth callback rejected: state mismatch");
        return None;
    }
    if let Some(error) = query.error {
        tracing::warn!(%error, "OAuth callback rejected by provider");
        return None;
    }
    query.code.filter(|code| !code.is_empty())
}

/// Redirect to `/` and drop the `auth_state` cookie
fn abort_to_root() -> Response {
    (
        AppendHeaders([(header::SET_COOKIE, clear_cookie(AUTH_STATE_COOKIE))]),
        Redirect::to("/"),
    )
        .into_response()
}

/// GET /auth/login
async fn user_login(State(state): State<AppState>) -> Response {
    start_oauth(&state, USER_CALLBACK_PATH)
}

/// GET /auth/callback
async fn user_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let Some(code) = callback_code(&headers, query) else {
        return abort_to_root();
    };

    match state
        .auth_service
        .sign_in_user(&code, &redirect_uri(&state, USER_CALLBACK_PATH))
        .await
    {
        Ok((_, session)) => (
            AppendHeaders([
                (header::SET_COOKIE, clear_cookie(AUTH_STATE_COOKIE)),
                (
                    header::SET_COOKIE,
                    session_cookie(
                        USER_SESSION_COOKIE,
                        &session.id,
                        state.auth_service.user_session_max_age(),
                    ),
                ),
            ]),
            Redirect::to("/"),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!("User sign-in failed: {}", e);
            abort_to_root()
        }
    }
}

/// Current admin session token, if it is still valid
async fn valid_admin_token(state: &AppState, headers: &HeaderMap) -> Option<String> {
    let token = extract_cookie(headers, ADMIN_SESSION_COOKIE)?;
    match state.auth_service.validate_admin_session(&token).await {
        Ok(_) => Some(token),
        Err(AuthServiceError::Internal(e)) => {
            tracing::error!("Admin session lookup failed: {}", e);
            None
        }
        Err(_) => None,
    }
}

/// GET /admin/login
async fn admin_login(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if valid_admin_token(&state, &headers).await.is_some() {
        return Redirect::to("/admin").into_response();
    }
    start_oauth(&state, ADMIN_CALLBACK_PATH)
}

/// GET /admin/auth
async fn admin_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let Some(code) = callback_code(&headers, query) else {
        return abort_to_root();
    };

    match state
        .auth_service
        .sign_in_admin(&code, &redirect_uri(&state, ADMIN_CALLBACK_PATH))
        .await
    {
        Ok((_, session)) => (
            AppendHeaders([
                (header::SET_COOKIE, clear_cookie(AUTH_STATE_COOKIE)),
                (
                    header::SET_COOKIE,
                    session_cookie(
                        ADMIN_SESSION_COOKIE,
                        &session.id,
                        state.auth_service.admin_session_max_age(),
                    ),
                ),
            ]),
            Redirect::to("/admin"),
        )
            .into_response(),
        Err(AuthServiceError::NotAdmin(email)) => {
            tracing::warn!(%email, "Admin sign-in refused: not an admin");
            abort_to_root()
        }
        Err(e) => {
            tracing::warn!("Admin sign-in failed: {}", e);
            abort_to_root()
        }
    }
}

/// POST /admin/signout
async fn admin_signout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(token) = valid_admin_token(&state, &headers).await else {
        return Redirect::to("/").into_response();
    };

    if let Err(e) = state.auth_service.sign_out(&token).await {
        tracing::error!("Admin sign-out failed: {}", e);
    }
    (
        AppendHeaders([(header::SET_COOKIE, clear_cookie(ADMIN_SESSION_COOKIE))]),
        Redirect::to("/"),
    )
        .into_response()
}

/// GET /api/v1/auth/me
async fn get_current_user(user: AuthenticatedUser) -> Json<User> {
    Json(user.0)
}

/// POST /api/v1/auth/logout
async fn logout(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = extract_session_token(&headers)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    state.auth_service.sign_out(&token).await?;

    Ok((
        StatusCode::NO_CONTENT,
        AppendHeaders([(header::SET_COOKIE, clear_cookie(USER_SESSION_COOKIE))]),
    ))
}
