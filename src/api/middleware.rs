//! API middleware
//!
//! Contains middleware for:
//! - User authentication (session token from bearer header or cookie)
//! - Admin authentication (`jid` cookie)
//!
//! Also hosts the shared `ApiError` type, cookie helpers and the
//! Cache-Control header builders used by the handlers.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts, OptionalFromRequestParts, Query, Request, State,
    },
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::create_cache;
use crate::config::Config;
use crate::db::repositories::{
    SqlxAdminRepository, SqlxBudeRepository, SqlxEvaluationRepository, SqlxReportRepository,
    SqlxReportTypeRepository, SqlxSessionRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::{Admin, User};
use crate::services::{
    AuthService, AuthServiceError, BudeService, BudeServiceError, DynOAuthProvider,
    EvaluationService, EvaluationServiceError, InternalService, InternalServiceError,
    ReportService, ReportServiceError,
};

/// Cookie holding the user session token
pub const USER_SESSION_COOKIE: &str = "session";
/// Cookie holding the admin session token
pub const ADMIN_SESSION_COOKIE: &str = "jid";
/// Cookie holding the OAuth `state` between login and callback
pub const AUTH_STATE_COOKIE: &str = "auth_state";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub config: Arc<Config>,
    pub auth_service: Arc<AuthService>,
    pub bude_service: Arc<BudeService>,
    pub evaluation_service: Arc<EvaluationService>,
    pub report_service: Arc<ReportService>,
    pub internal_service: Arc<InternalService>,
}

impl AppState {
    /// Wire repositories, cache and services over one pool
    pub fn new(pool: DynDatabasePool, config: Config, provider: DynOAuthProvider) -> Self {
        let cache = create_cache(&config.cache);
        let cache_ttl = Duration::from_secs(config.cache.ttl_seconds);

        let bude_repo = SqlxBudeRepository::boxed(pool.clone());
        let admin_repo = SqlxAdminRepository::boxed(pool.clone());

        let auth_service = Arc::new(AuthService::new(
            SqlxUserRepository::boxed(pool.clone()),
            admin_repo.clone(),
            SqlxSessionRepository::boxed(pool.clone()),
            provider,
            config.session.clone(),
        ));
        let bude_service = Arc::new(BudeService::new(bude_repo.clone(), cache.clone(), cache_ttl));
        let evaluation_service = Arc::new(EvaluationService::new(
            SqlxEvaluationRepository::boxed(pool.clone()),
            bude_repo.clone(),
            cache,
            cache_ttl,
        ));
        let report_service = Arc::new(ReportService::new(
            SqlxReportRepository::boxed(pool.clone()),
            SqlxReportTypeRepository::boxed(pool.clone()),
            bude_repo.clone(),
        ));
        let internal_service = Arc::new(InternalService::new(admin_repo, bude_repo));

        Self {
            pool,
            config: Arc::new(config),
            auth_service,
            bude_service,
            evaluation_service,
            report_service,
            internal_service,
        }
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// Authenticated admin extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedAdmin(pub Admin);

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    /// Logs the cause and hides it from the client
    pub fn internal_error(cause: impl std::fmt::Display) -> Self {
        tracing::error!("Internal error: {}", cause);
        Self::new("INTERNAL_ERROR", "Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

// ============================================================================
// Service error mapping
// ============================================================================

impl From<BudeServiceError> for ApiError {
    fn from(e: BudeServiceError) -> Self {
        match e {
            BudeServiceError::Validation(msg) => ApiError::validation_error(msg),
            BudeServiceError::Form(errors) => ApiError::with_details(
                "VALIDATION_ERROR",
                "Form contains errors",
                serde_json::to_value(&errors).unwrap_or_default(),
            ),
            BudeServiceError::NotFound => ApiError::not_found("Bude not found"),
            BudeServiceError::Conflict(msg) => ApiError::conflict(msg),
            BudeServiceError::Internal(e) => ApiError::internal_error(e),
        }
    }
}

impl From<EvaluationServiceError> for ApiError {
    fn from(e: EvaluationServiceError) -> Self {
        match e {
            EvaluationServiceError::NotFound(msg) => ApiError::not_found(msg),
            EvaluationServiceError::Conflict => ApiError::conflict("Bude already evaluated"),
            EvaluationServiceError::Internal(e) => ApiError::internal_error(e),
        }
    }
}

impl From<ReportServiceError> for ApiError {
    fn from(e: ReportServiceError) -> Self {
        match e {
            ReportServiceError::Validation(msg) => ApiError::validation_error(msg),
            ReportServiceError::NotFound(msg) => ApiError::not_found(msg),
            ReportServiceError::Conflict => ApiError::conflict("Bude already reported"),
            ReportServiceError::Internal(e) => ApiError::internal_error(e),
        }
    }
}

impl From<InternalServiceError> for ApiError {
    fn from(e: InternalServiceError) -> Self {
        match e {
            InternalServiceError::Validation(msg) => ApiError::validation_error(msg),
            InternalServiceError::NotFound => ApiError::not_found("Bude not found"),
            InternalServiceError::Internal(e) => ApiError::internal_error(e),
        }
    }
}

impl From<AuthServiceError> for ApiError {
    fn from(e: AuthServiceError) -> Self {
        match e {
            AuthServiceError::InvalidSession | AuthServiceError::SessionExpired => {
                ApiError::unauthorized("Invalid or expired session")
            }
            AuthServiceError::NotAdmin(_) => ApiError::forbidden("Admin privileges required"),
            AuthServiceError::Provider(e) | AuthServiceError::Internal(e) => ApiError::internal_error(e),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation_error(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation_error(rejection.body_text())
    }
}

/// `Json` body extractor whose rejections use the API error body
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `Query` extractor whose rejections use the API error body
#[derive(Debug, FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

// ============================================================================
// Cookies
// ============================================================================

/// Value of cookie `name`, if present and non-empty
pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// `Set-Cookie` value for an HTTP-only cookie on the whole site
pub fn session_cookie(name: &str, value: &str, max_age: i64) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}", name, value, max_age)
}

/// `Set-Cookie` value that removes cookie `name`
pub fn clear_cookie(name: &str) -> String {
    session_cookie(name, "", 0)
}

/// Extract the user session token: bearer header first, then the cookie
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }

    extract_cookie(headers, USER_SESSION_COOKIE)
}

// ============================================================================
// Authentication
// ============================================================================

/// User authentication middleware
pub async fn require_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let user = state.auth_service.validate_user_session(&token).await?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Optional user authentication; invalid tokens are treated as anonymous
pub async fn optional_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_session_token(request.headers()) {
        match state.auth_service.validate_user_session(&token).await {
            Ok(user) => {
                request.extensions_mut().insert(AuthenticatedUser(user));
            }
            Err(AuthServiceError::Internal(e)) => {
                tracing::warn!("Session lookup failed, continuing anonymously: {}", e);
            }
            Err(_) => {}
        }
    }
    next.run(request).await
}

/// Admin authentication middleware
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_cookie(request.headers(), ADMIN_SESSION_COOKIE)
        .ok_or_else(|| ApiError::unauthorized("Admin session required"))?;

    let admin = state.auth_service.validate_admin_session(&token).await?;

    request.extensions_mut().insert(AuthenticatedAdmin(admin));
    Ok(next.run(request).await)
}

// Extractors for the identities the middleware above stores in extensions

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

impl<S> OptionalFromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<AuthenticatedUser>().cloned())
    }
}

impl<S> FromRequestParts<S> for AuthenticatedAdmin
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedAdmin>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Admin session required"))
    }
}

// ============================================================================
// HTTP Cache Headers
// ============================================================================

/// Cache-Control for responses every client may share
pub fn cache_control_public(max_age: u32) -> String {
    format!("public, max-age={}", max_age)
}

/// Cache-Control for responses specific to the signed-in caller
pub fn cache_control_private(max_age: u32) -> String {
    format!("private, max-age={}", max_age)
}
