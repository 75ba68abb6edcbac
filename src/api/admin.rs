//! Admin API endpoints
//!
//! Everything here sits behind the admin session (`jid` cookie):
//! - GET /me - signed-in admin
//! - GET/POST /budes, DELETE /budes/{id} - Bude management
//! - GET /reports, PUT /reports/state - moderation queue
//! - GET/POST /report-types
//! - GET /internals, PUT /internals/{bude_id} - admin notes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, ApiJson, ApiQuery, AppState, AuthenticatedAdmin};
use crate::models::{
    Admin, AdminBudeInput, Bude, BudeInternal, CreateReportTypeInput, ReportFilter, ReportState,
    ReportType, ReportWithMeta,
};

/// Query parameters for the moderation queue
#[derive(Debug, Deserialize)]
pub struct ReportsQuery {
    pub state: String,
    pub bude_id: Option<String>,
    pub user_id: Option<String>,
}

/// Request for moving a report to another state
#[derive(Debug, Deserialize)]
pub struct ReportStateRequest {
    pub user_id: String,
    pub bude_id: String,
    pub state: String,
}

#[derive(Debug, Deserialize)]
pub struct InternalRequest {
    #[serde(default)]
    pub info: String,
}

/// Build the admin router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_current_admin))
        .route("/budes", get(list_budes).post(save_bude))
        .route("/budes/{id}", delete(remove_bude))
        .route("/reports", get(list_reports))
        .route("/reports/state", put(set_report_state))
        .route("/report-types", get(list_report_types).post(create_report_type))
        .route("/internals", get(list_internals))
        .route("/internals/{bude_id}", put(set_internal))
}

fn parse_state(state: &str) -> Result<ReportState, ApiError> {
    state.parse().map_err(ApiError::validation_error)
}

/// Treat `?bude_id=` like an absent filter
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// GET /api/v1/admin/me
async fn get_current_admin(admin: AuthenticatedAdmin) -> Json<Admin> {
    Json(admin.0)
}

/// GET /api/v1/admin/budes
async fn list_budes(State(state): State<AppState>) -> Result<Json<Vec<Bude>>, ApiError> {
    Ok(Json(state.bude_service.list_all().await?))
}

/// POST /api/v1/admin/budes - create or rewrite a Bude with its links
async fn save_bude(
    State(state): State<AppState>,
    admin: AuthenticatedAdmin,
    ApiJson(input): ApiJson<AdminBudeInput>,
) -> Result<Json<Bude>, ApiError> {
    let bude = state.bude_service.admin_save(input).await?;
    tracing::info!(admin_id = %admin.0.id, bude_id = %bude.id, "Admin saved Bude");
    Ok(Json(bude))
}

/// DELETE /api/v1/admin/budes/{id}
async fn remove_bude(
    State(state): State<AppState>,
    admin: AuthenticatedAdmin,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.bude_service.admin_remove(&id).await?;
    tracing::info!(admin_id = %admin.0.id, bude_id = %id, "Admin removed Bude");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/admin/reports
async fn list_reports(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ReportsQuery>,
) -> Result<Json<Vec<ReportWithMeta>>, ApiError> {
    let filter = ReportFilter {
        state: parse_state(&query.state)?,
        bude_id: non_empty(query.bude_id),
        user_id: non_empty(query.user_id),
    };
    Ok(Json(state.report_service.all(&filter).await?))
}

/// PUT /api/v1/admin/reports/state
async fn set_report_state(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ReportStateRequest>,
) -> Result<StatusCode, ApiError> {
    let new_state = parse_state(&req.state)?;
    state
        .report_service
        .set_state(&req.user_id, &req.bude_id, new_state)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/admin/report-types
async fn list_report_types(State(state): State<AppState>) -> Result<Json<Vec<ReportType>>, ApiError> {
    Ok(Json(state.report_service.list_types().await?))
}

/// POST /api/v1/admin/report-types
async fn create_report_type(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<CreateReportTypeInput>,
) -> Result<(StatusCode, Json<ReportType>), ApiError> {
    let report_type = state.report_service.create_type(input).await?;
    Ok((StatusCode::CREATED, Json(report_type)))
}

/// GET /api/v1/admin/internals
async fn list_internals(State(state): State<AppState>) -> Result<Json<Vec<BudeInternal>>, ApiError> {
    Ok(Json(state.internal_service.list().await?))
}

/// PUT /api/v1/admin/internals/{bude_id} - blank `info` removes the note
async fn set_internal(
    State(state): State<AppState>,
    Path(bude_id): Path<String>,
    ApiJson(req): ApiJson<InternalRequest>,
) -> Result<Json<Option<BudeInternal>>, ApiError> {
    Ok(Json(state.internal_service.set(&bude_id, &req.info).await?))
}
