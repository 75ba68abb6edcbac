//! Report API endpoints
//!
//! - GET /api/v1/reports/types?bude_id= - types the caller may choose from
//! - POST /api/v1/reports - report a Bude
//! - DELETE /api/v1/reports/{bude_id} - withdraw the caller's report

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, ApiJson, ApiQuery, AppState, AuthenticatedUser};
use crate::models::{CreateReportInput, Report, ReportType};

#[derive(Debug, Deserialize)]
pub struct TypesQuery {
    pub bude_id: String,
}

/// `types` is `null` once the caller has reported the Bude
#[derive(Debug, Serialize)]
pub struct TypesResponse {
    pub types: Option<Vec<ReportType>>,
}

/// Routes for signed-in users
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_report))
        .route("/types", get(list_types))
        .route("/{bude_id}", delete(delete_report))
}

/// GET /api/v1/reports/types
async fn list_types(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiQuery(query): ApiQuery<TypesQuery>,
) -> Result<Json<TypesResponse>, ApiError> {
    let types = state.report_service.types(&user.0.id, &query.bude_id).await?;
    Ok(Json(TypesResponse { types }))
}

/// POST /api/v1/reports
async fn create_report(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(input): ApiJson<CreateReportInput>,
) -> Result<(StatusCode, Json<Report>), ApiError> {
    let report = state.report_service.add(&user.0.id, input).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

/// DELETE /api/v1/reports/{bude_id}
async fn delete_report(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(bude_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.report_service.delete(&user.0.id, &bude_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
