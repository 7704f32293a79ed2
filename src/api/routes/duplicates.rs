//! Duplicate contact handlers.

use super::DuplicatesQuery;
use crate::api::AppState;
use crate::engine::MergeRequest;
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// GET /duplicates - Scan pools for contacts sharing a phone number
#[utoipa::path(
    get,
    path = "/api/v1/duplicates",
    tag = "duplicates",
    params(("pools" = Option<String>, Query, description = "Comma-separated pools to scan (default: all)")),
    responses(
        (status = 200, description = "Duplicate report", body = crate::dedup::DuplicateReport),
        (status = 422, description = "Unknown pool name")
    )
)]
pub async fn duplicate_report(
    State(state): State<AppState>,
    Query(query): Query<DuplicatesQuery>,
) -> Response {
    let pools = match query.pools() {
        Ok(pools) => pools,
        Err(e) => return crate::Error::from(e).into_response(),
    };

    match state.engine.duplicate_report(&pools).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /duplicates/merge - Retire duplicate contacts
#[utoipa::path(
    post,
    path = "/api/v1/duplicates/merge",
    tag = "duplicates",
    request_body = MergeRequest,
    responses(
        (status = 200, description = "Merge finished; per-contact failures are listed", body = crate::dedup::MergeResult),
        (status = 409, description = "Source pools busy with an active dispatch"),
        (status = 422, description = "Unknown group or primary")
    )
)]
pub async fn merge_duplicates(
    State(state): State<AppState>,
    Json(request): Json<MergeRequest>,
) -> Response {
    match state.engine.apply_merge_request(request).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => e.into_response(),
    }
}
