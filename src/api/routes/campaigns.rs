//! Campaign handlers: creation, listing, control and progress.

use super::{RecipientsQuery, RetryResponse};
use crate::api::AppState;
use crate::types::{CampaignDefinition, CampaignId};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// GET /campaigns - List campaigns
#[utoipa::path(
    get,
    path = "/api/v1/campaigns",
    tag = "campaigns",
    responses(
        (status = 200, description = "Campaigns, newest first", body = Vec<crate::types::CampaignInfo>),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_campaigns(State(state): State<AppState>) -> Response {
    match state.engine.list_campaigns().await {
        Ok(campaigns) => (StatusCode::OK, Json(campaigns)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list campaigns");
            e.into_response()
        }
    }
}

/// POST /campaigns - Create a campaign in draft
#[utoipa::path(
    post,
    path = "/api/v1/campaigns",
    tag = "campaigns",
    request_body = CampaignDefinition,
    responses(
        (status = 201, description = "Campaign created", body = crate::types::CampaignInfo),
        (status = 422, description = "Invalid definition or no recipients"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_campaign(
    State(state): State<AppState>,
    Json(definition): Json<CampaignDefinition>,
) -> Response {
    match state.engine.create_campaign(definition).await {
        Ok(campaign) => (StatusCode::CREATED, Json(campaign)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /campaigns/:id - Get a campaign
#[utoipa::path(
    get,
    path = "/api/v1/campaigns/{id}",
    tag = "campaigns",
    params(("id" = i64, Path, description = "Campaign ID")),
    responses(
        (status = 200, description = "Campaign", body = crate::types::CampaignInfo),
        (status = 404, description = "Campaign not found")
    )
)]
pub async fn get_campaign(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.engine.get_campaign(CampaignId(id)).await {
        Ok(campaign) => (StatusCode::OK, Json(campaign)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// DELETE /campaigns/:id - Delete a campaign, cancelling it first if needed
#[utoipa::path(
    delete,
    path = "/api/v1/campaigns/{id}",
    tag = "campaigns",
    params(("id" = i64, Path, description = "Campaign ID")),
    responses(
        (status = 204, description = "Campaign deleted"),
        (status = 404, description = "Campaign not found")
    )
)]
pub async fn delete_campaign(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.engine.delete_campaign(CampaignId(id)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /campaigns/:id/start - Queue a draft campaign for dispatch
#[utoipa::path(
    post,
    path = "/api/v1/campaigns/{id}/start",
    tag = "campaigns",
    params(("id" = i64, Path, description = "Campaign ID")),
    responses(
        (status = 204, description = "Campaign queued"),
        (status = 404, description = "Campaign not found"),
        (status = 409, description = "Campaign cannot be started in its current state"),
        (status = 503, description = "Engine is shutting down")
    )
)]
pub async fn start_campaign(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.engine.start(CampaignId(id)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /campaigns/:id/pause - Pause a sending campaign
#[utoipa::path(
    post,
    path = "/api/v1/campaigns/{id}/pause",
    tag = "campaigns",
    params(("id" = i64, Path, description = "Campaign ID")),
    responses(
        (status = 204, description = "Campaign paused"),
        (status = 404, description = "Campaign not found"),
        (status = 409, description = "Campaign is not sending")
    )
)]
pub async fn pause_campaign(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.engine.pause(CampaignId(id)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /campaigns/:id/resume - Resume a paused campaign
#[utoipa::path(
    post,
    path = "/api/v1/campaigns/{id}/resume",
    tag = "campaigns",
    params(("id" = i64, Path, description = "Campaign ID")),
    responses(
        (status = 204, description = "Campaign resumed"),
        (status = 404, description = "Campaign not found"),
        (status = 409, description = "Campaign is not paused"),
        (status = 503, description = "Engine is shutting down")
    )
)]
pub async fn resume_campaign(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.engine.resume(CampaignId(id)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /campaigns/:id/cancel - Cancel a campaign
#[utoipa::path(
    post,
    path = "/api/v1/campaigns/{id}/cancel",
    tag = "campaigns",
    params(("id" = i64, Path, description = "Campaign ID")),
    responses(
        (status = 204, description = "Campaign cancelled"),
        (status = 404, description = "Campaign not found"),
        (status = 409, description = "Campaign already finished")
    )
)]
pub async fn cancel_campaign(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.engine.cancel(CampaignId(id)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /campaigns/:id/retry - Requeue failed recipients with retries left
#[utoipa::path(
    post,
    path = "/api/v1/campaigns/{id}/retry",
    tag = "campaigns",
    params(("id" = i64, Path, description = "Campaign ID")),
    responses(
        (status = 200, description = "Recipients requeued", body = RetryResponse),
        (status = 404, description = "Campaign not found"),
        (status = 409, description = "Campaign already finished")
    )
)]
pub async fn retry_failed(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.engine.retry_failed(CampaignId(id)).await {
        Ok(requeued) => (StatusCode::OK, Json(RetryResponse { requeued })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /campaigns/:id/progress - Live progress snapshot
#[utoipa::path(
    get,
    path = "/api/v1/campaigns/{id}/progress",
    tag = "campaigns",
    params(("id" = i64, Path, description = "Campaign ID")),
    responses(
        (status = 200, description = "Progress snapshot", body = crate::types::ProgressSnapshot),
        (status = 404, description = "Campaign not found")
    )
)]
pub async fn get_progress(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.engine.get_progress(CampaignId(id)).await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /campaigns/:id/recipients - Recipients in dispatch order
#[utoipa::path(
    get,
    path = "/api/v1/campaigns/{id}/recipients",
    tag = "campaigns",
    params(
        ("id" = i64, Path, description = "Campaign ID"),
        ("status" = Option<String>, Query, description = "Filter: pending, sending, sent or failed")
    ),
    responses(
        (status = 200, description = "Recipients", body = Vec<crate::types::RecipientInfo>),
        (status = 404, description = "Campaign not found")
    )
)]
pub async fn list_recipients(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<RecipientsQuery>,
) -> Response {
    match state
        .engine
        .list_recipients(CampaignId(id), query.status)
        .await
    {
        Ok(recipients) => (StatusCode::OK, Json(recipients)).into_response(),
        Err(e) => e.into_response(),
    }
}
