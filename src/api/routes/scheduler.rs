//! Automation poller handlers.

use crate::api::AppState;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};

/// GET /scheduler - Poller status
#[utoipa::path(
    get,
    path = "/api/v1/scheduler",
    tag = "scheduler",
    responses(
        (status = 200, description = "Poller status", body = crate::automation::SchedulerStatus)
    )
)]
pub async fn scheduler_status(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.engine.scheduler_status()))
}

/// POST /scheduler/start - Start the poller
#[utoipa::path(
    post,
    path = "/api/v1/scheduler/start",
    tag = "scheduler",
    responses(
        (status = 200, description = "Poller running", body = crate::automation::SchedulerStatus)
    )
)]
pub async fn start_scheduler(State(state): State<AppState>) -> impl IntoResponse {
    if !state.engine.start_scheduler() {
        tracing::debug!("Automation scheduler already running");
    }
    (StatusCode::OK, Json(state.engine.scheduler_status()))
}

/// POST /scheduler/stop - Stop the poller
#[utoipa::path(
    post,
    path = "/api/v1/scheduler/stop",
    tag = "scheduler",
    responses(
        (status = 200, description = "Poller stopped", body = crate::automation::SchedulerStatus)
    )
)]
pub async fn stop_scheduler(State(state): State<AppState>) -> impl IntoResponse {
    state.engine.stop_scheduler().await;
    (StatusCode::OK, Json(state.engine.scheduler_status()))
}
