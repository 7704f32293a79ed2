//! REST API server module
//!
//! Provides an OpenAPI 3.1 compliant REST API for creating and controlling campaigns,
//! cleaning up duplicate contacts, managing automated tasks and following engine events.

use crate::{Config, OutreachEngine, Result};
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// Every route is served under `/api/v1`.
///
/// # Routes
///
/// ## Campaigns
/// - `GET /campaigns` - List campaigns
/// - `POST /campaigns` - Create a campaign in draft
/// - `GET /campaigns/:id` - Get a campaign
/// - `DELETE /campaigns/:id` - Delete a campaign
/// - `POST /campaigns/:id/start` - Queue for dispatch
/// - `POST /campaigns/:id/pause` - Pause dispatch
/// - `POST /campaigns/:id/resume` - Resume dispatch
/// - `POST /campaigns/:id/cancel` - Cancel
/// - `POST /campaigns/:id/retry` - Requeue failed recipients
/// - `GET /campaigns/:id/progress` - Progress snapshot
/// - `GET /campaigns/:id/recipients` - Recipients, optionally filtered by status
///
/// ## Duplicates
/// - `GET /duplicates` - Duplicate report
/// - `POST /duplicates/merge` - Merge duplicates
///
/// ## Automated Tasks
/// - `GET /tasks` - List tasks
/// - `POST /tasks` - Create task
/// - `GET /tasks/:id` - Get task
/// - `PATCH /tasks/:id` - Enable/disable task
/// - `DELETE /tasks/:id` - Delete task
/// - `POST /tasks/:id/run` - Run now
/// - `GET /tasks/:id/executions` - Execution log
///
/// ## Scheduler
/// - `GET /scheduler` - Poller status
/// - `POST /scheduler/start` - Start poller
/// - `POST /scheduler/stop` - Stop poller
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive Swagger UI documentation (if enabled, served at the root)
/// - `GET /events` - Server-sent events stream
/// - `POST /shutdown` - Graceful shutdown
pub fn create_router(engine: Arc<OutreachEngine>, config: Arc<Config>) -> Router {
    let state = AppState::new(engine, config.clone());

    let api = Router::new()
        // Campaigns
        .route(
            "/campaigns",
            get(routes::list_campaigns).post(routes::create_campaign),
        )
        .route(
            "/campaigns/:id",
            get(routes::get_campaign).delete(routes::delete_campaign),
        )
        .route("/campaigns/:id/start", post(routes::start_campaign))
        .route("/campaigns/:id/pause", post(routes::pause_campaign))
        .route("/campaigns/:id/resume", post(routes::resume_campaign))
        .route("/campaigns/:id/cancel", post(routes::cancel_campaign))
        .route("/campaigns/:id/retry", post(routes::retry_failed))
        .route("/campaigns/:id/progress", get(routes::get_progress))
        .route("/campaigns/:id/recipients", get(routes::list_recipients))
        // Duplicates
        .route("/duplicates", get(routes::duplicate_report))
        .route("/duplicates/merge", post(routes::merge_duplicates))
        // Automated tasks
        .route("/tasks", get(routes::list_tasks).post(routes::create_task))
        .route(
            "/tasks/:id",
            get(routes::get_task)
                .patch(routes::update_task)
                .delete(routes::delete_task),
        )
        .route("/tasks/:id/run", post(routes::run_task_now))
        .route("/tasks/:id/executions", get(routes::list_task_executions))
        // Scheduler
        .route("/scheduler", get(routes::scheduler_status))
        .route("/scheduler/start", post(routes::start_scheduler))
        .route("/scheduler/stop", post(routes::stop_scheduler))
        // System
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec))
        .route("/events", get(routes::event_stream))
        .route("/shutdown", post(routes::shutdown));

    let router = Router::new().nest("/api/v1", api);

    // Swagger UI reuses the /api/v1/openapi.json document
    let router = if config.server.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api/v1/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.with_state(state);

    if config.server.api.cors_enabled {
        router.layer(build_cors_layer(&config.server.api.cors_origins))
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// `"*"` or an empty list allows any origin.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// Runs until the server stops or fails.
///
/// # Example
///
/// ```no_run
/// use bulk_outreach::{Config, OutreachEngine};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let engine = Arc::new(OutreachEngine::new((*config).clone()).await?);
///
/// bulk_outreach::api::start_api_server(engine, config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(engine: Arc<OutreachEngine>, config: Arc<Config>) -> Result<()> {
    let bind_address = config.server.api.bind_address;

    tracing::info!(address = %bind_address, "Starting API server");

    let app = create_router(engine, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
