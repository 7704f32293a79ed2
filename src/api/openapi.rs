//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the bulk-outreach REST API
//! using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the bulk-outreach REST API
///
/// The spec can be accessed via:
/// - `/api/v1/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "bulk-outreach REST API",
        version = "0.1.0",
        description = "OpenAPI 3.1 compliant REST API for bulk messaging campaigns, duplicate contact cleanup and automated sends",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:6790/api/v1", description = "Local development server")
    ),
    paths(
        // Campaigns
        crate::api::routes::list_campaigns,
        crate::api::routes::create_campaign,
        crate::api::routes::get_campaign,
        crate::api::routes::delete_campaign,
        crate::api::routes::start_campaign,
        crate::api::routes::pause_campaign,
        crate::api::routes::resume_campaign,
        crate::api::routes::cancel_campaign,
        crate::api::routes::retry_failed,
        crate::api::routes::get_progress,
        crate::api::routes::list_recipients,

        // Duplicates
        crate::api::routes::duplicate_report,
        crate::api::routes::merge_duplicates,

        // Automated tasks
        crate::api::routes::list_tasks,
        crate::api::routes::create_task,
        crate::api::routes::get_task,
        crate::api::routes::update_task,
        crate::api::routes::delete_task,
        crate::api::routes::run_task_now,
        crate::api::routes::list_task_executions,

        // Scheduler
        crate::api::routes::scheduler_status,
        crate::api::routes::start_scheduler,
        crate::api::routes::stop_scheduler,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
        crate::api::routes::shutdown,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::CampaignId,
        crate::types::RecipientId,
        crate::types::ContactId,
        crate::types::TaskId,
        crate::types::CampaignStatus,
        crate::types::RecipientStatus,
        crate::types::SourcePool,
        crate::types::ContactType,
        crate::types::Priority,
        crate::types::Contact,
        crate::types::MediaKind,
        crate::types::ReplyButton,
        crate::types::MessagePayload,
        crate::types::TargetRule,
        crate::types::Exclusions,
        crate::types::SendType,
        crate::types::CampaignDefinition,
        crate::types::CampaignInfo,
        crate::types::RecipientInfo,
        crate::types::ProgressSnapshot,
        crate::types::Event,

        // Duplicate detection
        crate::dedup::GroupPriority,
        crate::dedup::MemberKey,
        crate::dedup::DuplicateMember,
        crate::dedup::DuplicateGroup,
        crate::dedup::DuplicateReport,
        crate::dedup::MergeFailure,
        crate::dedup::MergeResult,
        crate::engine::MergeRequest,
        crate::engine::PrimaryOverride,

        // Automation
        crate::automation::Weekday,
        crate::automation::AutomatedTask,
        crate::automation::TaskDefinition,
        crate::automation::TaskExecution,
        crate::automation::ExecutionResult,
        crate::automation::SchedulerStatus,

        // API request/response types from routes
        crate::api::routes::RetryResponse,
        crate::api::routes::UpdateTaskRequest,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "campaigns", description = "Campaigns - Create, control and monitor bulk sends"),
        (name = "duplicates", description = "Duplicate contacts - Scan source pools and merge duplicates"),
        (name = "tasks", description = "Automated tasks - Recurring sends with cooldown and daily limits"),
        (name = "scheduler", description = "Scheduler - Automation poller status and control"),
        (name = "system", description = "System endpoints - Health checks, OpenAPI spec, events, shutdown"),
    )
)]
pub struct ApiDoc;
