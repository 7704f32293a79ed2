//! Error types for bulk-outreach
//!
//! This module provides the error taxonomy for the engine:
//! - Validation errors raised before any campaign state is created
//! - Campaign lifecycle errors (unknown campaign, illegal state transition)
//! - Store failures, which abort a dispatch run without corrupting recipient state
//! - HTTP status code mapping and structured error bodies for the REST API
//!
//! Per-recipient channel failures and per-contact merge failures are *not* errors at this
//! level: they are recorded as data (recipient rows, [`MergeResult`](crate::dedup::MergeResult))
//! and never abort sibling work.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for bulk-outreach operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for bulk-outreach
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "dispatch.pacing_delay")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Campaign lifecycle error
    #[error("campaign error: {0}")]
    Campaign(#[from] CampaignError),

    /// Campaign definition or task definition rejected
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A dispatch run lost its store and was aborted
    ///
    /// Recipients stay in their last committed state; the next `run` resumes from there.
    #[error("dispatch aborted for campaign {campaign_id}: {reason}")]
    SchedulerFatal {
        /// Campaign whose run was aborted
        campaign_id: i64,
        /// Underlying store failure
        reason: String,
    },

    /// A merge could not lock its source pools because a dispatch is using them
    #[error("source pools busy: {0}")]
    PoolBusy(String),

    /// Channel provider could not be reached or configured
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Shutdown in progress - not accepting new dispatch runs
    #[error("shutdown in progress: not accepting new work")]
    ShuttingDown,

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),
}

/// Campaign lifecycle errors
#[derive(Debug, Error)]
pub enum CampaignError {
    /// Campaign not found (or soft-deleted)
    #[error("campaign {id} not found")]
    NotFound {
        /// The campaign ID that was not found
        id: i64,
    },

    /// Campaign already in requested state
    #[error("campaign {id} is already {state}")]
    AlreadyInState {
        /// The campaign ID
        id: i64,
        /// The current state (e.g., "paused")
        state: String,
    },

    /// Operation not permitted by the campaign state machine
    #[error("cannot {operation} campaign {id} in state {current_state}")]
    InvalidState {
        /// The campaign ID
        id: i64,
        /// The attempted operation (e.g., "pause", "resume", "retry")
        operation: String,
        /// The state that prevents the operation
        current_state: String,
    },
}

/// Rejections raised while validating a definition, before any state is created
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or blank
    #[error("field '{field}' is required")]
    MissingField {
        /// Name of the missing field
        field: String,
    },

    /// A field is present but its value is unacceptable
    #[error("field '{field}' is invalid: {reason}")]
    InvalidField {
        /// Name of the offending field
        field: String,
        /// Why the value was rejected
        reason: String,
    },

    /// Targeting rule and exclusions produced zero recipients
    #[error("campaign resolves to zero recipients")]
    NoRecipients,
}

impl ValidationError {
    pub(crate) fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "campaign_not_found",
///     "message": "campaign error: campaign 12 not found",
///     "details": { "campaign_id": 12 }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "validation_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            Error::Config { .. } => 400,
            Error::Validation(_) => 422,

            Error::NotFound(_) => 404,
            Error::Campaign(CampaignError::NotFound { .. }) => 404,
            Error::Database(DatabaseError::NotFound(_)) => 404,

            Error::Campaign(CampaignError::AlreadyInState { .. }) => 409,
            Error::Campaign(CampaignError::InvalidState { .. }) => 409,
            Error::PoolBusy(_) => 409,

            Error::Database(_) => 500,
            Error::Sqlx(_) => 500,
            Error::Io(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Serialization(_) => 500,
            Error::Other(_) => 500,

            Error::Channel(_) => 502,
            Error::Network(_) => 502,

            Error::SchedulerFatal { .. } => 503,
            Error::ShuttingDown => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(_) => "database_error",
            Error::Sqlx(_) => "database_error",
            Error::Campaign(e) => match e {
                CampaignError::NotFound { .. } => "campaign_not_found",
                CampaignError::AlreadyInState { .. } => "already_in_state",
                CampaignError::InvalidState { .. } => "invalid_state",
            },
            Error::Validation(e) => match e {
                ValidationError::NoRecipients => "no_recipients",
                ValidationError::MissingField { .. } | ValidationError::InvalidField { .. } => {
                    "validation_error"
                }
            },
            Error::SchedulerFatal { .. } => "scheduler_fatal",
            Error::PoolBusy(_) => "pool_busy",
            Error::Channel(_) => "channel_error",
            Error::Io(_) => "io_error",
            Error::NotFound(_) => "not_found",
            Error::ShuttingDown => "shutting_down",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Campaign(CampaignError::NotFound { id }) => Some(serde_json::json!({
                "campaign_id": id,
            })),
            Error::Campaign(CampaignError::AlreadyInState { id, state }) => {
                Some(serde_json::json!({
                    "campaign_id": id,
                    "state": state,
                }))
            }
            Error::Campaign(CampaignError::InvalidState {
                id,
                operation,
                current_state,
            }) => Some(serde_json::json!({
                "campaign_id": id,
                "operation": operation,
                "current_state": current_state,
            })),
            Error::Validation(ValidationError::MissingField { field })
            | Error::Validation(ValidationError::InvalidField { field, .. }) => {
                Some(serde_json::json!({
                    "field": field,
                }))
            }
            Error::SchedulerFatal { campaign_id, .. } => Some(serde_json::json!({
                "campaign_id": campaign_id,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
