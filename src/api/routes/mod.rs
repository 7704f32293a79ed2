//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`campaigns`] - Campaign creation, control, progress and recipients
//! - [`duplicates`] - Duplicate scan and merge
//! - [`tasks`] - Automated task management
//! - [`scheduler`] - Automation poller control
//! - [`system`] - Health, events, OpenAPI, shutdown

use crate::error::ValidationError;
use crate::types::{RecipientStatus, SourcePool};
use serde::{Deserialize, Serialize};

mod campaigns;
mod duplicates;
mod scheduler;
mod system;
mod tasks;

// Re-export all handlers so `routes::function_name` works
pub use campaigns::*;
pub use duplicates::*;
pub use scheduler::*;
pub use system::*;
pub use tasks::*;

// ============================================================================
// Query/Request Types (shared across handlers)
// ============================================================================

/// Query parameters for GET /campaigns/:id/recipients
#[derive(Debug, Default, Deserialize, Serialize, utoipa::ToSchema)]
pub struct RecipientsQuery {
    /// Only recipients in this status
    pub status: Option<RecipientStatus>,
}

/// Query parameters for GET /duplicates
#[derive(Debug, Default, Deserialize, Serialize, utoipa::ToSchema)]
pub struct DuplicatesQuery {
    /// Comma-separated pool names, e.g. `owners,clients` (default: every pool)
    pub pools: Option<String>,
}

impl DuplicatesQuery {
    /// Parsed pool list; empty means every pool
    pub fn pools(&self) -> Result<Vec<SourcePool>, ValidationError> {
        let Some(raw) = self.pools.as_deref() else {
            return Ok(Vec::new());
        };

        raw.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| {
                SourcePool::parse(name).ok_or_else(|| {
                    ValidationError::invalid("pools", format!("unknown source pool '{}'", name))
                })
            })
            .collect()
    }
}

/// Response for POST /campaigns/:id/retry
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct RetryResponse {
    /// Failed recipients reset to pending
    pub requeued: u64,
}

/// Request body for PATCH /tasks/:id
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct UpdateTaskRequest {
    /// Whether the poller may run the task
    pub enabled: bool,
}
