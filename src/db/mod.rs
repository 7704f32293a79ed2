//! Database layer for bulk-outreach
//!
//! Handles SQLite persistence for contacts, campaigns, recipients, automated tasks and the
//! append-only send history.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`contacts`] - Contact pools (listing, soft retirement)
//! - [`campaigns`] - Campaign CRUD and guarded status transitions
//! - [`recipients`] - Recipient lifecycle with transactional counter updates
//! - [`tasks`] - Automated tasks and their execution log
//! - [`history`] - Send history used for cooldowns and daily caps

use crate::automation::{AutomatedTask, TaskExecution, Weekday};
use crate::error::Error;
use crate::types::{
    CampaignId, CampaignInfo, CampaignStatus, Contact, ContactId, ContactType, Priority,
    RecipientId, RecipientInfo, RecipientStatus, SendType, SourcePool, TaskId,
};
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{FromRow, sqlite::SqlitePool};

mod campaigns;
mod contacts;
mod history;
mod migrations;
mod recipients;
mod tasks;

pub use recipients::{INTERRUPTED_ERROR, RecipientCounts, RecipientResult};

/// Convert a stored unix timestamp back to UTC
pub(crate) fn from_unix(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).single().unwrap_or_else(Utc::now)
}

/// New contact to be inserted into a source pool
#[derive(Debug, Clone)]
pub struct NewContact {
    /// Pool the contact belongs to
    pub source_pool: SourcePool,
    /// Display name
    pub name: String,
    /// Raw phone number
    pub phone: Option<String>,
    /// Email address
    pub email: Option<String>,
    /// Company name
    pub company: Option<String>,
    /// Free-form notes
    pub notes: Option<String>,
    /// Business role
    pub contact_type: ContactType,
    /// Tags
    pub tags: Vec<String>,
    /// Outreach priority
    pub priority: Priority,
}

/// Contact record from database
#[derive(Debug, Clone, FromRow)]
pub struct ContactRow {
    /// Unique database ID
    pub id: i64,
    /// Source pool storage name
    pub source_pool: String,
    /// Display name
    pub name: String,
    /// Raw phone number
    pub phone: Option<String>,
    /// Email address
    pub email: Option<String>,
    /// Company name
    pub company: Option<String>,
    /// Free-form notes
    pub notes: Option<String>,
    /// Contact type storage name
    pub contact_type: String,
    /// Tags as a JSON array
    pub tags: String,
    /// Priority code (0=low, 1=medium, 2=high)
    pub priority: i32,
}

impl TryFrom<ContactRow> for Contact {
    type Error = Error;

    fn try_from(row: ContactRow) -> Result<Self, Self::Error> {
        let source_pool = SourcePool::parse(&row.source_pool).ok_or_else(|| {
            Error::Other(format!(
                "contact {} has unknown source pool '{}'",
                row.id, row.source_pool
            ))
        })?;

        Ok(Contact {
            id: ContactId(row.id),
            source_pool,
            name: row.name,
            phone: row.phone,
            email: row.email,
            company: row.company,
            notes: row.notes,
            contact_type: ContactType::parse(&row.contact_type),
            tags: serde_json::from_str(&row.tags)?,
            priority: Priority::from_i32(row.priority),
        })
    }
}

/// New campaign to be inserted, with its frozen recipient list
#[derive(Debug, Clone)]
pub struct NewCampaign {
    /// Campaign name
    pub name: String,
    /// Payload as JSON
    pub payload: String,
    /// Targeting rule as JSON
    pub target: String,
    /// Exclusions as JSON
    pub exclusions: String,
    /// Dispatch strategy
    pub send_type: SendType,
    /// Maximum failed attempts per recipient
    pub max_retries: u32,
}

/// Campaign record from database
#[derive(Debug, Clone, FromRow)]
pub struct CampaignRow {
    /// Unique database ID
    pub id: i64,
    /// Campaign name
    pub name: String,
    /// Status code (see [`CampaignStatus::from_i32`])
    pub status: i32,
    /// Payload as JSON
    pub payload: String,
    /// Targeting rule as JSON
    pub target: String,
    /// Exclusions as JSON
    pub exclusions: String,
    /// 0 = immediate, 1 = gradual
    pub send_type: i32,
    /// Gradual batch size
    pub batch_size: Option<i64>,
    /// Gradual inter-batch delay in seconds
    pub inter_batch_delay_secs: Option<i64>,
    /// Maximum failed attempts per recipient
    pub max_retries: i64,
    /// Recipients frozen at creation
    pub total_recipients: i64,
    /// Recipients delivered
    pub sent_count: i64,
    /// Recipients currently failed
    pub failed_count: i64,
    /// Unix timestamp when the campaign was created
    pub created_at: i64,
    /// Unix timestamp when dispatch first started
    pub started_at: Option<i64>,
    /// Unix timestamp when the campaign completed
    pub completed_at: Option<i64>,
}

impl CampaignRow {
    /// Decoded status
    pub fn status(&self) -> CampaignStatus {
        CampaignStatus::from_i32(self.status)
    }

    /// Decoded dispatch strategy
    pub fn send_type(&self) -> SendType {
        match (self.send_type, self.batch_size) {
            (1, Some(batch_size)) => SendType::Gradual {
                batch_size: batch_size.max(0) as u32,
                inter_batch_delay_secs: self.inter_batch_delay_secs.unwrap_or(0).max(0) as u64,
            },
            _ => SendType::Immediate,
        }
    }
}

impl TryFrom<CampaignRow> for CampaignInfo {
    type Error = Error;

    fn try_from(row: CampaignRow) -> Result<Self, Self::Error> {
        let status = row.status();
        let send_type = row.send_type();
        Ok(CampaignInfo {
            id: CampaignId(row.id),
            name: row.name,
            status,
            payload: serde_json::from_str(&row.payload)?,
            target: serde_json::from_str(&row.target)?,
            exclusions: serde_json::from_str(&row.exclusions)?,
            send_type,
            max_retries: row.max_retries.max(0) as u32,
            total_recipients: row.total_recipients.max(0) as u64,
            sent_count: row.sent_count.max(0) as u64,
            failed_count: row.failed_count.max(0) as u64,
            created_at: from_unix(row.created_at),
            started_at: row.started_at.map(from_unix),
            completed_at: row.completed_at.map(from_unix),
        })
    }
}

/// Recipient snapshot to be inserted alongside its campaign
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecipient {
    /// Targeted contact
    pub contact_id: ContactId,
    /// Pool the contact came from
    pub source_pool: SourcePool,
    /// Phone snapshot
    pub phone: String,
}

/// Recipient record from database
#[derive(Debug, Clone, FromRow)]
pub struct RecipientRow {
    /// Unique database ID
    pub id: i64,
    /// Owning campaign
    pub campaign_id: i64,
    /// Targeted contact
    pub contact_id: i64,
    /// Source pool storage name
    pub source_pool: String,
    /// Phone snapshot
    pub phone: String,
    /// Dispatch order within the campaign
    pub position: i64,
    /// Status code (see [`RecipientStatus::from_i32`])
    pub status: i32,
    /// Failed attempts so far
    pub retry_count: i64,
    /// Unix timestamp of delivery
    pub sent_at: Option<i64>,
    /// Provider message ID
    pub provider_message_id: Option<String>,
    /// Last error
    pub error_message: Option<String>,
}

impl RecipientRow {
    /// Decoded source pool (unknown names fall back to the least trusted pool)
    pub fn source_pool(&self) -> SourcePool {
        SourcePool::parse(&self.source_pool).unwrap_or(SourcePool::Tenants)
    }
}

impl From<RecipientRow> for RecipientInfo {
    fn from(row: RecipientRow) -> Self {
        let source_pool = row.source_pool();
        RecipientInfo {
            id: RecipientId(row.id),
            campaign_id: CampaignId(row.campaign_id),
            contact_id: ContactId(row.contact_id),
            source_pool,
            phone: row.phone,
            status: RecipientStatus::from_i32(row.status),
            retry_count: row.retry_count.max(0) as u32,
            sent_at: row.sent_at.map(from_unix),
            provider_message_id: row.provider_message_id,
            error_message: row.error_message,
        }
    }
}

/// New automated task
#[derive(Debug, Clone)]
pub struct NewTask {
    /// Task name
    pub name: String,
    /// Payload as JSON
    pub payload: String,
    /// Contact type filter
    pub target_category: Option<ContactType>,
    /// Unix timestamp of the first run (its time of day anchors recurring runs)
    pub scheduled_at: i64,
    /// Recurrence days (empty = one-shot)
    pub recurrence_days: Vec<Weekday>,
    /// Contacts to message per execution
    pub target_count: u32,
    /// Stop after this many executions
    pub max_executions: Option<u32>,
    /// Whether the poller may run this task
    pub enabled: bool,
}

/// Automated task record from database
#[derive(Debug, Clone, FromRow)]
pub struct TaskRow {
    /// Unique database ID
    pub id: i64,
    /// Task name
    pub name: String,
    /// Payload as JSON
    pub payload: String,
    /// Contact type filter storage name
    pub target_category: Option<String>,
    /// Unix timestamp of the first run
    pub scheduled_at: i64,
    /// Recurrence days as a JSON array
    pub recurrence_days: String,
    /// Contacts to message per execution
    pub target_count: i64,
    /// Executions so far
    pub execution_count: i64,
    /// Execution cap
    pub max_executions: Option<i64>,
    /// 1 if enabled
    pub enabled: i32,
    /// Unix timestamp of the last execution
    pub last_run_at: Option<i64>,
    /// Unix timestamp when the task was created
    pub created_at: i64,
}

impl TryFrom<TaskRow> for AutomatedTask {
    type Error = Error;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        Ok(AutomatedTask {
            id: TaskId(row.id),
            name: row.name,
            payload: serde_json::from_str(&row.payload)?,
            target_category: row.target_category.as_deref().map(ContactType::parse),
            scheduled_at: from_unix(row.scheduled_at),
            recurrence_days: serde_json::from_str(&row.recurrence_days)?,
            target_count: row.target_count.max(0) as u32,
            execution_count: row.execution_count.max(0) as u32,
            max_executions: row.max_executions.map(|m| m.max(0) as u32),
            enabled: row.enabled != 0,
            last_run_at: row.last_run_at.map(from_unix),
            created_at: from_unix(row.created_at),
        })
    }
}

/// Execution log entry to be appended
#[derive(Debug, Clone)]
pub struct NewTaskExecution {
    /// Task that ran
    pub task_id: TaskId,
    /// Whether the execution met the success threshold
    pub success: bool,
    /// Contacts attempted
    pub processed: u32,
    /// Messages delivered
    pub sent: u32,
    /// Messages failed
    pub failed: u32,
    /// Why nothing was processed, if so
    pub skipped_reason: Option<String>,
    /// Per-contact errors
    pub errors: Vec<String>,
}

/// Execution log record from database
#[derive(Debug, Clone, FromRow)]
pub struct TaskExecutionRow {
    /// Unique database ID
    pub id: i64,
    /// Task that ran
    pub task_id: i64,
    /// Unix timestamp of the execution
    pub executed_at: i64,
    /// 1 if successful
    pub success: i32,
    /// Contacts attempted
    pub processed: i64,
    /// Messages delivered
    pub sent: i64,
    /// Messages failed
    pub failed: i64,
    /// Why nothing was processed
    pub skipped_reason: Option<String>,
    /// Per-contact errors as a JSON array
    pub errors: String,
}

impl From<TaskExecutionRow> for TaskExecution {
    fn from(row: TaskExecutionRow) -> Self {
        TaskExecution {
            id: row.id,
            task_id: TaskId(row.task_id),
            executed_at: from_unix(row.executed_at),
            success: row.success != 0,
            processed: row.processed.max(0) as u32,
            sent: row.sent.max(0) as u32,
            failed: row.failed.max(0) as u32,
            skipped_reason: row.skipped_reason,
            errors: serde_json::from_str(&row.errors).unwrap_or_default(),
        }
    }
}

/// Which path produced a send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendSource {
    /// Campaign dispatch
    Campaign,
    /// Automated task
    Automation,
}

impl SendSource {
    /// Storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            SendSource::Campaign => "campaign",
            SendSource::Automation => "automation",
        }
    }
}

/// Send attempt to be appended to the history log
#[derive(Debug, Clone)]
pub struct NewSendRecord<'a> {
    /// Contact messaged
    pub contact_id: ContactId,
    /// Phone the message went to
    pub phone: &'a str,
    /// Sender identity (campaign sends use `campaign:<id>`)
    pub sender_id: &'a str,
    /// Which path produced the send
    pub source: SendSource,
    /// Campaign or task ID
    pub reference_id: Option<i64>,
    /// Whether the channel accepted the message
    pub success: bool,
    /// Provider message ID
    pub provider_message_id: Option<&'a str>,
    /// Channel error
    pub error_message: Option<&'a str>,
    /// Unix timestamp of the attempt
    pub sent_at: i64,
}

/// Send history record from database
#[derive(Debug, Clone, FromRow)]
pub struct SendHistoryRow {
    /// Unique database ID
    pub id: i64,
    /// Contact messaged
    pub contact_id: i64,
    /// Phone the message went to
    pub phone: String,
    /// Sender identity
    pub sender_id: String,
    /// "campaign" or "automation"
    pub source: String,
    /// Campaign or task ID
    pub reference_id: Option<i64>,
    /// 1 if the channel accepted the message
    pub success: i32,
    /// Provider message ID
    pub provider_message_id: Option<String>,
    /// Channel error
    pub error_message: Option<String>,
    /// Unix timestamp of the attempt
    pub sent_at: i64,
}

/// Database handle
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
