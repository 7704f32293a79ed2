//! Core types for bulk-outreach

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ValidationError;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Create a new id from its raw value
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the inner i64 value
            pub fn get(&self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl PartialEq<i64> for $name {
            fn eq(&self, other: &i64) -> bool {
                self.0 == *other
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }

        impl sqlx::Type<sqlx::Sqlite> for $name {
            fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
                <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
            }

            fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
                <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
            ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
                sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for $name {
            fn decode(
                value: sqlx::sqlite::SqliteValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
                Ok(Self(id))
            }
        }
    };
}

record_id!(
    /// Unique identifier for a campaign
    CampaignId
);
record_id!(
    /// Unique identifier for a recipient row within a campaign
    RecipientId
);
record_id!(
    /// Unique identifier for a contact (unique across all source pools)
    ContactId
);
record_id!(
    /// Unique identifier for an automated task
    TaskId
);

/// Campaign lifecycle status
///
/// `Completed` and `Cancelled` are terminal. See [`crate::state`] for the transition table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    /// Created, not yet started
    Draft,
    /// Start requested, waiting for a dispatch slot
    Queued,
    /// Dispatch in progress
    Sending,
    /// Paused by operator; pending recipients stay pending
    Paused,
    /// No pending or in-flight recipients remain
    Completed,
    /// Cancelled by operator
    Cancelled,
}

impl CampaignStatus {
    /// Convert integer status code to CampaignStatus
    pub fn from_i32(status: i32) -> Self {
        match status {
            0 => CampaignStatus::Draft,
            1 => CampaignStatus::Queued,
            2 => CampaignStatus::Sending,
            3 => CampaignStatus::Paused,
            4 => CampaignStatus::Completed,
            5 => CampaignStatus::Cancelled,
            _ => CampaignStatus::Cancelled, // Unknown codes are treated as terminal
        }
    }

    /// Convert CampaignStatus to integer status code
    pub fn to_i32(&self) -> i32 {
        match self {
            CampaignStatus::Draft => 0,
            CampaignStatus::Queued => 1,
            CampaignStatus::Sending => 2,
            CampaignStatus::Paused => 3,
            CampaignStatus::Completed => 4,
            CampaignStatus::Cancelled => 5,
        }
    }

    /// Lowercase name, as used in API payloads and error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Queued => "queued",
            CampaignStatus::Sending => "sending",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Cancelled => "cancelled",
        }
    }

    /// Whether no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, CampaignStatus::Completed | CampaignStatus::Cancelled)
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-recipient delivery status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RecipientStatus {
    /// Waiting to be sent
    Pending,
    /// Send attempt in flight
    Sending,
    /// Accepted by the channel
    Sent,
    /// Rejected by the channel (may be retried while retries remain)
    Failed,
}

impl RecipientStatus {
    /// Convert integer status code to RecipientStatus
    pub fn from_i32(status: i32) -> Self {
        match status {
            0 => RecipientStatus::Pending,
            1 => RecipientStatus::Sending,
            2 => RecipientStatus::Sent,
            _ => RecipientStatus::Failed,
        }
    }

    /// Convert RecipientStatus to integer status code
    pub fn to_i32(&self) -> i32 {
        match self {
            RecipientStatus::Pending => 0,
            RecipientStatus::Sending => 1,
            RecipientStatus::Sent => 2,
            RecipientStatus::Failed => 3,
        }
    }

    /// Parse the lowercase API name
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(RecipientStatus::Pending),
            "sending" => Some(RecipientStatus::Sending),
            "sent" => Some(RecipientStatus::Sent),
            "failed" => Some(RecipientStatus::Failed),
            _ => None,
        }
    }
}

/// Origin table a contact was imported from
///
/// The declaration order is the trust ranking used by deduplication:
/// the first variant is the most trusted. See [`SourcePool::rank`].
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum SourcePool {
    /// Contacts synced from the messaging channel itself
    ChannelContacts,
    /// Real-estate brokers
    Brokers,
    /// Property owners
    Owners,
    /// Generic clients and leads
    Clients,
    /// Tenants
    Tenants,
}

impl SourcePool {
    /// All pools, most trusted first
    pub const ALL: [SourcePool; 5] = [
        SourcePool::ChannelContacts,
        SourcePool::Brokers,
        SourcePool::Owners,
        SourcePool::Clients,
        SourcePool::Tenants,
    ];

    /// Trust rank used when choosing which duplicate to keep (lower wins)
    ///
    /// This table is fixed; operators override individual groups with
    /// `reassign_primary`, never by changing ranks.
    pub fn rank(&self) -> u8 {
        match self {
            SourcePool::ChannelContacts => 0,
            SourcePool::Brokers => 1,
            SourcePool::Owners => 2,
            SourcePool::Clients => 3,
            SourcePool::Tenants => 4,
        }
    }

    /// Stable storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            SourcePool::ChannelContacts => "channel_contacts",
            SourcePool::Brokers => "brokers",
            SourcePool::Owners => "owners",
            SourcePool::Clients => "clients",
            SourcePool::Tenants => "tenants",
        }
    }

    /// Parse a storage name
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == value)
    }
}

impl std::fmt::Display for SourcePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Business role of a contact, used for targeting
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContactType {
    /// Buyer or general client
    Client,
    /// Property owner
    Owner,
    /// Tenant
    Tenant,
    /// Broker or agent
    Broker,
    /// Service supplier (maintenance, cleaning, ...)
    Supplier,
    /// Unqualified lead
    Lead,
    /// Anything else
    Other,
}

impl ContactType {
    /// Stable storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactType::Client => "client",
            ContactType::Owner => "owner",
            ContactType::Tenant => "tenant",
            ContactType::Broker => "broker",
            ContactType::Supplier => "supplier",
            ContactType::Lead => "lead",
            ContactType::Other => "other",
        }
    }

    /// Parse a storage name; unknown values map to `Other`
    pub fn parse(value: &str) -> Self {
        match value {
            "client" => ContactType::Client,
            "owner" => ContactType::Owner,
            "tenant" => ContactType::Tenant,
            "broker" => ContactType::Broker,
            "supplier" => ContactType::Supplier,
            "lead" => ContactType::Lead,
            _ => ContactType::Other,
        }
    }
}

/// Contact priority, used to rank automated outreach targets
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Low priority (0)
    Low = 0,
    /// Medium priority (1)
    #[default]
    Medium = 1,
    /// High priority (2)
    High = 2,
}

impl Priority {
    /// Convert integer priority code to Priority
    pub fn from_i32(priority: i32) -> Self {
        match priority {
            0 => Priority::Low,
            2 => Priority::High,
            _ => Priority::Medium,
        }
    }
}

/// A contact as seen by the engine, regardless of which pool it came from
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Contact {
    /// Contact ID
    pub id: ContactId,
    /// Origin table
    pub source_pool: SourcePool,
    /// Display name
    pub name: String,
    /// Raw phone number as entered
    pub phone: Option<String>,
    /// Email address
    pub email: Option<String>,
    /// Company name
    pub company: Option<String>,
    /// Free-form notes
    pub notes: Option<String>,
    /// Business role
    pub contact_type: ContactType,
    /// Free-form tags
    pub tags: Vec<String>,
    /// Outreach priority
    pub priority: Priority,
}

/// Kind of media attached to a media message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Image
    Image,
    /// Video
    Video,
    /// Audio
    Audio,
    /// Document (PDF, brochure, ...)
    Document,
}

/// Quick-reply button on a button message
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReplyButton {
    /// Identifier returned by the channel when the button is pressed
    pub id: String,
    /// Visible label
    pub label: String,
}

/// Maximum number of buttons a button message may carry
pub const MAX_BUTTONS: usize = 3;
/// Minimum number of options in a poll
pub const MIN_POLL_OPTIONS: usize = 2;
/// Maximum number of options in a poll
pub const MAX_POLL_OPTIONS: usize = 12;

/// Message payload, one variant per message type
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagePayload {
    /// Plain text
    Text {
        /// Message body
        body: String,
    },
    /// Image, video, audio or document with an optional caption
    Media {
        /// Publicly reachable media URL
        url: String,
        /// Kind of media
        media_kind: MediaKind,
        /// Caption shown under the media
        #[serde(default)]
        caption: Option<String>,
        /// File name shown for documents
        #[serde(default)]
        filename: Option<String>,
    },
    /// Text with quick-reply buttons
    Button {
        /// Message body
        body: String,
        /// Optional footer line
        #[serde(default)]
        footer: Option<String>,
        /// One to three buttons
        buttons: Vec<ReplyButton>,
    },
    /// Poll
    Poll {
        /// Poll question
        question: String,
        /// Distinct answer options
        options: Vec<String>,
        /// Whether more than one option may be selected
        #[serde(default)]
        allow_multiple: bool,
    },
}

impl MessagePayload {
    /// Short type name ("text", "media", "button", "poll")
    pub fn kind(&self) -> &'static str {
        match self {
            MessagePayload::Text { .. } => "text",
            MessagePayload::Media { .. } => "media",
            MessagePayload::Button { .. } => "button",
            MessagePayload::Poll { .. } => "poll",
        }
    }

    /// Check every field the chosen message type requires
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        match self {
            MessagePayload::Text { body } => require_text("payload.body", body),
            MessagePayload::Media { url, .. } => {
                require_text("payload.url", url)?;
                let parsed = url::Url::parse(url)
                    .map_err(|e| ValidationError::invalid("payload.url", e.to_string()))?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(ValidationError::invalid(
                        "payload.url",
                        "media must be served over http or https",
                    ));
                }
                Ok(())
            }
            MessagePayload::Button { body, buttons, .. } => {
                require_text("payload.body", body)?;
                if buttons.is_empty() || buttons.len() > MAX_BUTTONS {
                    return Err(ValidationError::invalid(
                        "payload.buttons",
                        format!("expected 1 to {MAX_BUTTONS} buttons, got {}", buttons.len()),
                    ));
                }
                for (i, button) in buttons.iter().enumerate() {
                    require_text(&format!("payload.buttons[{i}].id"), &button.id)?;
                    require_text(&format!("payload.buttons[{i}].label"), &button.label)?;
                }
                Ok(())
            }
            MessagePayload::Poll {
                question, options, ..
            } => {
                require_text("payload.question", question)?;
                if options.len() < MIN_POLL_OPTIONS || options.len() > MAX_POLL_OPTIONS {
                    return Err(ValidationError::invalid(
                        "payload.options",
                        format!(
                            "expected {MIN_POLL_OPTIONS} to {MAX_POLL_OPTIONS} options, got {}",
                            options.len()
                        ),
                    ));
                }
                let mut seen = std::collections::HashSet::new();
                for option in options {
                    let trimmed = option.trim();
                    if trimmed.is_empty() {
                        return Err(ValidationError::invalid(
                            "payload.options",
                            "options must not be blank",
                        ));
                    }
                    if !seen.insert(trimmed.to_lowercase()) {
                        return Err(ValidationError::invalid(
                            "payload.options",
                            format!("duplicate option '{trimmed}'"),
                        ));
                    }
                }
                Ok(())
            }
        }
    }
}

fn require_text(field: &str, value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::missing(field))
    } else {
        Ok(())
    }
}

/// Which contacts a campaign targets
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum TargetRule {
    /// Every live contact in every pool
    All,
    /// Contacts of the listed types
    ByType {
        /// Accepted contact types
        types: Vec<ContactType>,
    },
    /// Contacts whose company matches one of the names (case-insensitive)
    ByCompany {
        /// Company names
        companies: Vec<String>,
    },
    /// Contacts carrying at least one of the tags (case-insensitive)
    ByTag {
        /// Tags
        tags: Vec<String>,
    },
    /// An explicit hand-picked list
    Explicit {
        /// Contact IDs
        contact_ids: Vec<ContactId>,
    },
}

/// Filters removed from the targeted set
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Exclusions {
    /// Contacts never to message
    #[serde(default)]
    pub contact_ids: Vec<ContactId>,
    /// Contact types to drop
    #[serde(default)]
    pub types: Vec<ContactType>,
    /// Tags to drop (case-insensitive)
    #[serde(default)]
    pub tags: Vec<String>,
    /// Phone numbers to drop (compared after normalization)
    #[serde(default)]
    pub phones: Vec<String>,
    /// Drop contacts that received a successful send within this many hours
    #[serde(default)]
    pub contacted_within_hours: Option<u32>,
}

/// Dispatch strategy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SendType {
    /// One paced pass over every pending recipient
    Immediate,
    /// Fixed-size batches separated by a cooldown
    ///
    /// Zero (or an omitted field) in a submitted definition means the configured default.
    Gradual {
        /// Recipients per batch
        #[serde(default)]
        batch_size: u32,
        /// Pause between batches, in seconds
        #[serde(default)]
        inter_batch_delay_secs: u64,
    },
}

impl SendType {
    /// Integer code stored in the database
    pub fn to_i32(&self) -> i32 {
        match self {
            SendType::Immediate => 0,
            SendType::Gradual { .. } => 1,
        }
    }
}

/// Campaign submission
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CampaignDefinition {
    /// Campaign name
    pub name: String,
    /// What to send
    pub payload: MessagePayload,
    /// Who to send it to
    pub target: TargetRule,
    /// Who to leave out
    #[serde(default)]
    pub exclusions: Exclusions,
    /// How to pace it
    pub send_type: SendType,
    /// Maximum failed attempts per recipient (defaults to the configured value)
    #[serde(default)]
    pub max_retries: Option<u32>,
}

/// Campaign as returned by the API
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CampaignInfo {
    /// Campaign ID
    pub id: CampaignId,
    /// Campaign name
    pub name: String,
    /// Current status
    pub status: CampaignStatus,
    /// Payload
    pub payload: MessagePayload,
    /// Targeting rule
    pub target: TargetRule,
    /// Exclusions
    pub exclusions: Exclusions,
    /// Dispatch strategy
    pub send_type: SendType,
    /// Maximum failed attempts per recipient
    pub max_retries: u32,
    /// Recipients frozen at creation
    pub total_recipients: u64,
    /// Recipients delivered
    pub sent_count: u64,
    /// Recipients currently failed
    pub failed_count: u64,
    /// When the campaign was created
    pub created_at: DateTime<Utc>,
    /// When dispatch first started
    pub started_at: Option<DateTime<Utc>>,
    /// When the campaign completed
    pub completed_at: Option<DateTime<Utc>>,
}

/// One recipient's delivery record
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RecipientInfo {
    /// Recipient ID
    pub id: RecipientId,
    /// Owning campaign
    pub campaign_id: CampaignId,
    /// Targeted contact
    pub contact_id: ContactId,
    /// Pool the contact came from
    pub source_pool: SourcePool,
    /// Phone snapshot taken at creation
    pub phone: String,
    /// Current status
    pub status: RecipientStatus,
    /// Failed attempts so far
    pub retry_count: u32,
    /// When the message was accepted
    pub sent_at: Option<DateTime<Utc>>,
    /// Provider message ID
    pub provider_message_id: Option<String>,
    /// Last error
    pub error_message: Option<String>,
}

/// Live campaign progress
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProgressSnapshot {
    /// Campaign ID
    pub campaign_id: CampaignId,
    /// Campaign status at the time of the snapshot
    pub status: CampaignStatus,
    /// Recipients delivered
    pub sent: u64,
    /// Recipients failed
    pub failed: u64,
    /// Recipients not yet resolved (pending or in flight)
    pub pending: u64,
    /// Total recipients
    pub total: u64,
    /// `sent / (sent + failed)`, 0 when nothing has been attempted
    pub success_rate: f64,
    /// Estimated minutes to drain `pending` at the observed rate
    pub eta_minutes: Option<f64>,
}

/// Event emitted by the engine
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Campaign created with its frozen recipient set
    CampaignCreated {
        /// Campaign ID
        id: CampaignId,
        /// Campaign name
        name: String,
        /// Recipients created
        total_recipients: u64,
    },

    /// Campaign waiting for a dispatch slot
    CampaignQueued {
        /// Campaign ID
        id: CampaignId,
    },

    /// Dispatch started or resumed
    CampaignSending {
        /// Campaign ID
        id: CampaignId,
    },

    /// Campaign paused
    CampaignPaused {
        /// Campaign ID
        id: CampaignId,
    },

    /// Campaign cancelled
    CampaignCancelled {
        /// Campaign ID
        id: CampaignId,
    },

    /// Campaign completed
    CampaignCompleted {
        /// Campaign ID
        id: CampaignId,
        /// Recipients delivered
        sent: u64,
        /// Recipients failed
        failed: u64,
    },

    /// Campaign soft-deleted
    CampaignDeleted {
        /// Campaign ID
        id: CampaignId,
    },

    /// Dispatch run aborted on a store failure
    CampaignAborted {
        /// Campaign ID
        id: CampaignId,
        /// Failure description
        error: String,
    },

    /// One recipient delivered
    RecipientSent {
        /// Campaign ID
        campaign_id: CampaignId,
        /// Recipient ID
        recipient_id: RecipientId,
    },

    /// One recipient failed
    RecipientFailed {
        /// Campaign ID
        campaign_id: CampaignId,
        /// Recipient ID
        recipient_id: RecipientId,
        /// Channel error
        error: String,
    },

    /// A batch finished (gradual dispatch numbers batches from 1)
    BatchCompleted {
        /// Campaign ID
        campaign_id: CampaignId,
        /// Batch number
        batch: u32,
        /// Recipients attempted in this batch
        size: u32,
    },

    /// Failed recipients reset to pending
    RetryScheduled {
        /// Campaign ID
        campaign_id: CampaignId,
        /// Recipients reset
        count: u64,
    },

    /// Progress update
    Progress {
        /// Snapshot taken after the last recipient result
        snapshot: ProgressSnapshot,
    },

    /// Duplicate merge finished
    DuplicatesMerged {
        /// Contacts retired
        merged: u64,
        /// Contacts that could not be retired
        errors: u64,
    },

    /// Automated task executed
    TaskExecuted {
        /// Task ID
        task_id: TaskId,
        /// Whether the execution met the success threshold
        success: bool,
        /// Messages sent
        sent: u64,
        /// Messages failed
        failed: u64,
    },

    /// Engine is shutting down
    Shutdown,
}
