//! Configuration types for bulk-outreach

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Campaign dispatch configuration (pacing, batching, concurrency)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DispatchConfig {
    /// Delay between two consecutive sends of one campaign (default: 1 second)
    #[serde(default = "default_pacing_delay", with = "duration_serde")]
    pub pacing_delay: Duration,

    /// Batch size offered to gradual campaigns that do not set one (default: 10)
    #[serde(default = "default_batch_size")]
    pub default_batch_size: u32,

    /// Inter-batch pause offered to gradual campaigns (default: 300 seconds)
    #[serde(default = "default_inter_batch_delay", with = "duration_serde")]
    pub default_inter_batch_delay: Duration,

    /// Failed attempts allowed per recipient when a campaign does not say (default: 3)
    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,

    /// Campaigns allowed to dispatch at the same time (default: 4)
    #[serde(default = "default_max_concurrent_campaigns")]
    pub max_concurrent_campaigns: usize,

    /// Re-dispatch campaigns that were sending when the process stopped (default: true)
    #[serde(default = "default_true")]
    pub resume_on_startup: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            pacing_delay: default_pacing_delay(),
            default_batch_size: default_batch_size(),
            default_inter_batch_delay: default_inter_batch_delay(),
            default_max_retries: default_max_retries(),
            max_concurrent_campaigns: default_max_concurrent_campaigns(),
            resume_on_startup: true,
        }
    }
}

/// Automated outreach configuration (cooldown, daily limit, poller)
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct AutomationConfig {
    /// Master switch for automated sends (default: false)
    ///
    /// When disabled, due tasks still run but report zero processed contacts.
    #[serde(default)]
    pub auto_send_enabled: bool,

    /// How often the poller looks for due tasks (default: 60 seconds)
    #[serde(default = "default_check_interval", with = "duration_serde")]
    pub check_interval: Duration,

    /// Hours a contact stays ineligible after a successful send (default: 24, at most `MAX_COOLDOWN_HOURS`)
    #[serde(default = "default_cooldown_hours")]
    pub cooldown_hours: u32,

    /// Successful sends allowed per sender per calendar day (default: 100)
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,

    /// Delay between two automated sends (default: 2 seconds)
    #[serde(default = "default_automation_pacing", with = "duration_serde")]
    pub pacing_delay: Duration,

    /// Sender identity counted against the daily limit (default: "automation")
    #[serde(default = "default_sender_id")]
    pub sender_id: String,

    /// Minimum success rate for an execution to count as successful (default: 0.5)
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: f64,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            auto_send_enabled: false,
            check_interval: default_check_interval(),
            cooldown_hours: default_cooldown_hours(),
            daily_limit: default_daily_limit(),
            pacing_delay: default_automation_pacing(),
            sender_id: default_sender_id(),
            failure_threshold: default_failure_threshold(),
        }
    }
}

/// Duplicate merge configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DedupConfig {
    /// How long a merge waits for campaigns to release the affected pools (default: 30 seconds)
    #[serde(default = "default_merge_lock_timeout", with = "duration_serde")]
    pub merge_lock_timeout: Duration,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            merge_lock_timeout: default_merge_lock_timeout(),
        }
    }
}

/// Messaging provider configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ChannelConfig {
    /// Provider base URL (None = messages are accepted locally and never leave the process)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Bearer token sent with every provider request
    #[serde(default)]
    pub api_token: Option<String>,

    /// Provider request timeout (default: 30 seconds)
    #[serde(default = "default_channel_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_token: None,
            timeout: default_channel_timeout(),
        }
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PersistenceConfig {
    /// Database path (default: "./bulk-outreach.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// API and external server integration configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ServerIntegrationConfig {
    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:6790)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// Main configuration for OutreachEngine
///
/// Fields are grouped into sub-configs:
/// - [`dispatch`](DispatchConfig) pacing, batching, concurrency
/// - [`automation`](AutomationConfig) cooldown, daily limit, poller
/// - [`dedup`](DedupConfig) merge lock timeout
/// - [`channel`](ChannelConfig) messaging provider
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Campaign dispatch settings
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Automated outreach settings
    #[serde(default)]
    pub automation: AutomationConfig,

    /// Duplicate merge settings
    #[serde(default)]
    pub dedup: DedupConfig,

    /// Messaging provider settings
    #[serde(default)]
    pub channel: ChannelConfig,

    /// Data storage
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// API and external server integration
    #[serde(flatten)]
    pub server: ServerIntegrationConfig,
}

/// Longest accepted contact cooldown (ten years)
pub const MAX_COOLDOWN_HOURS: u32 = 87_600;

impl Config {
    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.dispatch.max_concurrent_campaigns == 0 {
            return Err(config_error(
                "max_concurrent_campaigns must be at least 1",
                "dispatch.max_concurrent_campaigns",
            ));
        }
        if self.dispatch.default_batch_size == 0 {
            return Err(config_error(
                "default_batch_size must be at least 1",
                "dispatch.default_batch_size",
            ));
        }
        if !(0.0..=1.0).contains(&self.automation.failure_threshold) {
            return Err(config_error(
                "failure_threshold must be between 0.0 and 1.0",
                "automation.failure_threshold",
            ));
        }
        if self.automation.cooldown_hours > MAX_COOLDOWN_HOURS {
            return Err(config_error(
                &format!("cooldown_hours must be at most {MAX_COOLDOWN_HOURS}"),
                "automation.cooldown_hours",
            ));
        }
        if self.automation.check_interval.is_zero() {
            return Err(config_error(
                "check_interval must be greater than zero",
                "automation.check_interval",
            ));
        }
        if self.automation.sender_id.trim().is_empty() {
            return Err(config_error(
                "sender_id must not be blank",
                "automation.sender_id",
            ));
        }
        if let Some(endpoint) = &self.channel.endpoint {
            url::Url::parse(endpoint).map_err(|e| {
                config_error(
                    &format!("invalid channel endpoint '{endpoint}': {e}"),
                    "channel.endpoint",
                )
            })?;
        }
        Ok(())
    }
}

fn config_error(message: &str, key: &str) -> Error {
    Error::Config {
        message: message.to_string(),
        key: Some(key.to_string()),
    }
}

fn default_pacing_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_batch_size() -> u32 {
    10
}

fn default_inter_batch_delay() -> Duration {
    Duration::from_secs(300)
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_concurrent_campaigns() -> usize {
    4
}

fn default_true() -> bool {
    true
}

fn default_check_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_cooldown_hours() -> u32 {
    24
}

fn default_daily_limit() -> u32 {
    100
}

fn default_automation_pacing() -> Duration {
    Duration::from_secs(2)
}

fn default_sender_id() -> String {
    "automation".to_string()
}

fn default_failure_threshold() -> f64 {
    0.5
}

fn default_merge_lock_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_channel_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./bulk-outreach.db")
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6790))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
