//! Automated outreach
//!
//! Automated tasks are recurring or one-shot jobs ("remind suppliers every Monday at 9:00")
//! that pick their targets at run time instead of freezing a recipient list. Each execution:
//!
//! 1. Checks the master switch; when automated sends are disabled it reports zero processed
//!    with reason `"disabled"`
//! 2. Asks the [`CooldownTracker`] how many sends remain today for the automation sender
//! 3. Resolves eligible contacts (category filter, cooldown) ranked by contact priority
//! 4. Sends to `min(target_count, remaining, eligible)` of them through the shared channel,
//!    pacing between sends
//! 5. Logs the execution, even when logging itself is the thing that fails
//!
//! [`AutomationScheduler`] is the poller that runs due tasks on a fixed interval.

use crate::error::ValidationError;
use crate::types::{ContactType, MessagePayload, TaskId};
use chrono::{DateTime, Datelike, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

mod cooldown;
mod runner;
mod scheduler;

pub use cooldown::CooldownTracker;
pub use runner::TaskRunner;
pub use scheduler::{AutomationScheduler, SchedulerStatus, TickReport};

/// Reason reported when automated sends are switched off
pub const SKIP_DISABLED: &str = "disabled";
/// Reason reported when the sender used up today's allowance
pub const SKIP_DAILY_LIMIT: &str = "daily limit reached";
/// Reason reported when every candidate is cooling down or filtered out
pub const SKIP_NO_ELIGIBLE: &str = "no eligible contacts";

/// Days of the week for task recurrence
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    /// Monday
    Monday,
    /// Tuesday
    Tuesday,
    /// Wednesday
    Wednesday,
    /// Thursday
    Thursday,
    /// Friday
    Friday,
    /// Saturday
    Saturday,
    /// Sunday
    Sunday,
}

impl Weekday {
    /// Convert from chrono::Weekday to our Weekday
    pub fn from_chrono(wd: chrono::Weekday) -> Self {
        use chrono::Weekday as ChronoWd;
        match wd {
            ChronoWd::Mon => Weekday::Monday,
            ChronoWd::Tue => Weekday::Tuesday,
            ChronoWd::Wed => Weekday::Wednesday,
            ChronoWd::Thu => Weekday::Thursday,
            ChronoWd::Fri => Weekday::Friday,
            ChronoWd::Sat => Weekday::Saturday,
            ChronoWd::Sun => Weekday::Sunday,
        }
    }
}

/// A stored automated task
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct AutomatedTask {
    /// Task ID
    pub id: TaskId,
    /// Task name
    pub name: String,
    /// What to send
    pub payload: MessagePayload,
    /// Only contacts of this type (None = every contact)
    pub target_category: Option<ContactType>,
    /// First run; its local time of day anchors recurring runs
    pub scheduled_at: DateTime<Utc>,
    /// Days the task repeats on (empty = one-shot)
    pub recurrence_days: Vec<Weekday>,
    /// Contacts to message per execution
    pub target_count: u32,
    /// Executions so far
    pub execution_count: u32,
    /// Stop after this many executions
    pub max_executions: Option<u32>,
    /// Whether the poller may run this task
    pub enabled: bool,
    /// Last execution
    pub last_run_at: Option<DateTime<Utc>>,
    /// When the task was created
    pub created_at: DateTime<Utc>,
}

impl AutomatedTask {
    /// Whether the execution cap has been reached
    pub fn is_exhausted(&self) -> bool {
        self.max_executions
            .is_some_and(|max| self.execution_count >= max)
    }

    /// Whether the poller should run this task at `now`
    ///
    /// One-shot tasks are due once `scheduled_at` has passed and they have never run.
    /// Recurring tasks are due on listed weekdays once the scheduled time of day has passed,
    /// at most once per day.
    pub fn is_due(&self, now: DateTime<Local>) -> bool {
        if !self.enabled || self.is_exhausted() {
            return false;
        }

        let scheduled = self.scheduled_at.with_timezone(&Local);
        if now < scheduled {
            return false;
        }

        if self.recurrence_days.is_empty() {
            return self.last_run_at.is_none();
        }

        if !self
            .recurrence_days
            .contains(&Weekday::from_chrono(now.weekday()))
        {
            return false;
        }

        let today = now.date_naive().and_time(scheduled.time());
        let Some(occurrence) = Local.from_local_datetime(&today).earliest() else {
            // Scheduled time falls in a DST gap today
            return false;
        };
        if now < occurrence {
            return false;
        }

        self.last_run_at
            .is_none_or(|last| last.with_timezone(&Local) < occurrence)
    }
}

/// Task submission
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TaskDefinition {
    /// Task name
    pub name: String,
    /// What to send
    pub payload: MessagePayload,
    /// Only contacts of this type
    #[serde(default)]
    pub target_category: Option<ContactType>,
    /// First run
    pub scheduled_at: DateTime<Utc>,
    /// Days the task repeats on
    #[serde(default)]
    pub recurrence_days: Vec<Weekday>,
    /// Contacts to message per execution
    pub target_count: u32,
    /// Stop after this many executions
    #[serde(default)]
    pub max_executions: Option<u32>,
    /// Whether the poller may run this task (default: true)
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl TaskDefinition {
    /// Reject definitions that could never send anything
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::missing("name"));
        }
        self.payload.validate()?;
        if self.target_count == 0 {
            return Err(ValidationError::invalid(
                "target_count",
                "must be at least 1",
            ));
        }
        if self.max_executions == Some(0) {
            return Err(ValidationError::invalid(
                "max_executions",
                "must be at least 1 when set",
            ));
        }
        Ok(())
    }
}

/// One logged execution of a task
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TaskExecution {
    /// Log entry ID
    pub id: i64,
    /// Task that ran
    pub task_id: TaskId,
    /// When it ran
    pub executed_at: DateTime<Utc>,
    /// Whether it met the success threshold
    pub success: bool,
    /// Contacts attempted
    pub processed: u32,
    /// Messages delivered
    pub sent: u32,
    /// Messages failed
    pub failed: u32,
    /// Why nothing was processed
    pub skipped_reason: Option<String>,
    /// Per-contact errors
    pub errors: Vec<String>,
}

/// Result of running a task once
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ExecutionResult {
    /// Task that ran
    pub task_id: TaskId,
    /// Whether the success rate met the configured threshold
    pub success: bool,
    /// Contacts attempted
    pub processed: u32,
    /// Messages delivered
    pub sent: u32,
    /// Messages failed
    pub failed: u32,
    /// Why nothing was processed
    pub skipped_reason: Option<String>,
    /// Per-contact errors
    pub errors: Vec<String>,
}

impl ExecutionResult {
    /// Unsuccessful result with nothing processed yet
    pub fn empty(task_id: TaskId) -> Self {
        Self {
            task_id,
            success: false,
            processed: 0,
            sent: 0,
            failed: 0,
            skipped_reason: None,
            errors: Vec::new(),
        }
    }

    /// Execution that processed nothing
    ///
    /// Only a disabled run counts as unsuccessful; having nothing eligible is not a failure.
    pub fn skipped(task_id: TaskId, reason: &str) -> Self {
        Self {
            success: reason != SKIP_DISABLED,
            skipped_reason: Some(reason.to_string()),
            ..Self::empty(task_id)
        }
    }
}

/// Whether `sent` out of `sent + failed` meets `threshold`
pub fn meets_threshold(sent: u32, failed: u32, threshold: f64) -> bool {
    let attempted = sent + failed;
    if attempted == 0 {
        return true;
    }
    f64::from(sent) / f64::from(attempted) >= threshold
}
