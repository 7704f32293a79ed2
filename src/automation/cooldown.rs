//! Per-contact cooldown and per-sender daily cap, computed from the send history.

use crate::config::AutomationConfig;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::types::ContactId;
use chrono::{DateTime, Local, TimeZone, Utc};
use std::collections::HashSet;
use std::sync::Arc;

/// Cooldown and daily-limit checks for automated sends
///
/// Every answer is read from the append-only send history, so restarts never reset a
/// cooldown or the day's count.
#[derive(Clone)]
pub struct CooldownTracker {
    db: Arc<Database>,
    cooldown: chrono::Duration,
    daily_limit: u32,
    sender_id: String,
}

impl CooldownTracker {
    /// Tracker using the limits from `config`
    pub fn new(db: Arc<Database>, config: &AutomationConfig) -> Self {
        Self {
            db,
            cooldown: chrono::Duration::hours(i64::from(config.cooldown_hours)),
            daily_limit: config.daily_limit,
            sender_id: config.sender_id.clone(),
        }
    }

    /// Sender identity counted against the daily limit
    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    /// Whether `contact_id` may be messaged now
    pub async fn is_eligible(&self, contact_id: ContactId) -> Result<bool> {
        self.is_eligible_at(contact_id, Utc::now()).await
    }

    /// Whether `contact_id` had no successful send within the cooldown before `now`
    pub async fn is_eligible_at(&self, contact_id: ContactId, now: DateTime<Utc>) -> Result<bool> {
        let cutoff = self.cutoff(now)?;
        let last = self.db.last_successful_send(contact_id).await?;
        Ok(last.is_none_or(|sent_at| sent_at <= cutoff))
    }

    /// Contacts still cooling down at `now`
    pub async fn cooling_down_at(&self, now: DateTime<Utc>) -> Result<HashSet<ContactId>> {
        let cutoff = self.cutoff(now)?;
        Ok(self
            .db
            .contacts_sent_after(cutoff)
            .await?
            .into_iter()
            .collect())
    }

    /// Earliest send time that still counts against the cooldown at `now`
    fn cutoff(&self, now: DateTime<Utc>) -> Result<i64> {
        now.checked_sub_signed(self.cooldown)
            .map(|cutoff| cutoff.timestamp())
            .ok_or_else(|| Error::Config {
                message: format!("cooldown of {} hours is out of range", self.cooldown.num_hours()),
                key: Some("automation.cooldown_hours".to_string()),
            })
    }

    /// Sends left today for the automation sender
    pub async fn daily_remaining(&self) -> Result<u32> {
        self.daily_remaining_at(Local::now()).await
    }

    /// Sends left on the calendar day of `now` (local time)
    pub async fn daily_remaining_at(&self, now: DateTime<Local>) -> Result<u32> {
        let midnight = now.date_naive().and_time(chrono::NaiveTime::MIN);
        let start_of_day = Local
            .from_local_datetime(&midnight)
            .earliest()
            .map(|dt| dt.timestamp())
            .unwrap_or_else(|| now.timestamp() - 24 * 3600);

        let sent_today = self
            .db
            .count_successful_sends_since(&self.sender_id, start_of_day)
            .await?;

        Ok(u64::from(self.daily_limit).saturating_sub(sent_today) as u32)
    }
}
