//! Recipient lifecycle with transactional counter updates.
//!
//! Every status change is guarded by the expected current status (see
//! [`RecipientTransition`]), and every terminal result is committed in the same transaction as
//! the campaign counter it affects.

use crate::error::DatabaseError;
use crate::state::RecipientTransition;
use crate::types::{CampaignId, RecipientId, RecipientStatus, SourcePool};
use crate::{Error, Result};

use super::{Database, RecipientRow};

const RECIPIENT_COLUMNS: &str = "id, campaign_id, contact_id, source_pool, phone, position, \
                                 status, retry_count, sent_at, provider_message_id, error_message";

/// Error recorded on recipients found mid-send after a restart
pub const INTERRUPTED_ERROR: &str = "interrupted: process stopped while the send was in flight";

/// Outcome of one send attempt, as stored
#[derive(Debug, Clone, PartialEq)]
pub enum RecipientResult {
    /// Channel accepted the message
    Sent {
        /// Provider message ID
        provider_message_id: Option<String>,
    },
    /// Channel rejected the message
    Failed {
        /// Channel error
        error: String,
    },
}

/// Recipient counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecipientCounts {
    /// Waiting to be sent
    pub pending: u64,
    /// In flight
    pub sending: u64,
    /// Delivered
    pub sent: u64,
    /// Failed
    pub failed: u64,
}

impl RecipientCounts {
    /// Sum of all statuses
    pub fn total(&self) -> u64 {
        self.pending + self.sending + self.sent + self.failed
    }
}

fn query_failed(what: &str, e: impl std::fmt::Display) -> Error {
    Error::Database(DatabaseError::QueryFailed(format!("{}: {}", what, e)))
}

impl Database {
    /// Pending recipients of a campaign in dispatch order
    pub async fn list_pending_recipients(&self, campaign_id: CampaignId) -> Result<Vec<RecipientRow>> {
        self.list_recipients(campaign_id, Some(RecipientStatus::Pending))
            .await
    }

    /// Recipients of a campaign in dispatch order, optionally filtered by status
    pub async fn list_recipients(
        &self,
        campaign_id: CampaignId,
        status: Option<RecipientStatus>,
    ) -> Result<Vec<RecipientRow>> {
        let rows = match status {
            Some(status) => {
                sqlx::query_as::<_, RecipientRow>(&format!(
                    "SELECT {RECIPIENT_COLUMNS} FROM recipients \
                     WHERE campaign_id = ? AND status = ? ORDER BY position ASC"
                ))
                .bind(campaign_id)
                .bind(status.to_i32())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, RecipientRow>(&format!(
                    "SELECT {RECIPIENT_COLUMNS} FROM recipients \
                     WHERE campaign_id = ? ORDER BY position ASC"
                ))
                .bind(campaign_id)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| query_failed("Failed to list recipients", e))?;

        Ok(rows)
    }

    /// Distinct source pools a campaign's recipients were drawn from
    pub async fn campaign_source_pools(&self, campaign_id: CampaignId) -> Result<Vec<SourcePool>> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT source_pool FROM recipients WHERE campaign_id = ?",
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_failed("Failed to list campaign pools", e))?;

        Ok(names.iter().filter_map(|n| SourcePool::parse(n)).collect())
    }

    /// Count recipients per status
    pub async fn count_recipients(&self, campaign_id: CampaignId) -> Result<RecipientCounts> {
        let rows: Vec<(i32, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM recipients WHERE campaign_id = ? GROUP BY status",
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_failed("Failed to count recipients", e))?;

        let mut counts = RecipientCounts::default();
        for (status, count) in rows {
            let count = count.max(0) as u64;
            match RecipientStatus::from_i32(status) {
                RecipientStatus::Pending => counts.pending = count,
                RecipientStatus::Sending => counts.sending = count,
                RecipientStatus::Sent => counts.sent = count,
                RecipientStatus::Failed => counts.failed = count,
            }
        }
        Ok(counts)
    }

    /// Move a recipient `pending -> sending`
    ///
    /// Returns `false` if the recipient was not pending anymore, in which case it must not be
    /// sent.
    pub async fn claim_recipient(&self, id: RecipientId) -> Result<bool> {
        let transition = RecipientTransition::Claim;
        let result = sqlx::query("UPDATE recipients SET status = ? WHERE id = ? AND status = ?")
            .bind(transition.to().to_i32())
            .bind(id)
            .bind(transition.from().to_i32())
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("Failed to claim recipient", e))?;

        Ok(result.rows_affected() > 0)
    }

    /// Record the result of a send and bump the matching campaign counter atomically
    ///
    /// Returns `false` (and changes nothing) if the recipient was not in `sending`.
    pub async fn record_recipient_result(
        &self,
        campaign_id: CampaignId,
        id: RecipientId,
        result: &RecipientResult,
    ) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| query_failed("Failed to begin transaction", e))?;

        let (updated, counter) = match result {
            RecipientResult::Sent {
                provider_message_id,
            } => {
                let transition = RecipientTransition::Deliver;
                let updated = sqlx::query(
                    r#"
                    UPDATE recipients
                    SET status = ?, sent_at = ?, provider_message_id = ?, error_message = NULL
                    WHERE id = ? AND campaign_id = ? AND status = ?
                    "#,
                )
                .bind(transition.to().to_i32())
                .bind(now)
                .bind(provider_message_id)
                .bind(id)
                .bind(campaign_id)
                .bind(transition.from().to_i32())
                .execute(&mut *tx)
                .await
                .map_err(|e| query_failed("Failed to mark recipient sent", e))?;
                (updated, "sent_count")
            }
            RecipientResult::Failed { error } => {
                let transition = RecipientTransition::Fail;
                let updated = sqlx::query(
                    r#"
                    UPDATE recipients
                    SET status = ?, error_message = ?, retry_count = retry_count + 1
                    WHERE id = ? AND campaign_id = ? AND status = ?
                    "#,
                )
                .bind(transition.to().to_i32())
                .bind(error)
                .bind(id)
                .bind(campaign_id)
                .bind(transition.from().to_i32())
                .execute(&mut *tx)
                .await
                .map_err(|e| query_failed("Failed to mark recipient failed", e))?;
                (updated, "failed_count")
            }
        };

        if updated.rows_affected() == 0 {
            // Dropping the transaction rolls it back
            return Ok(false);
        }

        sqlx::query(&format!(
            "UPDATE campaigns SET {counter} = {counter} + 1 WHERE id = ?"
        ))
        .bind(campaign_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| query_failed("Failed to update campaign counters", e))?;

        tx.commit()
            .await
            .map_err(|e| query_failed("Failed to commit recipient result", e))?;

        Ok(true)
    }

    /// Reset failed recipients with retries left back to `pending`
    ///
    /// The failed counter is decremented in the same transaction. Returns how many recipients
    /// were requeued.
    pub async fn requeue_failed_recipients(
        &self,
        campaign_id: CampaignId,
        max_retries: u32,
    ) -> Result<u64> {
        let transition = RecipientTransition::Requeue;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| query_failed("Failed to begin transaction", e))?;

        let result = sqlx::query(
            r#"
            UPDATE recipients SET status = ?
            WHERE campaign_id = ? AND status = ? AND retry_count < ?
            "#,
        )
        .bind(transition.to().to_i32())
        .bind(campaign_id)
        .bind(transition.from().to_i32())
        .bind(i64::from(max_retries))
        .execute(&mut *tx)
        .await
        .map_err(|e| query_failed("Failed to requeue recipients", e))?;

        let requeued = result.rows_affected();
        if requeued > 0 {
            sqlx::query("UPDATE campaigns SET failed_count = failed_count - ? WHERE id = ?")
                .bind(requeued as i64)
                .bind(campaign_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| query_failed("Failed to update campaign counters", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| query_failed("Failed to commit requeue", e))?;

        Ok(requeued)
    }

    /// Mark every recipient left in `sending` as failed (interrupted) and fix the counters
    ///
    /// Called once at startup, before any dispatch run exists. Whether those messages reached
    /// the channel is unknown, so they are never resent automatically; an explicit retry
    /// requeues them. Returns the number of recipients touched.
    pub async fn fail_interrupted_recipients(&self) -> Result<u64> {
        let transition = RecipientTransition::Fail;

        let campaign_ids: Vec<CampaignId> =
            sqlx::query_scalar("SELECT DISTINCT campaign_id FROM recipients WHERE status = ?")
                .bind(transition.from().to_i32())
                .fetch_all(&self.pool)
                .await
                .map_err(|e| query_failed("Failed to find interrupted recipients", e))?;

        let mut total = 0;
        for campaign_id in campaign_ids {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| query_failed("Failed to begin transaction", e))?;

            let result = sqlx::query(
                r#"
                UPDATE recipients
                SET status = ?, error_message = ?, retry_count = retry_count + 1
                WHERE campaign_id = ? AND status = ?
                "#,
            )
            .bind(transition.to().to_i32())
            .bind(INTERRUPTED_ERROR)
            .bind(campaign_id)
            .bind(transition.from().to_i32())
            .execute(&mut *tx)
            .await
            .map_err(|e| query_failed("Failed to fail interrupted recipients", e))?;

            let affected = result.rows_affected();
            sqlx::query("UPDATE campaigns SET failed_count = failed_count + ? WHERE id = ?")
                .bind(affected as i64)
                .bind(campaign_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| query_failed("Failed to update campaign counters", e))?;

            tx.commit()
                .await
                .map_err(|e| query_failed("Failed to commit interrupted recipients", e))?;

            tracing::warn!(
                campaign_id = %campaign_id,
                recipients = affected,
                "Marked interrupted recipients as failed"
            );
            total += affected;
        }

        Ok(total)
    }
}
