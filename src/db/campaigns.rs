//! Campaign CRUD and guarded status transitions.

use crate::error::DatabaseError;
use crate::types::{CampaignId, CampaignStatus, RecipientStatus, SendType};
use crate::{Error, Result};

use super::{CampaignRow, Database, NewCampaign, NewRecipient};

const CAMPAIGN_COLUMNS: &str = "id, name, status, payload, target, exclusions, send_type, \
                                batch_size, inter_batch_delay_secs, max_retries, \
                                total_recipients, sent_count, failed_count, \
                                created_at, started_at, completed_at";

// Each recipient row binds 6 values; stay well under SQLite's bind variable limit
const MAX_RECIPIENTS_PER_INSERT: usize = 150;

impl Database {
    /// Insert a campaign in `draft` together with its frozen recipient list
    ///
    /// Recipients get consecutive positions in slice order; dispatch always follows that order.
    pub async fn insert_campaign(
        &self,
        campaign: &NewCampaign,
        recipients: &[NewRecipient],
    ) -> Result<CampaignId> {
        let now = chrono::Utc::now().timestamp();

        let (batch_size, inter_batch_delay_secs) = match campaign.send_type {
            SendType::Immediate => (None, None),
            SendType::Gradual {
                batch_size,
                inter_batch_delay_secs,
            } => (
                Some(i64::from(batch_size)),
                Some(inter_batch_delay_secs as i64),
            ),
        };

        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to begin transaction: {}",
                e
            )))
        })?;

        let result = sqlx::query(
            r#"
            INSERT INTO campaigns (
                name, status, payload, target, exclusions, send_type,
                batch_size, inter_batch_delay_secs, max_retries,
                total_recipients, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&campaign.name)
        .bind(CampaignStatus::Draft.to_i32())
        .bind(&campaign.payload)
        .bind(&campaign.target)
        .bind(&campaign.exclusions)
        .bind(campaign.send_type.to_i32())
        .bind(batch_size)
        .bind(inter_batch_delay_secs)
        .bind(i64::from(campaign.max_retries))
        .bind(recipients.len() as i64)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert campaign: {}",
                e
            )))
        })?;

        let campaign_id = CampaignId(result.last_insert_rowid());

        for (chunk_index, chunk) in recipients.chunks(MAX_RECIPIENTS_PER_INSERT).enumerate() {
            let offset = chunk_index * MAX_RECIPIENTS_PER_INSERT;
            let mut query_builder = sqlx::QueryBuilder::new(
                "INSERT INTO recipients (campaign_id, contact_id, source_pool, phone, position, status) ",
            );
            query_builder.push_values(chunk.iter().enumerate(), |mut b, (i, recipient)| {
                b.push_bind(campaign_id)
                    .push_bind(recipient.contact_id)
                    .push_bind(recipient.source_pool.as_str())
                    .push_bind(recipient.phone.clone())
                    .push_bind((offset + i) as i64)
                    .push_bind(RecipientStatus::Pending.to_i32());
            });

            query_builder.build().execute(&mut *tx).await.map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to insert recipients: {}",
                    e
                )))
            })?;
        }

        tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to commit campaign: {}",
                e
            )))
        })?;

        Ok(campaign_id)
    }

    /// Get a campaign by ID (soft-deleted campaigns are invisible)
    pub async fn get_campaign(&self, id: CampaignId) -> Result<Option<CampaignRow>> {
        let row = sqlx::query_as::<_, CampaignRow>(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ? AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get campaign: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// List campaigns, newest first
    pub async fn list_campaigns(&self) -> Result<Vec<CampaignRow>> {
        let rows = sqlx::query_as::<_, CampaignRow>(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE deleted_at IS NULL ORDER BY id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list campaigns: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// List campaigns with a specific status, oldest first
    pub async fn list_campaigns_by_status(
        &self,
        status: CampaignStatus,
    ) -> Result<Vec<CampaignRow>> {
        let rows = sqlx::query_as::<_, CampaignRow>(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns \
             WHERE status = ? AND deleted_at IS NULL ORDER BY id ASC"
        ))
        .bind(status.to_i32())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list campaigns by status: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Move a campaign from `from` to `to`
    ///
    /// Returns `false` when the campaign was no longer in `from` (a concurrent request won).
    /// Entering `sending` records `started_at` once; entering `completed` records
    /// `completed_at`.
    pub async fn transition_campaign(
        &self,
        id: CampaignId,
        from: CampaignStatus,
        to: CampaignStatus,
    ) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE campaigns SET
                status = ?,
                started_at = CASE WHEN ? THEN COALESCE(started_at, ?) ELSE started_at END,
                completed_at = CASE WHEN ? THEN ? ELSE completed_at END
            WHERE id = ? AND status = ? AND deleted_at IS NULL
            "#,
        )
        .bind(to.to_i32())
        .bind(to == CampaignStatus::Sending)
        .bind(now)
        .bind(to == CampaignStatus::Completed)
        .bind(now)
        .bind(id)
        .bind(from.to_i32())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to update campaign status: {}",
                e
            )))
        })?;

        Ok(result.rows_affected() > 0)
    }

    /// Flip a sending campaign to `completed` if no recipient is pending or in flight
    ///
    /// The drained check and the status change are one statement, so a concurrent retry that
    /// requeues recipients either lands before (and blocks completion) or after (and finds the
    /// campaign completed).
    pub async fn complete_if_drained(&self, id: CampaignId) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE campaigns SET status = ?, completed_at = ?
            WHERE id = ? AND status = ? AND deleted_at IS NULL
              AND NOT EXISTS (
                  SELECT 1 FROM recipients
                  WHERE campaign_id = campaigns.id AND status IN (?, ?)
              )
            "#,
        )
        .bind(CampaignStatus::Completed.to_i32())
        .bind(now)
        .bind(id)
        .bind(CampaignStatus::Sending.to_i32())
        .bind(RecipientStatus::Pending.to_i32())
        .bind(RecipientStatus::Sending.to_i32())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to complete campaign: {}",
                e
            )))
        })?;

        Ok(result.rows_affected() > 0)
    }

    /// Soft-delete a campaign; its recipients stay until a hard purge cascades them
    pub async fn soft_delete_campaign(&self, id: CampaignId) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();

        let result =
            sqlx::query("UPDATE campaigns SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL")
                .bind(now)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to delete campaign: {}",
                        e
                    )))
                })?;

        Ok(result.rows_affected() > 0)
    }

    /// Permanently remove soft-deleted campaigns; recipients cascade
    pub async fn purge_deleted_campaigns(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM campaigns WHERE deleted_at IS NOT NULL")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to purge campaigns: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected())
    }
}
