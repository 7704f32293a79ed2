//! Append-only send history.
//!
//! Cooldown eligibility and daily caps are always computed from these rows, never from an
//! in-memory cache, so they survive restarts.

use crate::error::DatabaseError;
use crate::types::ContactId;
use crate::{Error, Result};

use super::{Database, NewSendRecord, SendHistoryRow};

impl Database {
    /// Append one send attempt
    pub async fn insert_send_record(&self, record: &NewSendRecord<'_>) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO send_history (
                contact_id, phone, sender_id, source, reference_id,
                success, provider_message_id, error_message, sent_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.contact_id)
        .bind(record.phone)
        .bind(record.sender_id)
        .bind(record.source.as_str())
        .bind(record.reference_id)
        .bind(record.success as i32)
        .bind(record.provider_message_id)
        .bind(record.error_message)
        .bind(record.sent_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert send record: {}",
                e
            )))
        })?;

        Ok(result.last_insert_rowid())
    }

    /// Timestamp of the most recent successful send to a contact
    pub async fn last_successful_send(&self, contact_id: ContactId) -> Result<Option<i64>> {
        let last: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(sent_at) FROM send_history WHERE contact_id = ? AND success = 1",
        )
        .bind(contact_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to query last send: {}",
                e
            )))
        })?;

        Ok(last)
    }

    /// Contacts with a successful send strictly after `after`
    pub async fn contacts_sent_after(&self, after: i64) -> Result<Vec<ContactId>> {
        let ids: Vec<ContactId> = sqlx::query_scalar(
            "SELECT DISTINCT contact_id FROM send_history WHERE success = 1 AND sent_at > ?",
        )
        .bind(after)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to query recent sends: {}",
                e
            )))
        })?;

        Ok(ids)
    }

    /// Count successful sends by `sender_id` at or after `since`
    pub async fn count_successful_sends_since(&self, sender_id: &str, since: i64) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM send_history WHERE sender_id = ? AND success = 1 AND sent_at >= ?",
        )
        .bind(sender_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to count sends: {}",
                e
            )))
        })?;

        Ok(count.max(0) as u64)
    }

    /// Send history of a contact, newest first
    pub async fn list_contact_history(
        &self,
        contact_id: ContactId,
        limit: usize,
    ) -> Result<Vec<SendHistoryRow>> {
        let rows = sqlx::query_as::<_, SendHistoryRow>(
            r#"
            SELECT id, contact_id, phone, sender_id, source, reference_id,
                   success, provider_message_id, error_message, sent_at
            FROM send_history
            WHERE contact_id = ?
            ORDER BY sent_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(contact_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list send history: {}",
                e
            )))
        })?;

        Ok(rows)
    }
}
