//! Contact pool storage.
//!
//! Every source pool lives in the same table, keyed by `source_pool`. Merges never hard-delete:
//! a retired contact keeps its row (for audit and send history joins) but disappears from
//! listings.

use crate::error::DatabaseError;
use crate::types::{Contact, ContactId, SourcePool};
use crate::{Error, Result};

use super::{ContactRow, Database, NewContact};

const CONTACT_COLUMNS: &str = "id, source_pool, name, phone, email, company, notes, \
                               contact_type, tags, priority";

impl Database {
    /// Insert a new contact
    pub async fn insert_contact(&self, contact: &NewContact) -> Result<ContactId> {
        let now = chrono::Utc::now().timestamp();
        let tags = serde_json::to_string(&contact.tags)?;

        let result = sqlx::query(
            r#"
            INSERT INTO contacts (
                source_pool, name, phone, email, company, notes,
                contact_type, tags, priority, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(contact.source_pool.as_str())
        .bind(&contact.name)
        .bind(&contact.phone)
        .bind(&contact.email)
        .bind(&contact.company)
        .bind(&contact.notes)
        .bind(contact.contact_type.as_str())
        .bind(tags)
        .bind(contact.priority as i32)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert contact: {}",
                e
            )))
        })?;

        Ok(ContactId(result.last_insert_rowid()))
    }

    /// List live (non-retired) contacts of one pool, oldest first
    pub async fn list_pool_contacts(&self, pool: SourcePool) -> Result<Vec<Contact>> {
        let rows = sqlx::query_as::<_, ContactRow>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts \
             WHERE source_pool = ? AND retired_at IS NULL ORDER BY id ASC"
        ))
        .bind(pool.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list contacts for pool {}: {}",
                pool, e
            )))
        })?;

        rows.into_iter().map(Contact::try_from).collect()
    }

    /// Get a contact by ID, including retired ones
    pub async fn get_contact(&self, id: ContactId) -> Result<Option<Contact>> {
        let row = sqlx::query_as::<_, ContactRow>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get contact: {}",
                e
            )))
        })?;

        row.map(Contact::try_from).transpose()
    }

    /// Retire a live contact of `pool`
    ///
    /// Fails with [`DatabaseError::NotFound`] if the contact does not belong to `pool` or is
    /// already retired, so a merge can never retire a record through the wrong pool.
    pub async fn retire_contact(&self, pool: SourcePool, id: ContactId) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            "UPDATE contacts SET retired_at = ? \
             WHERE id = ? AND source_pool = ? AND retired_at IS NULL",
        )
        .bind(now)
        .bind(id)
        .bind(pool.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to retire contact: {}",
                e
            )))
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::Database(DatabaseError::NotFound(format!(
                "contact {} not live in pool {}",
                id, pool
            ))));
        }

        Ok(())
    }
}
