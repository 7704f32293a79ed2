//! Database lifecycle and schema migrations.

use crate::error::DatabaseError;
use crate::{Error, Result};
use sqlx::SqliteConnection;
use sqlx::sqlite::SqlitePool;
use std::path::Path;

use super::Database;

impl Database {
    /// Create a new database connection
    ///
    /// Creates the database file if it doesn't exist and runs migrations.
    pub async fn new(path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to create database directory: {}",
                    e
                )))
            })?;
        }

        // Connect to database with foreign key enforcement and WAL mode
        use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to parse database path: {}",
                    e
                )))
            })?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to connect to database: {}",
                e
            )))
        })?;

        let db = Self { pool };

        // Run migrations
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to acquire connection: {}",
                e
            )))
        })?;

        // Create schema version table
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to create schema_version table: {}",
                e
            )))
        })?;

        // Check current version
        let current_version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to query schema version: {}",
                        e
                    )))
                })?
                .flatten();

        let current_version = current_version.unwrap_or(0);

        // Apply migrations
        if current_version < 1 {
            Self::migrate_v1(&mut conn).await?;
        }
        if current_version < 2 {
            Self::migrate_v2(&mut conn).await?;
        }

        Ok(())
    }

    /// Migration v1: contacts, campaigns and recipients
    async fn migrate_v1(conn: &mut SqliteConnection) -> Result<()> {
        Self::apply_migration(conn, 1).await
    }

    /// Migration v2: automated tasks, execution log and send history
    async fn migrate_v2(conn: &mut SqliteConnection) -> Result<()> {
        Self::apply_migration(conn, 2).await
    }

    /// Create the tables of one schema version
    async fn create_version_schema(conn: &mut SqliteConnection, version: i32) -> Result<()> {
        match version {
            1 => {
                Self::create_contacts_schema(conn).await?;
                Self::create_campaigns_schema(conn).await?;
                Self::create_recipients_schema(conn).await
            }
            2 => {
                Self::create_tasks_schema(conn).await?;
                Self::create_send_history_schema(conn).await
            }
            other => Err(Error::Database(DatabaseError::MigrationFailed(format!(
                "Unknown schema version {}",
                other
            )))),
        }
    }

    /// Apply one schema version inside BEGIN/COMMIT
    async fn apply_migration(conn: &mut SqliteConnection, version: i32) -> Result<()> {
        tracing::info!(version, "Applying database migration");

        // Wrap migration in a transaction so partial failures don't leave the DB in a broken state
        sqlx::query("BEGIN")
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to begin transaction: {}",
                    e
                )))
            })?;

        let result = async {
            Self::create_version_schema(conn, version).await?;
            Self::record_migration(conn, version).await?;
            Ok::<(), Error>(())
        }
        .await;

        match result {
            Ok(()) => {
                sqlx::query("COMMIT")
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| {
                        Error::Database(DatabaseError::MigrationFailed(format!(
                            "Failed to commit migration v{}: {}",
                            version, e
                        )))
                    })?;
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                return Err(e);
            }
        }

        tracing::info!(version, "Database migration complete");
        Ok(())
    }

    /// Execute one DDL statement, naming it in the error
    async fn execute_ddl(conn: &mut SqliteConnection, sql: &str, what: &str) -> Result<()> {
        sqlx::query(sql).execute(&mut *conn).await.map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to create {}: {}",
                what, e
            )))
        })?;
        Ok(())
    }

    /// Create contacts table and its indexes
    async fn create_contacts_schema(conn: &mut SqliteConnection) -> Result<()> {
        Self::execute_ddl(
            conn,
            r#"
            CREATE TABLE contacts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_pool TEXT NOT NULL,
                name TEXT NOT NULL,
                phone TEXT,
                email TEXT,
                company TEXT,
                notes TEXT,
                contact_type TEXT NOT NULL DEFAULT 'other',
                tags TEXT NOT NULL DEFAULT '[]',
                priority INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL,
                retired_at INTEGER
            )
            "#,
            "contacts table",
        )
        .await?;

        Self::execute_ddl(
            conn,
            "CREATE INDEX idx_contacts_pool ON contacts(source_pool, retired_at)",
            "index",
        )
        .await
    }

    /// Create campaigns table
    async fn create_campaigns_schema(conn: &mut SqliteConnection) -> Result<()> {
        Self::execute_ddl(
            conn,
            r#"
            CREATE TABLE campaigns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                status INTEGER NOT NULL DEFAULT 0,
                payload TEXT NOT NULL,
                target TEXT NOT NULL,
                exclusions TEXT NOT NULL,
                send_type INTEGER NOT NULL,
                batch_size INTEGER,
                inter_batch_delay_secs INTEGER,
                max_retries INTEGER NOT NULL,
                total_recipients INTEGER NOT NULL,
                sent_count INTEGER NOT NULL DEFAULT 0,
                failed_count INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                started_at INTEGER,
                completed_at INTEGER,
                deleted_at INTEGER,
                CHECK (sent_count + failed_count <= total_recipients)
            )
            "#,
            "campaigns table",
        )
        .await?;

        Self::execute_ddl(
            conn,
            "CREATE INDEX idx_campaigns_status ON campaigns(status, deleted_at)",
            "index",
        )
        .await
    }

    /// Create recipients table and its indexes
    async fn create_recipients_schema(conn: &mut SqliteConnection) -> Result<()> {
        Self::execute_ddl(
            conn,
            r#"
            CREATE TABLE recipients (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                campaign_id INTEGER NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
                contact_id INTEGER NOT NULL,
                source_pool TEXT NOT NULL,
                phone TEXT NOT NULL,
                position INTEGER NOT NULL,
                status INTEGER NOT NULL DEFAULT 0,
                retry_count INTEGER NOT NULL DEFAULT 0,
                sent_at INTEGER,
                provider_message_id TEXT,
                error_message TEXT,
                UNIQUE(campaign_id, position)
            )
            "#,
            "recipients table",
        )
        .await?;

        Self::execute_ddl(
            conn,
            "CREATE INDEX idx_recipients_dispatch ON recipients(campaign_id, status, position)",
            "index",
        )
        .await
    }

    /// Create automated_tasks and task_executions tables
    async fn create_tasks_schema(conn: &mut SqliteConnection) -> Result<()> {
        Self::execute_ddl(
            conn,
            r#"
            CREATE TABLE automated_tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                payload TEXT NOT NULL,
                target_category TEXT,
                scheduled_at INTEGER NOT NULL,
                recurrence_days TEXT NOT NULL DEFAULT '[]',
                target_count INTEGER NOT NULL,
                execution_count INTEGER NOT NULL DEFAULT 0,
                max_executions INTEGER,
                enabled INTEGER NOT NULL DEFAULT 1,
                last_run_at INTEGER,
                created_at INTEGER NOT NULL
            )
            "#,
            "automated_tasks table",
        )
        .await?;

        Self::execute_ddl(
            conn,
            r#"
            CREATE TABLE task_executions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id INTEGER NOT NULL REFERENCES automated_tasks(id) ON DELETE CASCADE,
                executed_at INTEGER NOT NULL,
                success INTEGER NOT NULL,
                processed INTEGER NOT NULL,
                sent INTEGER NOT NULL,
                failed INTEGER NOT NULL,
                skipped_reason TEXT,
                errors TEXT NOT NULL DEFAULT '[]'
            )
            "#,
            "task_executions table",
        )
        .await?;

        Self::execute_ddl(
            conn,
            "CREATE INDEX idx_task_executions_task ON task_executions(task_id, executed_at DESC)",
            "index",
        )
        .await
    }

    /// Create the append-only send_history table
    async fn create_send_history_schema(conn: &mut SqliteConnection) -> Result<()> {
        Self::execute_ddl(
            conn,
            r#"
            CREATE TABLE send_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                contact_id INTEGER NOT NULL,
                phone TEXT NOT NULL,
                sender_id TEXT NOT NULL,
                source TEXT NOT NULL,
                reference_id INTEGER,
                success INTEGER NOT NULL,
                provider_message_id TEXT,
                error_message TEXT,
                sent_at INTEGER NOT NULL
            )
            "#,
            "send_history table",
        )
        .await?;

        Self::execute_ddl(
            conn,
            "CREATE INDEX idx_send_history_contact ON send_history(contact_id, success, sent_at)",
            "index",
        )
        .await?;

        Self::execute_ddl(
            conn,
            "CREATE INDEX idx_send_history_sender ON send_history(sender_id, success, sent_at)",
            "index",
        )
        .await
    }

    /// Record a migration version
    async fn record_migration(conn: &mut SqliteConnection, version: i32) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
            .bind(version)
            .bind(now)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to record migration: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Current schema version
    pub async fn schema_version(&self) -> Result<i64> {
        let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to query schema version: {}",
                    e
                )))
            })?;
        Ok(version.unwrap_or(0))
    }

    /// Close the database connection
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
