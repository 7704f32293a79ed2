//! Automated task CRUD and execution log.

use crate::error::DatabaseError;
use crate::types::TaskId;
use crate::{Error, Result};

use super::{Database, NewTask, NewTaskExecution, TaskExecutionRow, TaskRow};

const TASK_COLUMNS: &str = "id, name, payload, target_category, scheduled_at, recurrence_days, \
                            target_count, execution_count, max_executions, enabled, \
                            last_run_at, created_at";

impl Database {
    /// Insert a new automated task
    pub async fn insert_task(&self, task: &NewTask) -> Result<TaskId> {
        let now = chrono::Utc::now().timestamp();
        let recurrence_days = serde_json::to_string(&task.recurrence_days)?;

        let result = sqlx::query(
            r#"
            INSERT INTO automated_tasks (
                name, payload, target_category, scheduled_at, recurrence_days,
                target_count, max_executions, enabled, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&task.name)
        .bind(&task.payload)
        .bind(task.target_category.map(|c| c.as_str()))
        .bind(task.scheduled_at)
        .bind(recurrence_days)
        .bind(i64::from(task.target_count))
        .bind(task.max_executions.map(i64::from))
        .bind(task.enabled as i32)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert task: {}",
                e
            )))
        })?;

        Ok(TaskId(result.last_insert_rowid()))
    }

    /// Get a task by ID
    pub async fn get_task(&self, id: TaskId) -> Result<Option<TaskRow>> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM automated_tasks WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to get task: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// List all tasks
    pub async fn list_tasks(&self) -> Result<Vec<TaskRow>> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM automated_tasks ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list tasks: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Enabled tasks whose first scheduled time has passed
    ///
    /// Recurrence and execution caps are evaluated by the caller.
    pub async fn list_candidate_tasks(&self, now: i64) -> Result<Vec<TaskRow>> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM automated_tasks \
             WHERE enabled = 1 AND scheduled_at <= ? ORDER BY scheduled_at ASC"
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list due tasks: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Enable or disable a task
    pub async fn set_task_enabled(&self, id: TaskId, enabled: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE automated_tasks SET enabled = ? WHERE id = ?")
            .bind(enabled as i32)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to update task: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected() > 0)
    }

    /// Record that a task ran at `ran_at`
    pub async fn mark_task_executed(&self, id: TaskId, ran_at: i64) -> Result<()> {
        sqlx::query(
            "UPDATE automated_tasks SET execution_count = execution_count + 1, last_run_at = ? \
             WHERE id = ?",
        )
        .bind(ran_at)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to update task bookkeeping: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Delete a task and its execution log
    pub async fn delete_task(&self, id: TaskId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM automated_tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to delete task: {}",
                    e
                )))
            })?;

        Ok(result.rows_affected() > 0)
    }

    /// Append an execution log entry
    pub async fn insert_task_execution(&self, execution: &NewTaskExecution) -> Result<i64> {
        let now = chrono::Utc::now().timestamp();
        let errors = serde_json::to_string(&execution.errors)?;

        let result = sqlx::query(
            r#"
            INSERT INTO task_executions (
                task_id, executed_at, success, processed, sent, failed, skipped_reason, errors
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(execution.task_id)
        .bind(now)
        .bind(execution.success as i32)
        .bind(i64::from(execution.processed))
        .bind(i64::from(execution.sent))
        .bind(i64::from(execution.failed))
        .bind(&execution.skipped_reason)
        .bind(errors)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert task execution: {}",
                e
            )))
        })?;

        Ok(result.last_insert_rowid())
    }

    /// Execution log of a task, newest first
    pub async fn list_task_executions(
        &self,
        task_id: TaskId,
        limit: usize,
    ) -> Result<Vec<TaskExecutionRow>> {
        let rows = sqlx::query_as::<_, TaskExecutionRow>(
            r#"
            SELECT id, task_id, executed_at, success, processed, sent, failed, skipped_reason, errors
            FROM task_executions
            WHERE task_id = ?
            ORDER BY executed_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(task_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list task executions: {}",
                e
            )))
        })?;

        Ok(rows)
    }
}
