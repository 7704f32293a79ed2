//! Automated task management and poller control.

use crate::automation::{AutomatedTask, ExecutionResult, SchedulerStatus, TaskDefinition, TaskExecution};
use crate::db::NewTask;
use crate::error::{Error, Result};
use crate::types::TaskId;

use super::OutreachEngine;

/// Execution log entries returned per task
const EXECUTION_LOG_LIMIT: usize = 100;

fn task_not_found(id: TaskId) -> Error {
    Error::NotFound(format!("task {} not found", id))
}

impl OutreachEngine {
    /// Store a new automated task
    pub async fn create_task(&self, definition: TaskDefinition) -> Result<AutomatedTask> {
        definition.validate()?;

        let task = NewTask {
            name: definition.name.trim().to_string(),
            payload: serde_json::to_string(&definition.payload)?,
            target_category: definition.target_category,
            scheduled_at: definition.scheduled_at.timestamp(),
            recurrence_days: definition.recurrence_days,
            target_count: definition.target_count,
            max_executions: definition.max_executions,
            enabled: definition.enabled,
        };
        let id = self.db.insert_task(&task).await?;

        tracing::info!(task_id = %id, name = %task.name, "Automated task created");
        self.get_task(id).await
    }

    /// Get an automated task
    pub async fn get_task(&self, id: TaskId) -> Result<AutomatedTask> {
        let row = self
            .db
            .get_task(id)
            .await?
            .ok_or_else(|| task_not_found(id))?;
        AutomatedTask::try_from(row)
    }

    /// List automated tasks
    pub async fn list_tasks(&self) -> Result<Vec<AutomatedTask>> {
        self.db
            .list_tasks()
            .await?
            .into_iter()
            .map(AutomatedTask::try_from)
            .collect()
    }

    /// Enable or disable a task for the poller
    pub async fn set_task_enabled(&self, id: TaskId, enabled: bool) -> Result<AutomatedTask> {
        if !self.db.set_task_enabled(id, enabled).await? {
            return Err(task_not_found(id));
        }
        tracing::info!(task_id = %id, enabled, "Automated task updated");
        self.get_task(id).await
    }

    /// Delete a task and its execution log
    pub async fn delete_task(&self, id: TaskId) -> Result<()> {
        if !self.db.delete_task(id).await? {
            return Err(task_not_found(id));
        }
        tracing::info!(task_id = %id, "Automated task deleted");
        Ok(())
    }

    /// Most recent executions of a task, newest first
    pub async fn list_task_executions(&self, id: TaskId) -> Result<Vec<TaskExecution>> {
        self.get_task(id).await?;
        Ok(self
            .db
            .list_task_executions(id, EXECUTION_LOG_LIMIT)
            .await?
            .into_iter()
            .map(TaskExecution::from)
            .collect())
    }

    /// Run a task now, regardless of its schedule
    pub async fn run_task_now(&self, id: TaskId) -> Result<ExecutionResult> {
        self.automation.run_task_now(id).await
    }

    /// Poller state
    pub fn scheduler_status(&self) -> SchedulerStatus {
        self.automation.status()
    }

    /// Start the automation poller; returns `false` if it was already running
    pub fn start_scheduler(&self) -> bool {
        self.automation.start()
    }

    /// Stop the automation poller and wait for its current tick to finish
    pub async fn stop_scheduler(&self) {
        self.automation.stop().await
    }
}
