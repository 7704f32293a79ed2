//! Periodic poller for automated tasks
//!
//! Runs on its own timer, fully decoupled from campaign dispatch. Each tick loads enabled
//! tasks whose first run has passed, keeps the ones [`AutomatedTask::is_due`] accepts, and
//! runs them one after another through the [`TaskRunner`].

use super::{AutomatedTask, ExecutionResult, SKIP_DISABLED, TaskRunner};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::types::TaskId;
use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

/// Poller state reported to callers
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SchedulerStatus {
    /// Whether the poller loop is running
    pub running: bool,
    /// Whether automated sends are switched on
    pub auto_send_enabled: bool,
    /// Tick interval in milliseconds
    pub check_interval_ms: u64,
}

/// What a single tick did
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct TickReport {
    /// Enabled tasks whose first run has passed
    pub candidates: usize,
    /// Executions performed
    pub executions: Vec<ExecutionResult>,
    /// Why the tick did nothing
    pub skipped_reason: Option<String>,
}

struct Poller {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Background poller that runs due automated tasks
#[derive(Clone)]
pub struct AutomationScheduler {
    db: Arc<Database>,
    runner: TaskRunner,
    check_interval: Duration,
    poller: Arc<Mutex<Option<Poller>>>,
    // Serializes ticks with manual runs so a task never executes twice concurrently
    busy: Arc<tokio::sync::Mutex<()>>,
}

impl AutomationScheduler {
    /// Create a stopped scheduler
    pub fn new(db: Arc<Database>, runner: TaskRunner, check_interval: Duration) -> Self {
        Self {
            db,
            runner,
            check_interval,
            poller: Arc::new(Mutex::new(None)),
            busy: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Start the poller loop
    ///
    /// Returns `false` if it was already running.
    pub fn start(&self) -> bool {
        let Ok(mut poller) = self.poller.lock() else {
            return false;
        };
        if poller.as_ref().is_some_and(|p| !p.handle.is_finished()) {
            return false;
        }

        let cancel = CancellationToken::new();
        let this = self.clone();
        let loop_cancel = cancel.clone();
        let handle = tokio::spawn(async move { this.run(loop_cancel).await });

        *poller = Some(Poller { cancel, handle });
        info!(
            interval_secs = self.check_interval.as_secs(),
            "Automation scheduler started"
        );
        true
    }

    /// Stop the poller loop and wait for the current tick to finish
    ///
    /// A tick in progress is interrupted at its next pacing delay.
    pub async fn stop(&self) {
        let poller = self.poller.lock().ok().and_then(|mut p| p.take());
        let Some(poller) = poller else {
            return;
        };

        poller.cancel.cancel();
        if let Err(e) = poller.handle.await {
            warn!(error = %e, "Automation scheduler loop ended abnormally");
        }
        info!("Automation scheduler stopped");
    }

    /// Current poller state
    pub fn status(&self) -> SchedulerStatus {
        let running = self
            .poller
            .lock()
            .map(|p| p.as_ref().is_some_and(|p| !p.handle.is_finished()))
            .unwrap_or(false);

        SchedulerStatus {
            running,
            auto_send_enabled: self.runner.auto_send_enabled(),
            check_interval_ms: self.check_interval.as_millis() as u64,
        }
    }

    async fn run(self, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                break;
            }

            if let Err(e) = self.tick_with(&cancel).await {
                error!(error = %e, "Automation tick failed");
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.check_interval) => {}
            }
        }
        debug!("Automation poller loop exited");
    }

    /// Run one poll cycle now
    pub async fn tick(&self) -> Result<TickReport> {
        self.tick_with(&CancellationToken::new()).await
    }

    async fn tick_with(&self, cancel: &CancellationToken) -> Result<TickReport> {
        if !self.runner.auto_send_enabled() {
            debug!("Automated sends disabled, tick skipped");
            return Ok(TickReport {
                skipped_reason: Some(SKIP_DISABLED.to_string()),
                ..Default::default()
            });
        }

        let _busy = self.busy.lock().await;

        let rows = self.db.list_candidate_tasks(Utc::now().timestamp()).await?;
        let mut report = TickReport {
            candidates: rows.len(),
            ..Default::default()
        };

        let now = Local::now();
        for row in rows {
            if cancel.is_cancelled() {
                break;
            }

            let task = match AutomatedTask::try_from(row) {
                Ok(task) => task,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable automated task");
                    continue;
                }
            };
            if !task.is_due(now) {
                continue;
            }

            debug!(task_id = %task.id, name = %task.name, "Running due task");
            match self.runner.run_task(&task, cancel).await {
                Ok(result) => report.executions.push(result),
                Err(e) => error!(task_id = %task.id, error = %e, "Automated task errored"),
            }
        }

        debug!(
            candidates = report.candidates,
            executed = report.executions.len(),
            "Automation tick complete"
        );
        Ok(report)
    }

    /// Run a task immediately, ignoring its schedule
    pub async fn run_task_now(&self, id: TaskId) -> Result<ExecutionResult> {
        let row = self
            .db
            .get_task(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("task {} not found", id)))?;
        let task = AutomatedTask::try_from(row)?;

        let _busy = self.busy.lock().await;
        self.runner.run_task(&task, &CancellationToken::new()).await
    }
}
