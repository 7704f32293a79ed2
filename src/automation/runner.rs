//! Single execution of an automated task.

use super::{
    AutomatedTask, CooldownTracker, ExecutionResult, SKIP_DAILY_LIMIT, SKIP_DISABLED,
    SKIP_NO_ELIGIBLE, meets_threshold,
};
use crate::channel::{ChannelSender, SendOutcome};
use crate::config::AutomationConfig;
use crate::contacts::ContactStore;
use crate::db::{Database, NewSendRecord, NewTaskExecution, SendSource};
use crate::delay::{Delay, WaitOutcome};
use crate::error::Result;
use crate::pool_lock::PoolLocks;
use crate::resolver;
use crate::types::{Contact, Event, Exclusions, TargetRule};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Runs automated tasks against the shared channel
#[derive(Clone)]
pub struct TaskRunner {
    db: Arc<Database>,
    contacts: ContactStore,
    channel: Arc<dyn ChannelSender>,
    delay: Arc<dyn Delay>,
    pool_locks: PoolLocks,
    cooldown: CooldownTracker,
    config: AutomationConfig,
    event_tx: broadcast::Sender<Event>,
}

impl TaskRunner {
    /// Create a runner
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Arc<Database>,
        contacts: ContactStore,
        channel: Arc<dyn ChannelSender>,
        delay: Arc<dyn Delay>,
        pool_locks: PoolLocks,
        config: AutomationConfig,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        let cooldown = CooldownTracker::new(db.clone(), &config);
        Self {
            db,
            contacts,
            channel,
            delay,
            pool_locks,
            cooldown,
            config,
            event_tx,
        }
    }

    /// Cooldown tracker used by this runner
    pub fn cooldown(&self) -> &CooldownTracker {
        &self.cooldown
    }

    /// Whether automated sends are switched on
    pub fn auto_send_enabled(&self) -> bool {
        self.config.auto_send_enabled
    }

    /// Run `task` once
    ///
    /// Channel failures are counted, not raised. Store failures while selecting targets are
    /// returned as errors; the execution is still logged on a best-effort basis.
    pub async fn run_task(
        &self,
        task: &AutomatedTask,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult> {
        if !self.config.auto_send_enabled {
            tracing::debug!(task_id = %task.id, "Automated sends disabled, skipping task");
            let result = ExecutionResult::skipped(task.id, SKIP_DISABLED);
            self.log_execution(&result).await;
            return Ok(result);
        }

        let result = match self.execute(task, cancel).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(task_id = %task.id, error = %e, "Automated task failed");
                let failed = ExecutionResult {
                    errors: vec![e.to_string()],
                    ..ExecutionResult::empty(task.id)
                };
                self.log_execution(&failed).await;
                return Err(e);
            }
        };

        if let Err(e) = self
            .db
            .mark_task_executed(task.id, Utc::now().timestamp())
            .await
        {
            tracing::error!(task_id = %task.id, error = %e, "Failed to update task bookkeeping");
        }
        self.log_execution(&result).await;

        tracing::info!(
            task_id = %task.id,
            processed = result.processed,
            sent = result.sent,
            failed = result.failed,
            success = result.success,
            "Automated task executed"
        );
        self.event_tx
            .send(Event::TaskExecuted {
                task_id: task.id,
                success: result.success,
                sent: u64::from(result.sent),
                failed: u64::from(result.failed),
            })
            .ok();

        Ok(result)
    }

    async fn execute(
        &self,
        task: &AutomatedTask,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult> {
        let remaining = self.cooldown.daily_remaining().await?;
        if remaining == 0 {
            tracing::info!(task_id = %task.id, "Daily send limit reached");
            return Ok(ExecutionResult::skipped(task.id, SKIP_DAILY_LIMIT));
        }

        // Hold every pool for reading so a merge cannot retire a contact mid-run
        let _pools = self.pool_locks.read(self.contacts.sources()).await;

        let targets = self.select_targets(task, remaining).await?;
        if targets.is_empty() {
            tracing::info!(task_id = %task.id, "No eligible contacts for automated task");
            return Ok(ExecutionResult::skipped(task.id, SKIP_NO_ELIGIBLE));
        }

        let sender_id = self.cooldown.sender_id().to_string();
        let mut result = ExecutionResult::empty(task.id);

        for (index, (contact, phone)) in targets.iter().enumerate() {
            if index > 0
                && self.delay.wait(self.config.pacing_delay, cancel).await == WaitOutcome::Cancelled
            {
                tracing::info!(task_id = %task.id, "Automated task interrupted");
                break;
            }
            if cancel.is_cancelled() {
                break;
            }

            let outcome = self.channel.send(phone, &task.payload).await;
            result.processed += 1;

            let (provider_message_id, error) = match &outcome {
                SendOutcome::Delivered {
                    provider_message_id,
                } => {
                    result.sent += 1;
                    (provider_message_id.as_deref(), None)
                }
                SendOutcome::Failed { error } => {
                    tracing::warn!(
                        task_id = %task.id,
                        contact_id = %contact.id,
                        error = %error,
                        "Automated send failed"
                    );
                    result.failed += 1;
                    result
                        .errors
                        .push(format!("{} ({}): {}", contact.name, phone, error));
                    (None, Some(error.as_str()))
                }
            };

            if let Err(e) = self
                .db
                .insert_send_record(&NewSendRecord {
                    contact_id: contact.id,
                    phone,
                    sender_id: &sender_id,
                    source: SendSource::Automation,
                    reference_id: Some(task.id.get()),
                    success: outcome.is_delivered(),
                    provider_message_id,
                    error_message: error,
                    sent_at: Utc::now().timestamp(),
                })
                .await
            {
                tracing::error!(task_id = %task.id, error = %e, "Failed to append send history");
            }
        }

        result.success = meets_threshold(result.sent, result.failed, self.config.failure_threshold);
        Ok(result)
    }

    /// Eligible contacts for `task`, best first, capped at `min(target_count, remaining)`
    async fn select_targets(
        &self,
        task: &AutomatedTask,
        remaining: u32,
    ) -> Result<Vec<(Contact, String)>> {
        let contacts = self.contacts.list(&[]).await?;
        let cooling_down = self.cooldown.cooling_down_at(Utc::now()).await?;

        let target = match task.target_category {
            Some(category) => TargetRule::ByType {
                types: vec![category],
            },
            None => TargetRule::All,
        };
        let resolution =
            resolver::resolve(&contacts, &target, &Exclusions::default(), &cooling_down);

        let by_id: HashMap<_, _> = contacts.iter().map(|c| (c.id, c)).collect();
        let mut eligible: Vec<(Contact, String)> = resolution
            .recipients
            .into_iter()
            .filter_map(|r| by_id.get(&r.contact_id).map(|c| ((*c).clone(), r.phone)))
            .collect();

        // Stable sort keeps resolver order (pool rank, then ID) within a priority
        eligible.sort_by(|a, b| b.0.priority.cmp(&a.0.priority));

        let take = task.target_count.min(remaining) as usize;
        eligible.truncate(take);
        Ok(eligible)
    }

    async fn log_execution(&self, result: &ExecutionResult) {
        let entry = NewTaskExecution {
            task_id: result.task_id,
            success: result.success,
            processed: result.processed,
            sent: result.sent,
            failed: result.failed,
            skipped_reason: result.skipped_reason.clone(),
            errors: result.errors.clone(),
        };
        if let Err(e) = self.db.insert_task_execution(&entry).await {
            tracing::warn!(task_id = %result.task_id, error = %e, "Failed to log task execution");
        }
    }
}
