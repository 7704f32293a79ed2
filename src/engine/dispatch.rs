//! Dispatch run: drains a campaign's pending recipients through the channel.
//!
//! A run is a sequential walk over the campaign's pending recipients in their stored order.
//! Immediate campaigns are walked in one paced pass; gradual campaigns in fixed-size batches
//! separated by the inter-batch wait. Every send is preceded by a claim (`pending -> sending`)
//! and followed by a result committed together with the campaign counter, so a run can be
//! interrupted anywhere and re-run without re-sending anything already `sent`.
//!
//! Pending recipients are re-queried after each pass: retries requeued while the run is
//! active are picked up, and completion is only flipped once nothing is pending or in flight.

use crate::channel::SendOutcome;
use crate::db::{NewSendRecord, RecipientResult, RecipientRow, SendSource};
use crate::delay::WaitOutcome;
use crate::error::{CampaignError, Error, Result};
use crate::state::{CampaignAction, next_campaign_status};
use crate::types::{CampaignId, CampaignInfo, CampaignStatus, Event, RecipientId, SendType};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

use super::OutreachEngine;

/// How a dispatch run ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every recipient was resolved and the campaign is now `completed`
    Completed,
    /// The run was paused, cancelled or shut down before draining the campaign
    Stopped,
    /// The campaign is terminal; nothing was sent
    Skipped,
    /// Nothing is pending but some recipients are still in flight elsewhere
    Incomplete,
}

/// What a dispatch run did
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct DispatchReport {
    /// Campaign that was dispatched
    pub campaign_id: CampaignId,
    /// Recipients attempted per batch, in order
    pub batches: Vec<usize>,
    /// Inter-batch waits started
    pub inter_batch_waits: usize,
    /// Messages delivered in this run
    pub sent: u64,
    /// Messages failed in this run
    pub failed: u64,
    /// How the run ended
    pub outcome: RunOutcome,
}

impl DispatchReport {
    fn new(campaign_id: CampaignId) -> Self {
        Self {
            campaign_id,
            batches: Vec::new(),
            inter_batch_waits: 0,
            sent: 0,
            failed: 0,
            outcome: RunOutcome::Stopped,
        }
    }

    fn finish(mut self, outcome: RunOutcome) -> Self {
        self.outcome = outcome;
        self
    }
}

/// Per-run parameters derived from the campaign
struct RunPlan {
    campaign: CampaignInfo,
    batch_size: usize,
    inter_batch_delay: Duration,
    pacing_delay: Duration,
    sender_id: String,
}

enum BatchEnd {
    Finished,
    Interrupted,
}

impl OutreachEngine {
    /// Dispatch a campaign's pending recipients and wait for the run to end
    ///
    /// Safe to call repeatedly, also while another run of the same campaign is active: only
    /// `pending` recipients are ever sent, and the call waits for the campaign lock. The run
    /// registers itself next to any other run, so [`pause`](Self::pause) and
    /// [`cancel`](Self::cancel) stop all of them at the next checkpoint. A store failure aborts the run with
    /// [`Error::SchedulerFatal`] and leaves recipients in their last committed state.
    pub async fn run(&self, id: CampaignId) -> Result<DispatchReport> {
        if !self.is_accepting() {
            return Err(Error::ShuttingDown);
        }

        let (token, generation) = self.register_run(id).await;
        let result = self.run_registered(id, &token).await;
        self.unregister_run(id, generation).await;
        result
    }

    /// Run a registered dispatch once the campaign lock and a concurrency slot are held
    pub(crate) async fn run_registered(
        &self,
        id: CampaignId,
        token: &CancellationToken,
    ) -> Result<DispatchReport> {
        let lock = self.campaign_lock(id).await;
        // A run signalled while it queued for the lock never starts
        let _campaign_guard = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(DispatchReport::new(id)),
            guard = lock.lock_owned() => guard,
        };

        let _permit = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(DispatchReport::new(id)),
            permit = self.dispatch.concurrent_limit.clone().acquire_owned() => {
                permit.map_err(|e| Error::Other(format!("dispatch slots closed: {}", e)))?
            }
        };

        self.dispatch_campaign(id, token).await
    }

    async fn campaign_lock(&self, id: CampaignId) -> Arc<Mutex<()>> {
        self.dispatch
            .campaign_locks
            .lock()
            .await
            .entry(id)
            .or_default()
            .clone()
    }

    /// Abort the run of `id` on a store failure
    fn abort(&self, id: CampaignId, error: Error) -> Error {
        tracing::error!(campaign_id = %id, error = %error, "Dispatch aborted on store failure");
        self.emit_event(Event::CampaignAborted {
            id,
            error: error.to_string(),
        });
        Error::SchedulerFatal {
            campaign_id: id.get(),
            reason: error.to_string(),
        }
    }

    async fn dispatch_campaign(
        &self,
        id: CampaignId,
        token: &CancellationToken,
    ) -> Result<DispatchReport> {
        let report = DispatchReport::new(id);

        let row = self
            .db
            .get_campaign(id)
            .await
            .map_err(|e| self.abort(id, e))?
            .ok_or(CampaignError::NotFound { id: id.get() })?;
        let campaign = CampaignInfo::try_from(row)?;

        if campaign.status.is_terminal() {
            tracing::debug!(campaign_id = %id, status = %campaign.status, "Campaign is terminal, nothing to dispatch");
            return Ok(report.finish(RunOutcome::Skipped));
        }
        next_campaign_status(id, campaign.status, CampaignAction::BeginSending)?;

        if campaign.status == CampaignStatus::Queued {
            let began = self
                .db
                .transition_campaign(id, CampaignStatus::Queued, CampaignStatus::Sending)
                .await
                .map_err(|e| self.abort(id, e))?;
            if !began {
                // Cancelled or deleted while waiting for a slot
                return Ok(report);
            }
            tracing::info!(campaign_id = %id, name = %campaign.name, "Campaign sending");
            self.emit_event(Event::CampaignSending { id });
        }

        let pools = self
            .db
            .campaign_source_pools(id)
            .await
            .map_err(|e| self.abort(id, e))?;
        let _pools = self.pool_locks.read(pools).await;

        let (batch_size, inter_batch_delay) = match campaign.send_type {
            SendType::Immediate => (usize::MAX, Duration::ZERO),
            SendType::Gradual {
                batch_size,
                inter_batch_delay_secs,
            } => (
                (batch_size as usize).max(1),
                Duration::from_secs(inter_batch_delay_secs),
            ),
        };
        let plan = RunPlan {
            campaign,
            batch_size,
            inter_batch_delay,
            pacing_delay: self.config.dispatch.pacing_delay,
            sender_id: format!("campaign:{}", id),
        };

        self.drain(plan, report, token).await
    }

    async fn drain(
        &self,
        plan: RunPlan,
        mut report: DispatchReport,
        token: &CancellationToken,
    ) -> Result<DispatchReport> {
        let id = plan.campaign.id;

        loop {
            let pending = self
                .db
                .list_pending_recipients(id)
                .await
                .map_err(|e| self.abort(id, e))?;

            if pending.is_empty() {
                return self.finish_drained(id, report).await;
            }

            for batch in pending.chunks(plan.batch_size) {
                if !report.batches.is_empty() && !plan.inter_batch_delay.is_zero() {
                    report.inter_batch_waits += 1;
                    tracing::debug!(
                        campaign_id = %id,
                        delay_secs = plan.inter_batch_delay.as_secs(),
                        "Waiting before next batch"
                    );
                    if self.delay.wait(plan.inter_batch_delay, token).await
                        == WaitOutcome::Cancelled
                    {
                        return Ok(self.stopped(report));
                    }
                }

                if !self.still_sending(id).await? {
                    return Ok(self.stopped(report));
                }

                let (attempted, end) = self.send_batch(&plan, batch, &mut report, token).await?;
                if attempted > 0 {
                    report.batches.push(attempted);
                    let batch_number = report.batches.len() as u32;
                    tracing::info!(
                        campaign_id = %id,
                        batch = batch_number,
                        size = attempted,
                        "Batch completed"
                    );
                    self.emit_event(Event::BatchCompleted {
                        campaign_id: id,
                        batch: batch_number,
                        size: attempted as u32,
                    });
                    if let Ok(snapshot) = self.get_progress(id).await {
                        self.emit_event(Event::Progress { snapshot });
                    }
                }

                if let BatchEnd::Interrupted = end {
                    return Ok(self.stopped(report));
                }
            }
        }
    }

    /// Send one batch; returns how many recipients were attempted
    async fn send_batch(
        &self,
        plan: &RunPlan,
        batch: &[RecipientRow],
        report: &mut DispatchReport,
        token: &CancellationToken,
    ) -> Result<(usize, BatchEnd)> {
        let id = plan.campaign.id;
        let mut attempted = 0;

        for (index, recipient) in batch.iter().enumerate() {
            if index > 0
                && !plan.pacing_delay.is_zero()
                && self.delay.wait(plan.pacing_delay, token).await == WaitOutcome::Cancelled
            {
                return Ok((attempted, BatchEnd::Interrupted));
            }
            if token.is_cancelled() {
                return Ok((attempted, BatchEnd::Interrupted));
            }

            let recipient_id = RecipientId(recipient.id);
            let claimed = self
                .db
                .claim_recipient(recipient_id)
                .await
                .map_err(|e| self.abort(id, e))?;
            if !claimed {
                continue;
            }

            let outcome = self
                .channel
                .send(&recipient.phone, &plan.campaign.payload)
                .await;
            attempted += 1;

            let result = match &outcome {
                SendOutcome::Delivered {
                    provider_message_id,
                } => RecipientResult::Sent {
                    provider_message_id: provider_message_id.clone(),
                },
                SendOutcome::Failed { error } => RecipientResult::Failed {
                    error: error.clone(),
                },
            };

            self.db
                .record_recipient_result(id, recipient_id, &result)
                .await
                .map_err(|e| self.abort(id, e))?;
            self.append_history(plan, recipient, &outcome).await;

            match outcome {
                SendOutcome::Delivered { .. } => {
                    report.sent += 1;
                    self.emit_event(Event::RecipientSent {
                        campaign_id: id,
                        recipient_id,
                    });
                }
                SendOutcome::Failed { error } => {
                    report.failed += 1;
                    tracing::warn!(
                        campaign_id = %id,
                        recipient_id = %recipient_id,
                        error = %error,
                        "Send failed"
                    );
                    self.emit_event(Event::RecipientFailed {
                        campaign_id: id,
                        recipient_id,
                        error,
                    });
                }
            }
        }

        Ok((attempted, BatchEnd::Finished))
    }

    async fn append_history(&self, plan: &RunPlan, recipient: &RecipientRow, outcome: &SendOutcome) {
        let (provider_message_id, error_message) = match outcome {
            SendOutcome::Delivered {
                provider_message_id,
            } => (provider_message_id.as_deref(), None),
            SendOutcome::Failed { error } => (None, Some(error.as_str())),
        };

        let record = NewSendRecord {
            contact_id: recipient.contact_id.into(),
            phone: &recipient.phone,
            sender_id: &plan.sender_id,
            source: SendSource::Campaign,
            reference_id: Some(plan.campaign.id.get()),
            success: outcome.is_delivered(),
            provider_message_id,
            error_message,
            sent_at: chrono::Utc::now().timestamp(),
        };
        if let Err(e) = self.db.insert_send_record(&record).await {
            tracing::warn!(
                campaign_id = %plan.campaign.id,
                error = %e,
                "Failed to append send history"
            );
        }
    }

    /// Flip the campaign to `completed` if it is drained
    async fn finish_drained(&self, id: CampaignId, report: DispatchReport) -> Result<DispatchReport> {
        let completed = self
            .db
            .complete_if_drained(id)
            .await
            .map_err(|e| self.abort(id, e))?;

        if completed {
            let counts = self
                .db
                .count_recipients(id)
                .await
                .map_err(|e| self.abort(id, e))?;
            tracing::info!(
                campaign_id = %id,
                sent = counts.sent,
                failed = counts.failed,
                "Campaign completed"
            );
            self.emit_event(Event::CampaignCompleted {
                id,
                sent: counts.sent,
                failed: counts.failed,
            });
            if let Ok(snapshot) = self.get_progress(id).await {
                self.emit_event(Event::Progress { snapshot });
            }
            return Ok(report.finish(RunOutcome::Completed));
        }

        let status = self
            .db
            .get_campaign(id)
            .await
            .map_err(|e| self.abort(id, e))?
            .map(|row| row.status());
        if status == Some(CampaignStatus::Sending) {
            tracing::warn!(campaign_id = %id, "Nothing pending but recipients still in flight");
            Ok(report.finish(RunOutcome::Incomplete))
        } else {
            Ok(report.finish(RunOutcome::Stopped))
        }
    }

    /// Re-read the stored status; a pause or cancel stops the run even if its token was missed
    async fn still_sending(&self, id: CampaignId) -> Result<bool> {
        let status = self
            .db
            .get_campaign(id)
            .await
            .map_err(|e| self.abort(id, e))?
            .map(|row| row.status());
        Ok(status == Some(CampaignStatus::Sending))
    }

    fn stopped(&self, report: DispatchReport) -> DispatchReport {
        tracing::info!(
            campaign_id = %report.campaign_id,
            sent = report.sent,
            failed = report.failed,
            "Dispatch stopped before draining"
        );
        report.finish(RunOutcome::Stopped)
    }
}
