//! Campaign lifecycle control: start, pause, resume, cancel, retry.
//!
//! Every control operation applies a guarded status transition in the store first and only
//! then signals the run. A dispatch run observes the signal at its next checkpoint (between
//! sends, or inside a pacing/batch wait), so a send already in flight always completes and is
//! recorded.

use crate::error::{CampaignError, Error, Result};
use crate::state::{CampaignAction, next_campaign_status};
use crate::types::{CampaignId, CampaignStatus, Event};
use std::sync::atomic::Ordering;
use tokio_util::sync::CancellationToken;

use super::{ActiveRun, OutreachEngine};

impl OutreachEngine {
    /// Queue a draft campaign and start dispatching it
    ///
    /// Dispatch begins as soon as a concurrency slot is free. Starting a queued campaign that
    /// has no run (e.g. after a restart) schedules one; starting a campaign that is already
    /// sending is rejected.
    pub async fn start(&self, id: CampaignId) -> Result<()> {
        if !self.is_accepting() {
            return Err(Error::ShuttingDown);
        }

        let campaign = self.get_campaign(id).await?;
        let next = next_campaign_status(id, campaign.status, CampaignAction::Start)?;

        if campaign.status != next {
            self.apply_transition(id, campaign.status, next, CampaignAction::Start)
                .await?;
            tracing::info!(campaign_id = %id, "Campaign queued");
            self.emit_event(Event::CampaignQueued { id });
        } else if self.has_active_run(id).await {
            // Already waiting for a slot
            return Ok(());
        }

        self.spawn_run(id).await;
        Ok(())
    }

    /// Pause a sending campaign
    ///
    /// Remaining recipients stay `pending`; [`resume`](Self::resume) continues with them.
    pub async fn pause(&self, id: CampaignId) -> Result<()> {
        let campaign = self.get_campaign(id).await?;
        let next = next_campaign_status(id, campaign.status, CampaignAction::Pause)?;

        self.apply_transition(id, campaign.status, next, CampaignAction::Pause)
            .await?;
        self.cancel_run(id).await;

        tracing::info!(campaign_id = %id, "Campaign paused");
        self.emit_event(Event::CampaignPaused { id });
        Ok(())
    }

    /// Resume a paused campaign
    pub async fn resume(&self, id: CampaignId) -> Result<()> {
        if !self.is_accepting() {
            return Err(Error::ShuttingDown);
        }

        let campaign = self.get_campaign(id).await?;
        let next = next_campaign_status(id, campaign.status, CampaignAction::Resume)?;

        self.apply_transition(id, campaign.status, next, CampaignAction::Resume)
            .await?;

        tracing::info!(campaign_id = %id, "Campaign resumed");
        self.emit_event(Event::CampaignSending { id });
        self.spawn_run(id).await;
        Ok(())
    }

    /// Cancel a campaign
    ///
    /// Pending recipients are left as they are; the campaign cannot be restarted.
    pub async fn cancel(&self, id: CampaignId) -> Result<()> {
        let campaign = self.get_campaign(id).await?;
        let next = next_campaign_status(id, campaign.status, CampaignAction::Cancel)?;

        self.apply_transition(id, campaign.status, next, CampaignAction::Cancel)
            .await?;
        self.cancel_run(id).await;

        tracing::info!(campaign_id = %id, "Campaign cancelled");
        self.emit_event(Event::CampaignCancelled { id });
        Ok(())
    }

    /// Reset failed recipients that still have retries left back to `pending`
    ///
    /// Returns the number of recipients requeued. A sending campaign picks them up in its
    /// current run (or a new one if the run already ended); a paused or queued campaign
    /// sends them once it runs again.
    pub async fn retry_failed(&self, id: CampaignId) -> Result<u64> {
        let campaign = self.get_campaign(id).await?;
        next_campaign_status(id, campaign.status, CampaignAction::RetryFailed)?;

        let count = self
            .db
            .requeue_failed_recipients(id, campaign.max_retries)
            .await?;

        tracing::info!(campaign_id = %id, count, "Failed recipients requeued");
        self.emit_event(Event::RetryScheduled {
            campaign_id: id,
            count,
        });

        if count > 0 && campaign.status == CampaignStatus::Sending && self.is_accepting() {
            if !self.has_active_run(id).await {
                self.spawn_run(id).await;
            }
        }

        Ok(count)
    }

    /// Store a guarded transition, reporting a lost race as an invalid state
    async fn apply_transition(
        &self,
        id: CampaignId,
        from: CampaignStatus,
        to: CampaignStatus,
        action: CampaignAction,
    ) -> Result<()> {
        if self.db.transition_campaign(id, from, to).await? {
            return Ok(());
        }

        let current = self
            .db
            .get_campaign(id)
            .await?
            .map(|row| row.status().to_string())
            .unwrap_or_else(|| "deleted".to_string());
        Err(CampaignError::InvalidState {
            id: id.get(),
            operation: action.as_str().to_string(),
            current_state: current,
        }
        .into())
    }

    /// Register a run for `id` and return its token and generation
    ///
    /// Runs registered alongside one another are all kept: each waits for the campaign lock in
    /// turn, and every one of them stays reachable by [`cancel_run`](Self::cancel_run).
    pub(crate) async fn register_run(&self, id: CampaignId) -> (CancellationToken, u64) {
        let token = CancellationToken::new();
        let generation = self.dispatch.next_generation.fetch_add(1, Ordering::SeqCst);

        self.dispatch
            .active_runs
            .lock()
            .await
            .entry(id)
            .or_default()
            .push(ActiveRun {
                token: token.clone(),
                generation,
            });
        (token, generation)
    }

    /// Drop the registration of a finished run
    pub(crate) async fn unregister_run(&self, id: CampaignId, generation: u64) {
        let mut runs = self.dispatch.active_runs.lock().await;
        if let Some(registered) = runs.get_mut(&id) {
            registered.retain(|run| run.generation != generation);
            if registered.is_empty() {
                runs.remove(&id);
            }
        }
    }

    /// Signal every registered run of `id` to stop at its next checkpoint
    pub(crate) async fn cancel_run(&self, id: CampaignId) {
        if let Some(registered) = self.dispatch.active_runs.lock().await.get(&id) {
            for run in registered {
                run.token.cancel();
            }
        }
    }

    /// Whether a run of `id` is registered and not yet signalled to stop
    pub(crate) async fn has_active_run(&self, id: CampaignId) -> bool {
        self.dispatch
            .active_runs
            .lock()
            .await
            .get(&id)
            .is_some_and(|registered| registered.iter().any(|run| !run.token.is_cancelled()))
    }

    /// Register and spawn a dispatch run for `id`
    ///
    /// Registration happens before this returns, so a pause issued right after `start` is
    /// never lost.
    pub(crate) async fn spawn_run(&self, id: CampaignId) {
        let (token, generation) = self.register_run(id).await;
        let engine = self.clone();

        tokio::spawn(async move {
            match engine.run_registered(id, &token).await {
                Ok(report) => {
                    tracing::debug!(
                        campaign_id = %id,
                        outcome = ?report.outcome,
                        sent = report.sent,
                        failed = report.failed,
                        "Dispatch run finished"
                    );
                }
                Err(e) => {
                    tracing::error!(campaign_id = %id, error = %e, "Dispatch run failed");
                }
            }
            engine.unregister_run(id, generation).await;
        });
    }
}
