//! Startup restore and shutdown coordination.

use crate::error::Result;
use crate::types::{CampaignId, CampaignStatus, Event};
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::OutreachEngine;

/// How long shutdown waits for dispatch runs to reach a checkpoint
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl OutreachEngine {
    /// Bring state left by a previous process back to a consistent point
    ///
    /// Recipients still marked `sending` were in flight when the process stopped; whether the
    /// provider got them is unknown, so they become `failed` with an interrupted error and are
    /// only sent again through an explicit [`retry_failed`](Self::retry_failed). When
    /// `dispatch.resume_on_startup` is set, campaigns left `queued` or `sending` get a new run.
    ///
    /// Returns the campaigns a run was scheduled for.
    pub async fn restore_on_startup(&self) -> Result<Vec<CampaignId>> {
        let interrupted = self.db.fail_interrupted_recipients().await?;
        if interrupted > 0 {
            tracing::warn!(
                count = interrupted,
                "Marked recipients interrupted by the previous shutdown as failed"
            );
        }

        if !self.config.dispatch.resume_on_startup {
            return Ok(Vec::new());
        }

        let mut restored = Vec::new();
        for status in [CampaignStatus::Sending, CampaignStatus::Queued] {
            for row in self.db.list_campaigns_by_status(status).await? {
                let id = CampaignId(row.id);
                tracing::info!(campaign_id = %id, status = %status, "Resuming campaign after restart");
                self.spawn_run(id).await;
                restored.push(id);
            }
        }

        Ok(restored)
    }

    /// Gracefully shut down the engine
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting new runs (start/resume fail with `ShuttingDown`)
    /// 2. Signals every registered run to stop at its next checkpoint
    /// 3. Waits for the runs to finish with a timeout (30 seconds)
    /// 4. Stops the automation poller
    ///
    /// A send already handed to the channel completes and is recorded; campaigns keep their
    /// `sending` status so the next process resumes them.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        // 1. Stop accepting new runs
        self.dispatch.accepting_new.store(false, Ordering::SeqCst);

        // 2. Signal all registered runs
        {
            let runs = self.dispatch.active_runs.lock().await;
            tracing::debug!(active_count = runs.len(), "Signaling active dispatch runs");
            for run in runs.values().flatten() {
                run.token.cancel();
            }
        }

        // 3. Wait for runs to unregister
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.wait_for_active_runs()).await {
            Ok(()) => tracing::info!("All dispatch runs stopped"),
            Err(_) => tracing::warn!("Timeout waiting for dispatch runs, proceeding with shutdown"),
        }

        // 4. Stop the poller
        self.automation.stop().await;

        self.emit_event(Event::Shutdown);
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    async fn wait_for_active_runs(&self) {
        loop {
            let active_count = self.dispatch.active_runs.lock().await.len();
            if active_count == 0 {
                return;
            }

            tracing::debug!(active_count, "Waiting for dispatch runs to stop");
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}
