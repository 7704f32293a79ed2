//! Progress snapshots.

use crate::error::Result;
use crate::types::{CampaignId, CampaignInfo, ProgressSnapshot};
use chrono::{DateTime, Utc};

use super::OutreachEngine;

impl ProgressSnapshot {
    /// Compute a snapshot from a campaign's counters at `now`
    ///
    /// The ETA extrapolates the delivery rate observed since dispatch first started and is
    /// `None` until something has been delivered.
    pub fn compute(campaign: &CampaignInfo, now: DateTime<Utc>) -> Self {
        let sent = campaign.sent_count;
        let failed = campaign.failed_count;
        let total = campaign.total_recipients;
        let pending = total.saturating_sub(sent + failed);

        let attempted = sent + failed;
        let success_rate = if attempted == 0 {
            0.0
        } else {
            sent as f64 / attempted as f64
        };

        let eta_minutes = match campaign.started_at {
            Some(started) if sent > 0 => {
                let elapsed_minutes = (now - started).num_milliseconds().max(0) as f64 / 60_000.0;
                Some(pending as f64 * elapsed_minutes / sent as f64)
            }
            _ => None,
        };

        Self {
            campaign_id: campaign.id,
            status: campaign.status,
            sent,
            failed,
            pending,
            total,
            success_rate,
            eta_minutes,
        }
    }
}

impl OutreachEngine {
    /// Current progress of a campaign
    pub async fn get_progress(&self, id: CampaignId) -> Result<ProgressSnapshot> {
        let campaign = self.get_campaign(id).await?;
        Ok(ProgressSnapshot::compute(&campaign, Utc::now()))
    }
}
