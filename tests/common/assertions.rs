//! Custom test assertions for integration tests

use bulk_outreach::{CampaignId, CampaignInfo, Event, OutreachEngine};
use std::time::Duration;
use tokio::sync::broadcast;

/// Result of waiting for a campaign to finish
#[derive(Debug)]
pub enum WaitResult {
    /// Campaign drained every recipient
    Completed,
    /// Campaign was cancelled
    Cancelled,
    /// Dispatch stopped on a fatal error
    Aborted(String),
    /// Timeout waiting for a terminal event
    Timeout,
    /// Channel closed unexpectedly
    ChannelClosed,
}

/// Wait for `id` to complete, be cancelled or abort
///
/// Takes a receiver subscribed before the campaign was started so no event is missed.
pub async fn wait_for_campaign(
    events: &mut broadcast::Receiver<Event>,
    id: CampaignId,
    timeout: Duration,
) -> WaitResult {
    let result = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(Event::CampaignCompleted { id: event_id, .. }) if event_id == id => {
                    return WaitResult::Completed;
                }
                Ok(Event::CampaignCancelled { id: event_id }) if event_id == id => {
                    return WaitResult::Cancelled;
                }
                Ok(Event::CampaignAborted {
                    id: event_id,
                    error,
                }) if event_id == id => {
                    return WaitResult::Aborted(error);
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    return WaitResult::ChannelClosed;
                }
            }
        }
    })
    .await;

    result.unwrap_or(WaitResult::Timeout)
}

/// Assert the stored counters agree with the recipient rows
pub async fn assert_counters_consistent(engine: &OutreachEngine, campaign: &CampaignInfo) {
    let recipients = engine
        .list_recipients(campaign.id, None)
        .await
        .expect("failed to list recipients");
    let sent = recipients
        .iter()
        .filter(|r| r.status == bulk_outreach::RecipientStatus::Sent)
        .count() as u64;
    let failed = recipients
        .iter()
        .filter(|r| r.status == bulk_outreach::RecipientStatus::Failed)
        .count() as u64;

    assert_eq!(campaign.total_recipients, recipients.len() as u64);
    assert_eq!(campaign.sent_count, sent);
    assert_eq!(campaign.failed_count, failed);
}
