use super::test_helpers::*;
use super::*;
use crate::error::{CampaignError, Error, ValidationError};
use crate::types::{CampaignStatus, ContactId, RecipientStatus, SendType, SourcePool};

mod dispatch;
mod lifecycle;

/// Check the counter invariant against the recipient rows
async fn assert_counters_match(engine: &OutreachEngine, id: CampaignId) {
    let campaign = engine.get_campaign(id).await.unwrap();
    let counts = engine.db.count_recipients(id).await.unwrap();

    assert_eq!(campaign.sent_count, counts.sent);
    assert_eq!(campaign.failed_count, counts.failed);
    assert_eq!(campaign.total_recipients, counts.total());
    assert!(campaign.sent_count + campaign.failed_count <= campaign.total_recipients);
}

fn gradual(batch_size: u32, inter_batch_delay_secs: u64) -> SendType {
    SendType::Gradual {
        batch_size,
        inter_batch_delay_secs,
    }
}
