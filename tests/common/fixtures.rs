//! Contact and campaign fixtures

use bulk_outreach::db::NewContact;
use bulk_outreach::{
    CampaignDefinition, ContactId, ContactType, Exclusions, MessagePayload, OutreachEngine,
    Priority, SendType, SourcePool, TargetRule,
};

/// Dialable phone number of the `n`th fixture contact
pub fn fixture_phone(n: usize) -> String {
    format!("+97155{:07}", n)
}

/// Insert one contact with the `n`th fixture phone (written in local format) into `pool`
pub async fn insert_contact(
    engine: &OutreachEngine,
    pool: SourcePool,
    n: usize,
    contact_type: ContactType,
) -> ContactId {
    engine
        .db
        .insert_contact(&NewContact {
            source_pool: pool,
            name: format!("{} {}", pool, n),
            // Stored as operators type them; dispatch and dedup normalize
            phone: Some(format!("+971 55 {:07}", n)),
            email: None,
            company: None,
            notes: None,
            contact_type,
            tags: vec![],
            priority: Priority::Medium,
        })
        .await
        .expect("failed to insert contact")
}

/// Insert contacts `range` into `pool` as clients
pub async fn seed_pool(
    engine: &OutreachEngine,
    pool: SourcePool,
    range: std::ops::Range<usize>,
) -> Vec<ContactId> {
    let mut ids = Vec::new();
    for n in range {
        ids.push(insert_contact(engine, pool, n, ContactType::Client).await);
    }
    ids
}

/// Text campaign addressed to every contact
pub fn text_campaign(name: &str, send_type: SendType) -> CampaignDefinition {
    CampaignDefinition {
        name: name.to_string(),
        payload: MessagePayload::Text {
            body: "New units released in Marina Heights".to_string(),
        },
        target: TargetRule::All,
        exclusions: Exclusions::default(),
        send_type,
        max_retries: None,
    }
}
