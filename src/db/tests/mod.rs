use crate::db::*;
use crate::types::{
    ContactId, ContactType, Exclusions, MessagePayload, Priority, SendType, SourcePool, TargetRule,
};
use tempfile::NamedTempFile;

mod campaigns;
mod contacts;

async fn test_db() -> (Database, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    (db, temp_file)
}

fn new_contact(pool: SourcePool, name: &str, phone: Option<&str>) -> NewContact {
    NewContact {
        source_pool: pool,
        name: name.to_string(),
        phone: phone.map(String::from),
        email: None,
        company: None,
        notes: None,
        contact_type: ContactType::Client,
        tags: vec![],
        priority: Priority::Medium,
    }
}

fn new_campaign(send_type: SendType) -> NewCampaign {
    NewCampaign {
        name: "Spring launch".to_string(),
        payload: serde_json::to_string(&MessagePayload::Text {
            body: "New units available".into(),
        })
        .unwrap(),
        target: serde_json::to_string(&TargetRule::All).unwrap(),
        exclusions: serde_json::to_string(&Exclusions::default()).unwrap(),
        send_type,
        max_retries: 3,
    }
}

fn recipients(n: i64) -> Vec<NewRecipient> {
    (1..=n)
        .map(|i| NewRecipient {
            contact_id: ContactId(i),
            source_pool: SourcePool::Clients,
            phone: format!("+97150000{:04}", i),
        })
        .collect()
}
