//! Cross-pool duplicate cleanup and its effect on campaigns and automation

mod common;

use bulk_outreach::automation::Weekday;
use bulk_outreach::{
    ContactType, MergeRequest, MessagePayload, SendType, SourcePool, TaskDefinition,
};
use common::*;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_campaign_targets_each_number_once_and_merge_retires_lower_pools() {
    let harness = create_test_harness().await;

    seed_pool(&harness.engine, SourcePool::Owners, 1..5).await;
    // Numbers 3 and 4 also sit in the clients pool
    seed_pool(&harness.engine, SourcePool::Clients, 3..7).await;

    let report = harness.engine.duplicate_report(&[]).await.unwrap();
    assert_eq!(report.total_groups, 2);
    assert_eq!(report.contacts_to_retire, 2);
    for group in &report.groups {
        assert_eq!(group.members()[0].source_pool, SourcePool::Owners);
    }

    let campaign = harness
        .engine
        .create_campaign(text_campaign("Everyone once", SendType::Immediate))
        .await
        .unwrap();
    assert_eq!(campaign.total_recipients, 6);
    let recipients = harness.engine.list_recipients(campaign.id, None).await.unwrap();
    let shared = recipients
        .iter()
        .find(|r| r.phone == fixture_phone(3))
        .unwrap();
    assert_eq!(shared.source_pool, SourcePool::Owners);

    let result = harness
        .engine
        .apply_merge_request(MergeRequest::default())
        .await
        .unwrap();
    assert_eq!(result.merged_count, 2);
    assert!(result.errors.is_empty());
    assert!(harness.engine.find_duplicates(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_automated_task_skips_contacts_a_campaign_just_messaged() {
    let harness = create_test_harness_with(|config| {
        config.automation.auto_send_enabled = true;
    })
    .await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&harness.provider)
        .await;

    seed_pool(&harness.engine, SourcePool::Clients, 1..3).await;
    let campaign = harness
        .engine
        .create_campaign(text_campaign("First touch", SendType::Immediate))
        .await
        .unwrap();
    let mut events = harness.engine.subscribe();
    harness.engine.start(campaign.id).await.unwrap();
    let outcome = wait_for_campaign(&mut events, campaign.id, Duration::from_secs(10)).await;
    assert!(matches!(outcome, WaitResult::Completed), "got {outcome:?}");

    // Two more contacts nobody has messaged yet
    insert_contact(&harness.engine, SourcePool::Clients, 3, ContactType::Client).await;
    insert_contact(&harness.engine, SourcePool::Brokers, 4, ContactType::Broker).await;

    let task = harness
        .engine
        .create_task(TaskDefinition {
            name: "Follow-up".to_string(),
            payload: MessagePayload::Text {
                body: "Still looking?".to_string(),
            },
            target_category: None,
            // Far enough ahead that the poller leaves it alone
            scheduled_at: chrono::Utc::now() + chrono::Duration::days(1),
            recurrence_days: vec![Weekday::Monday],
            target_count: 10,
            max_executions: None,
            enabled: true,
        })
        .await
        .unwrap();

    let result = harness.engine.run_task_now(task.id).await.unwrap();
    assert_eq!(result.processed, 2);
    assert_eq!(result.sent, 2);
    assert!(result.success);

    let requests = harness.provider.received_requests().await.unwrap();
    let automated: Vec<String> = requests[2..]
        .iter()
        .map(|r| {
            let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
            body["to"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(automated.len(), 2);
    assert!(automated.contains(&fixture_phone(3)));
    assert!(automated.contains(&fixture_phone(4)));

    let executions = harness.engine.list_task_executions(task.id).await.unwrap();
    assert_eq!(executions.len(), 1);
}
