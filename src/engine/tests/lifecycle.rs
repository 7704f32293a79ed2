use super::*;
use crate::db::INTERRUPTED_ERROR;
use crate::types::RecipientId;

/// A campaign left `sending` with its first recipient in flight, as after a crash
async fn interrupted_campaign(t: &TestEngine) -> CampaignId {
    seed_contacts(&t.engine, SourcePool::Clients, 1, 3).await;
    let id = t
        .engine
        .create_campaign(definition("Interrupted", SendType::Immediate))
        .await
        .unwrap()
        .id;
    let db = &t.engine.db;
    db.transition_campaign(id, CampaignStatus::Draft, CampaignStatus::Queued)
        .await
        .unwrap();
    db.transition_campaign(id, CampaignStatus::Queued, CampaignStatus::Sending)
        .await
        .unwrap();
    let first = db.list_pending_recipients(id).await.unwrap()[0].id;
    assert!(db.claim_recipient(RecipientId(first)).await.unwrap());
    id
}

#[tokio::test]
async fn test_restore_fails_in_flight_and_resumes_sending() {
    let t = create_test_engine().await;
    let id = interrupted_campaign(&t).await;
    let mut events = t.engine.subscribe();

    let restored = t.engine.restore_on_startup().await.unwrap();
    assert_eq!(restored, vec![id]);
    wait_for_event(&mut events, |e| matches!(e, Event::CampaignCompleted { .. })).await;

    // The in-flight recipient is never re-sent automatically
    assert_eq!(t.sender.sent(), vec![phone(2), phone(3)]);
    let failed = t
        .engine
        .list_recipients(id, Some(RecipientStatus::Failed))
        .await
        .unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].error_message.as_deref(), Some(INTERRUPTED_ERROR));
    assert_counters_match(&t.engine, id).await;
}

#[tokio::test]
async fn test_restore_without_resume_leaves_campaign_alone() {
    let mut config = test_config();
    config.dispatch.resume_on_startup = false;
    let t = create_test_engine_with(config).await;
    let id = interrupted_campaign(&t).await;

    let restored = t.engine.restore_on_startup().await.unwrap();

    assert!(restored.is_empty());
    assert_eq!(
        t.engine.get_campaign(id).await.unwrap().status,
        CampaignStatus::Sending
    );
    assert_eq!(
        t.engine
            .list_recipients(id, Some(RecipientStatus::Pending))
            .await
            .unwrap()
            .len(),
        2
    );
    assert!(t.sender.sent().is_empty());
}

#[tokio::test]
async fn test_shutdown_stops_runs_and_rejects_new_ones() {
    let t = create_test_engine().await;
    seed_contacts(&t.engine, SourcePool::Clients, 1, 15).await;
    let id = t
        .engine
        .create_campaign(definition("Long", gradual(10, 300)))
        .await
        .unwrap()
        .id;
    t.delay.hold();
    let mut events = t.engine.subscribe();

    t.engine.start(id).await.unwrap();
    wait_for_event(&mut events, |e| matches!(e, Event::BatchCompleted { .. })).await;

    t.engine.shutdown().await.unwrap();

    assert!(t.engine.dispatch.active_runs.lock().await.is_empty());
    // Left sending so the next process resumes it
    assert_eq!(
        t.engine.get_campaign(id).await.unwrap().status,
        CampaignStatus::Sending
    );
    assert!(matches!(t.engine.start(id).await, Err(Error::ShuttingDown)));
    assert!(matches!(t.engine.run(id).await, Err(Error::ShuttingDown)));
    wait_for_event(&mut events, |e| matches!(e, Event::Shutdown)).await;
}
