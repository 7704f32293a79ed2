use super::*;
use crate::channel::{ChannelSender, SendOutcome};
use crate::contacts::ContactStore;
use crate::db::Database;
use crate::types::MessagePayload;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Create a campaign over `count` client contacts and queue it without spawning a run
async fn queued_campaign(t: &TestEngine, count: usize, send_type: SendType) -> CampaignId {
    seed_contacts(&t.engine, SourcePool::Clients, 1, count).await;
    let campaign = t
        .engine
        .create_campaign(definition("Weekend viewing", send_type))
        .await
        .unwrap();
    t.engine
        .db
        .transition_campaign(campaign.id, CampaignStatus::Draft, CampaignStatus::Queued)
        .await
        .unwrap();
    campaign.id
}

/// Wait until exactly `count` runs of `id` are registered
async fn wait_for_registered_runs(engine: &OutreachEngine, id: CampaignId, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let registered = engine
                .dispatch
                .active_runs
                .lock()
                .await
                .get(&id)
                .map_or(0, Vec::len);
            if registered == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("registered runs never reached the expected count");
}

/// Channel that marks its campaign `paused` in the store after `after` deliveries,
/// leaving the run's token untouched
struct StorePausingSender {
    db: Arc<Database>,
    campaign: OnceLock<CampaignId>,
    after: usize,
    delivered: AtomicUsize,
}

#[async_trait]
impl ChannelSender for StorePausingSender {
    async fn send(&self, phone: &str, _payload: &MessagePayload) -> SendOutcome {
        let delivered = self.delivered.fetch_add(1, Ordering::SeqCst) + 1;
        if delivered == self.after
            && let Some(id) = self.campaign.get()
        {
            self.db
                .transition_campaign(*id, CampaignStatus::Sending, CampaignStatus::Paused)
                .await
                .unwrap();
        }
        SendOutcome::Delivered {
            provider_message_id: Some(format!("msg-{phone}")),
        }
    }
}

#[tokio::test]
async fn test_gradual_run_batches_and_waits_between_batches() {
    let t = create_test_engine().await;
    let id = queued_campaign(&t, 25, gradual(10, 60)).await;
    let mut events = t.engine.subscribe();

    let report = t.engine.run(id).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.batches, vec![10, 10, 5]);
    assert_eq!(report.inter_batch_waits, 2);
    assert_eq!(report.sent, 25);
    assert_eq!(
        t.delay.waits(),
        vec![Duration::from_secs(60), Duration::from_secs(60)]
    );

    let campaign = t.engine.get_campaign(id).await.unwrap();
    assert_eq!(campaign.status, CampaignStatus::Completed);
    assert!(campaign.completed_at.is_some());
    assert_counters_match(&t.engine, id).await;

    let mut batches = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let Event::BatchCompleted { batch, size, .. } = event {
            batches.push((batch, size));
        }
    }
    assert_eq!(batches, vec![(1, 10), (2, 10), (3, 5)]);
}

#[tokio::test]
async fn test_immediate_run_paces_between_sends() {
    let mut config = test_config();
    config.dispatch.pacing_delay = Duration::from_secs(1);
    let t = create_test_engine_with(config).await;
    let id = queued_campaign(&t, 3, SendType::Immediate).await;

    let report = t.engine.run(id).await.unwrap();

    assert_eq!(report.batches, vec![3]);
    assert_eq!(report.inter_batch_waits, 0);
    assert_eq!(
        t.delay.waits(),
        vec![Duration::from_secs(1), Duration::from_secs(1)]
    );
    // Sent in stored recipient order
    let stored: Vec<String> = t
        .engine
        .list_recipients(id, None)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.phone)
        .collect();
    assert_eq!(t.sender.sent(), stored);
}

#[tokio::test]
async fn test_run_twice_never_resends() {
    let t = create_test_engine().await;
    let id = queued_campaign(&t, 4, SendType::Immediate).await;

    let first = t.engine.run(id).await.unwrap();
    let second = t.engine.run(id).await.unwrap();

    assert_eq!(first.outcome, RunOutcome::Completed);
    assert_eq!(second.outcome, RunOutcome::Skipped);
    assert_eq!(second.sent, 0);
    assert_eq!(t.sender.sent().len(), 4);
}

#[tokio::test]
async fn test_channel_failures_are_recorded_and_campaign_completes() {
    let t = create_test_engine().await;
    let id = queued_campaign(&t, 3, SendType::Immediate).await;
    t.sender.fail_for(&phone(2));

    let report = t.engine.run(id).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.sent, 2);
    assert_eq!(report.failed, 1);

    let failed = t
        .engine
        .list_recipients(id, Some(RecipientStatus::Failed))
        .await
        .unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].phone, phone(2));
    assert_eq!(failed[0].retry_count, 1);
    assert_eq!(
        failed[0].error_message.as_deref(),
        Some("provider rejected the number")
    );
    assert_counters_match(&t.engine, id).await;
}

#[tokio::test]
async fn test_pause_between_batches_then_resume_sends_each_recipient_once() {
    let t = create_test_engine().await;
    let id = queued_campaign(&t, 25, gradual(10, 300)).await;
    t.delay.hold();
    let mut events = t.engine.subscribe();

    let engine = t.engine.clone();
    let run = tokio::spawn(async move { engine.run(id).await });

    wait_for_event(&mut events, |e| matches!(e, Event::BatchCompleted { batch: 1, .. })).await;
    t.engine.pause(id).await.unwrap();

    let report = run.await.unwrap().unwrap();
    assert_eq!(report.outcome, RunOutcome::Stopped);
    assert_eq!(report.batches, vec![10]);

    let campaign = t.engine.get_campaign(id).await.unwrap();
    assert_eq!(campaign.status, CampaignStatus::Paused);
    assert_eq!(campaign.sent_count, 10);
    assert_eq!(
        t.engine
            .list_recipients(id, Some(RecipientStatus::Pending))
            .await
            .unwrap()
            .len(),
        15
    );

    t.delay.release();
    t.engine.resume(id).await.unwrap();
    wait_for_event(&mut events, |e| matches!(e, Event::CampaignCompleted { .. })).await;

    let sent = t.sender.sent();
    assert_eq!(sent.len(), 25);
    assert_eq!(sent.iter().collect::<HashSet<_>>().len(), 25);
    assert_counters_match(&t.engine, id).await;
}

#[tokio::test]
async fn test_pause_stops_run_started_alongside_active_run() {
    let t = create_test_engine().await;
    let id = queued_campaign(&t, 30, gradual(10, 300)).await;
    t.delay.hold();
    let mut events = t.engine.subscribe();

    t.engine.start(id).await.unwrap();
    wait_for_event(&mut events, |e| matches!(e, Event::BatchCompleted { batch: 1, .. })).await;

    // Second run queues behind the first for the campaign lock
    let engine = t.engine.clone();
    let second = tokio::spawn(async move { engine.run(id).await });
    wait_for_registered_runs(&t.engine, id, 2).await;

    t.engine.pause(id).await.unwrap();

    let report = second.await.unwrap().unwrap();
    assert_eq!(report.outcome, RunOutcome::Stopped);
    assert!(report.batches.is_empty());
    wait_for_registered_runs(&t.engine, id, 0).await;

    let campaign = t.engine.get_campaign(id).await.unwrap();
    assert_eq!(campaign.status, CampaignStatus::Paused);
    assert_eq!(campaign.sent_count, 10);
    assert_eq!(t.sender.sent().len(), 10);
    assert_eq!(
        t.engine
            .list_recipients(id, Some(RecipientStatus::Pending))
            .await
            .unwrap()
            .len(),
        20
    );

    t.delay.release();
    t.engine.resume(id).await.unwrap();
    wait_for_event(&mut events, |e| matches!(e, Event::CampaignCompleted { .. })).await;

    let sent = t.sender.sent();
    assert_eq!(sent.len(), 30);
    assert_eq!(sent.iter().collect::<HashSet<_>>().len(), 30);
    assert_counters_match(&t.engine, id).await;
}

#[tokio::test]
async fn test_cancel_reaches_every_registered_run() {
    let t = create_test_engine().await;
    let id = queued_campaign(&t, 20, gradual(10, 300)).await;
    t.delay.hold();
    let mut events = t.engine.subscribe();

    let engine = t.engine.clone();
    let first = tokio::spawn(async move { engine.run(id).await });
    wait_for_event(&mut events, |e| matches!(e, Event::BatchCompleted { batch: 1, .. })).await;

    let engine = t.engine.clone();
    let second = tokio::spawn(async move { engine.run(id).await });
    wait_for_registered_runs(&t.engine, id, 2).await;

    t.engine.cancel(id).await.unwrap();

    assert_eq!(first.await.unwrap().unwrap().outcome, RunOutcome::Stopped);
    assert_eq!(second.await.unwrap().unwrap().outcome, RunOutcome::Stopped);
    wait_for_registered_runs(&t.engine, id, 0).await;

    let campaign = t.engine.get_campaign(id).await.unwrap();
    assert_eq!(campaign.status, CampaignStatus::Cancelled);
    assert_eq!(campaign.sent_count, 10);
    assert_eq!(t.sender.sent().len(), 10);
}

#[tokio::test]
async fn test_run_stops_before_next_batch_when_stored_status_leaves_sending() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config();
    config.persistence.database_path = temp_dir.path().join("outreach.db");
    let db = Arc::new(
        Database::new(&config.persistence.database_path)
            .await
            .unwrap(),
    );
    let sender = Arc::new(StorePausingSender {
        db: db.clone(),
        campaign: OnceLock::new(),
        after: 10,
        delivered: AtomicUsize::new(0),
    });
    let engine = OutreachEngine::with_components(
        config,
        db.clone(),
        sender.clone(),
        Arc::new(ScriptedDelay::default()),
        ContactStore::from_database(db.clone()),
    );

    seed_contacts(&engine, SourcePool::Clients, 1, 25).await;
    let id = engine
        .create_campaign(definition("Open house", gradual(10, 60)))
        .await
        .unwrap()
        .id;
    sender.campaign.set(id).unwrap();
    db.transition_campaign(id, CampaignStatus::Draft, CampaignStatus::Queued)
        .await
        .unwrap();

    let report = engine.run(id).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Stopped);
    assert_eq!(report.batches, vec![10]);
    assert_eq!(sender.delivered.load(Ordering::SeqCst), 10);
    assert_eq!(
        engine
            .list_recipients(id, Some(RecipientStatus::Pending))
            .await
            .unwrap()
            .len(),
        15
    );
    assert_eq!(
        engine.get_campaign(id).await.unwrap().status,
        CampaignStatus::Paused
    );
}

#[tokio::test]
async fn test_cancel_during_wait_leaves_rest_pending() {
    let t = create_test_engine().await;
    let id = queued_campaign(&t, 15, gradual(10, 300)).await;
    t.delay.hold();
    let mut events = t.engine.subscribe();

    let engine = t.engine.clone();
    let run = tokio::spawn(async move { engine.run(id).await });

    wait_for_event(&mut events, |e| matches!(e, Event::BatchCompleted { .. })).await;
    t.engine.cancel(id).await.unwrap();

    let report = run.await.unwrap().unwrap();
    assert_eq!(report.outcome, RunOutcome::Stopped);

    let campaign = t.engine.get_campaign(id).await.unwrap();
    assert_eq!(campaign.status, CampaignStatus::Cancelled);
    assert_eq!(campaign.sent_count, 10);

    // A cancelled campaign is never dispatched again
    let again = t.engine.run(id).await.unwrap();
    assert_eq!(again.outcome, RunOutcome::Skipped);
    assert_eq!(t.sender.sent().len(), 10);
}

#[tokio::test]
async fn test_run_rejects_draft_campaign() {
    let t = create_test_engine().await;
    seed_contacts(&t.engine, SourcePool::Clients, 1, 1).await;
    let campaign = t
        .engine
        .create_campaign(definition("Not started", SendType::Immediate))
        .await
        .unwrap();

    let result = t.engine.run(campaign.id).await;
    assert!(matches!(
        result,
        Err(Error::Campaign(CampaignError::InvalidState { .. }))
    ));
    assert!(t.sender.sent().is_empty());
}

#[tokio::test]
async fn test_store_failure_aborts_run() {
    let t = create_test_engine().await;
    let id = queued_campaign(&t, 2, SendType::Immediate).await;
    let mut events = t.engine.subscribe();

    t.engine.db.pool().close().await;
    let result = t.engine.run(id).await;

    assert!(matches!(result, Err(Error::SchedulerFatal { .. })));
    assert!(matches!(
        events.try_recv(),
        Ok(Event::CampaignAborted { .. })
    ));
    assert!(t.sender.sent().is_empty());
}

#[tokio::test]
async fn test_progress_emitted_after_each_batch() {
    let t = create_test_engine().await;
    let id = queued_campaign(&t, 4, gradual(2, 60)).await;
    let mut events = t.engine.subscribe();

    t.engine.run(id).await.unwrap();

    let mut snapshots = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let Event::Progress { snapshot } = event {
            snapshots.push(snapshot);
        }
    }
    assert!(snapshots.len() >= 2);
    assert_eq!(snapshots[0].sent, 2);
    assert_eq!(snapshots[0].pending, 2);
    let last = snapshots.last().unwrap();
    assert_eq!(last.sent, 4);
    assert_eq!(last.pending, 0);
    assert_eq!(last.success_rate, 1.0);
}
