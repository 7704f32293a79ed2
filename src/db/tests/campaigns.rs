use super::*;
use crate::types::{CampaignId, CampaignInfo, CampaignStatus, RecipientStatus};

#[tokio::test]
async fn test_insert_campaign_freezes_recipients_in_order() {
    let (db, _temp) = test_db().await;

    let id = db
        .insert_campaign(&new_campaign(SendType::Immediate), &recipients(3))
        .await
        .unwrap();

    let row = db.get_campaign(id).await.unwrap().unwrap();
    assert_eq!(row.status(), CampaignStatus::Draft);
    assert_eq!(row.total_recipients, 3);
    assert_eq!(row.sent_count, 0);
    assert_eq!(row.send_type(), SendType::Immediate);

    let rows = db.list_recipients(id, None).await.unwrap();
    let positions: Vec<i64> = rows.iter().map(|r| r.position).collect();
    assert_eq!(positions, vec![0, 1, 2]);
    assert_eq!(rows[0].phone, "+971500000001");
    assert!(rows.iter().all(|r| r.status == RecipientStatus::Pending.to_i32()));

    db.close().await;
}

#[tokio::test]
async fn test_insert_campaign_with_many_recipients_spans_chunks() {
    let (db, _temp) = test_db().await;

    let id = db
        .insert_campaign(&new_campaign(SendType::Immediate), &recipients(400))
        .await
        .unwrap();

    let rows = db.list_recipients(id, None).await.unwrap();
    assert_eq!(rows.len(), 400);
    assert_eq!(rows[399].position, 399);
    assert_eq!(rows[399].contact_id, 400);
    // Positions stay contiguous across the multi-row insert boundaries
    assert!(rows.iter().enumerate().all(|(i, r)| r.position == i as i64));
    assert_eq!(rows[150].contact_id, 151);
}

#[tokio::test]
async fn test_gradual_send_type_round_trips_through_row() {
    let (db, _temp) = test_db().await;

    let send_type = SendType::Gradual {
        batch_size: 25,
        inter_batch_delay_secs: 600,
    };
    let id = db
        .insert_campaign(&new_campaign(send_type), &recipients(1))
        .await
        .unwrap();

    let info = CampaignInfo::try_from(db.get_campaign(id).await.unwrap().unwrap()).unwrap();
    assert_eq!(info.send_type, send_type);
    assert_eq!(info.max_retries, 3);
    assert_eq!(info.target, TargetRule::All);
}

#[tokio::test]
async fn test_transition_is_guarded_by_current_status() {
    let (db, _temp) = test_db().await;
    let id = db
        .insert_campaign(&new_campaign(SendType::Immediate), &recipients(1))
        .await
        .unwrap();

    assert!(
        db.transition_campaign(id, CampaignStatus::Draft, CampaignStatus::Queued)
            .await
            .unwrap()
    );
    // Stale expectation loses
    assert!(
        !db.transition_campaign(id, CampaignStatus::Draft, CampaignStatus::Queued)
            .await
            .unwrap()
    );

    assert!(
        db.transition_campaign(id, CampaignStatus::Queued, CampaignStatus::Sending)
            .await
            .unwrap()
    );
    let first_start = db.get_campaign(id).await.unwrap().unwrap().started_at;
    assert!(first_start.is_some());

    // Pause and resume keep the original start time
    db.transition_campaign(id, CampaignStatus::Sending, CampaignStatus::Paused)
        .await
        .unwrap();
    db.transition_campaign(id, CampaignStatus::Paused, CampaignStatus::Sending)
        .await
        .unwrap();
    assert_eq!(
        db.get_campaign(id).await.unwrap().unwrap().started_at,
        first_start
    );
}

#[tokio::test]
async fn test_complete_if_drained_waits_for_pending_recipients() {
    let (db, _temp) = test_db().await;
    let id = db
        .insert_campaign(&new_campaign(SendType::Immediate), &recipients(2))
        .await
        .unwrap();
    db.transition_campaign(id, CampaignStatus::Draft, CampaignStatus::Queued)
        .await
        .unwrap();
    db.transition_campaign(id, CampaignStatus::Queued, CampaignStatus::Sending)
        .await
        .unwrap();

    let rows = db.list_pending_recipients(id).await.unwrap();
    let first = crate::types::RecipientId(rows[0].id);
    db.claim_recipient(first).await.unwrap();
    db.record_recipient_result(
        id,
        first,
        &RecipientResult::Sent {
            provider_message_id: None,
        },
    )
    .await
    .unwrap();

    assert!(!db.complete_if_drained(id).await.unwrap());

    let second = crate::types::RecipientId(rows[1].id);
    db.claim_recipient(second).await.unwrap();
    db.record_recipient_result(
        id,
        second,
        &RecipientResult::Failed {
            error: "rejected".into(),
        },
    )
    .await
    .unwrap();

    assert!(db.complete_if_drained(id).await.unwrap());
    let row = db.get_campaign(id).await.unwrap().unwrap();
    assert_eq!(row.status(), CampaignStatus::Completed);
    assert!(row.completed_at.is_some());
    assert_eq!(row.sent_count + row.failed_count, row.total_recipients);
}

#[tokio::test]
async fn test_soft_delete_hides_campaign_and_purge_cascades() {
    let (db, _temp) = test_db().await;
    let kept = db
        .insert_campaign(&new_campaign(SendType::Immediate), &recipients(1))
        .await
        .unwrap();
    let deleted = db
        .insert_campaign(&new_campaign(SendType::Immediate), &recipients(2))
        .await
        .unwrap();

    assert!(db.soft_delete_campaign(deleted).await.unwrap());
    assert!(!db.soft_delete_campaign(deleted).await.unwrap());
    assert!(db.get_campaign(deleted).await.unwrap().is_none());

    let listed: Vec<i64> = db
        .list_campaigns()
        .await
        .unwrap()
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(listed, vec![kept.get()]);

    assert_eq!(db.purge_deleted_campaigns().await.unwrap(), 1);
    assert!(db.list_recipients(deleted, None).await.unwrap().is_empty());
    assert_eq!(db.list_recipients(kept, None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_campaigns_by_status() {
    let (db, _temp) = test_db().await;
    let a = db
        .insert_campaign(&new_campaign(SendType::Immediate), &recipients(1))
        .await
        .unwrap();
    db.insert_campaign(&new_campaign(SendType::Immediate), &recipients(1))
        .await
        .unwrap();
    db.transition_campaign(a, CampaignStatus::Draft, CampaignStatus::Queued)
        .await
        .unwrap();

    let queued = db
        .list_campaigns_by_status(CampaignStatus::Queued)
        .await
        .unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(CampaignId(queued[0].id), a);
}
