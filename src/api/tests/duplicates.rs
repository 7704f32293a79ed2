use super::*;
use crate::engine::test_helpers::phone;
use serde_json::json;

async fn app_with_duplicates() -> (Router, TestEngine) {
    let (app, t) = test_app().await;
    seed_contacts(&t.engine, SourcePool::Owners, 1, 2).await;
    // Contacts 1 and 2 again, plus one unique number
    seed_contacts(&t.engine, SourcePool::Clients, 1, 3).await;
    (app, t)
}

#[tokio::test]
async fn test_duplicate_report_for_all_pools() {
    let (app, _t) = app_with_duplicates().await;

    let response = app.oneshot(get("/api/v1/duplicates")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["contacts_scanned"], 5);
    assert_eq!(body["total_groups"], 2);
    assert_eq!(body["contacts_to_retire"], 2);
}

#[tokio::test]
async fn test_duplicate_report_single_pool_has_no_groups() {
    let (app, _t) = app_with_duplicates().await;

    let response = app
        .oneshot(get("/api/v1/duplicates?pools=clients"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["contacts_scanned"], 3);
    assert_eq!(body["total_groups"], 0);
}

#[tokio::test]
async fn test_duplicate_report_unknown_pool_is_422() {
    let (app, _t) = test_app().await;

    let response = app
        .oneshot(get("/api/v1/duplicates?pools=clients,landlords"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["details"]["field"], "pools");
}

#[tokio::test]
async fn test_merge_selected_group() {
    let (app, t) = app_with_duplicates().await;
    let group = crate::phone::normalize(&phone(1));

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/duplicates/merge",
            json!({ "group_ids": [group] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["merged_count"], 1);
    assert!(body["errors"].as_array().unwrap().is_empty());

    let remaining = t.engine.find_duplicates(&[]).await.unwrap();
    assert_eq!(remaining.len(), 1);
}

#[tokio::test]
async fn test_merge_unknown_override_is_422() {
    let (app, _t) = app_with_duplicates().await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/v1/duplicates/merge",
            json!({ "overrides": [{ "group_id": "999", "primary_id": 1 }] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
