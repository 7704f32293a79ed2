use super::*;
use serde_json::json;

fn task_body(name: &str) -> serde_json::Value {
    json!({
        "name": name,
        "payload": {"type": "text", "body": "New listings this week"},
        "scheduled_at": "2026-01-05T09:00:00Z",
        "recurrence_days": ["monday", "thursday"],
        "target_count": 5
    })
}

async fn create(app: &Router, name: &str) -> serde_json::Value {
    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/v1/tasks", task_body(name)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

#[tokio::test]
async fn test_create_and_get_task() {
    let (app, _t) = test_app().await;

    let created = create(&app, "Weekly digest").await;
    assert_eq!(created["enabled"], true);
    assert_eq!(created["execution_count"], 0);
    assert_eq!(created["recurrence_days"], json!(["monday", "thursday"]));

    let response = app
        .oneshot(get(&format!("/api/v1/tasks/{}", created["id"])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["name"], "Weekly digest");
}

#[tokio::test]
async fn test_create_task_with_blank_name_is_422() {
    let (app, _t) = test_app().await;

    let response = app
        .oneshot(json_request("POST", "/api/v1/tasks", task_body("  ")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["error"]["details"]["field"], "name");
}

#[tokio::test]
async fn test_disable_then_delete_task() {
    let (app, _t) = test_app().await;
    let id = create(&app, "Disposable").await["id"].clone();

    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/api/v1/tasks/{id}"),
            json!({ "enabled": false }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["enabled"], false);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/v1/tasks/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(get(&format!("/api/v1/tasks/{id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_executions_of_missing_task_is_404() {
    let (app, _t) = test_app().await;

    let response = app
        .oneshot(get("/api/v1/tasks/404/executions"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_scheduler_start_and_stop() {
    let (app, _t) = test_app().await;

    let response = app.clone().oneshot(get("/api/v1/scheduler")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["running"], false);

    let response = app
        .clone()
        .oneshot(post_empty("/api/v1/scheduler/start"))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["running"], true);

    let response = app
        .oneshot(post_empty("/api/v1/scheduler/stop"))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["running"], false);
}
