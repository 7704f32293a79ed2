//! Automated task handlers.

use super::UpdateTaskRequest;
use crate::api::AppState;
use crate::automation::TaskDefinition;
use crate::types::TaskId;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// GET /tasks - List automated tasks
#[utoipa::path(
    get,
    path = "/api/v1/tasks",
    tag = "tasks",
    responses(
        (status = 200, description = "Automated tasks", body = Vec<crate::automation::AutomatedTask>),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_tasks(State(state): State<AppState>) -> Response {
    match state.engine.list_tasks().await {
        Ok(tasks) => (StatusCode::OK, Json(tasks)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /tasks - Create an automated task
#[utoipa::path(
    post,
    path = "/api/v1/tasks",
    tag = "tasks",
    request_body = TaskDefinition,
    responses(
        (status = 201, description = "Task created", body = crate::automation::AutomatedTask),
        (status = 422, description = "Invalid definition")
    )
)]
pub async fn create_task(
    State(state): State<AppState>,
    Json(definition): Json<TaskDefinition>,
) -> Response {
    match state.engine.create_task(definition).await {
        Ok(task) => (StatusCode::CREATED, Json(task)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /tasks/:id - Get an automated task
#[utoipa::path(
    get,
    path = "/api/v1/tasks/{id}",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task", body = crate::automation::AutomatedTask),
        (status = 404, description = "Task not found")
    )
)]
pub async fn get_task(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.engine.get_task(TaskId(id)).await {
        Ok(task) => (StatusCode::OK, Json(task)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// PATCH /tasks/:id - Enable or disable a task
#[utoipa::path(
    patch,
    path = "/api/v1/tasks/{id}",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task ID")),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Task updated", body = crate::automation::AutomatedTask),
        (status = 404, description = "Task not found")
    )
)]
pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateTaskRequest>,
) -> Response {
    match state
        .engine
        .set_task_enabled(TaskId(id), request.enabled)
        .await
    {
        Ok(task) => (StatusCode::OK, Json(task)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// DELETE /tasks/:id - Delete a task and its execution log
#[utoipa::path(
    delete,
    path = "/api/v1/tasks/{id}",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 404, description = "Task not found")
    )
)]
pub async fn delete_task(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.engine.delete_task(TaskId(id)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /tasks/:id/run - Run a task now, ignoring its schedule
#[utoipa::path(
    post,
    path = "/api/v1/tasks/{id}/run",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Execution result", body = crate::automation::ExecutionResult),
        (status = 404, description = "Task not found")
    )
)]
pub async fn run_task_now(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.engine.run_task_now(TaskId(id)).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /tasks/:id/executions - Execution log, newest first
#[utoipa::path(
    get,
    path = "/api/v1/tasks/{id}/executions",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Executions", body = Vec<crate::automation::TaskExecution>),
        (status = 404, description = "Task not found")
    )
)]
pub async fn list_task_executions(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.engine.list_task_executions(TaskId(id)).await {
        Ok(executions) => (StatusCode::OK, Json(executions)).into_response(),
        Err(e) => e.into_response(),
    }
}
