use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::task::{CreateTask, MoveTask, Task, UpdateTask};
use deployment::Deployment;
use serde::Deserialize;
use services::services::auth::AuthUser;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::load_task_middleware};

#[derive(Debug, Deserialize)]
pub struct TaskQuery {
    pub project_id: Uuid,
}

pub async fn get_tasks(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<TaskQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Task>>>, ApiError> {
    let tasks = deployment
        .board()
        .list_tasks(user.id, query.project_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

pub async fn get_task(
    Extension(task): Extension<Task>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn create_task(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateTask>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    tracing::debug!(project_id = %payload.project_id, "Creating task");
    let task = deployment.board().create_task(user.id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn update_task(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Extension(task): Extension<Task>,
    Json(payload): Json<UpdateTask>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = deployment
        .board()
        .update_task(user.id, task.id, payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn delete_task(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Extension(task): Extension<Task>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment.board().delete_task(user.id, task.id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// Drag and drop. On failure the board has already been rolled back and the
/// user notified; the error is still returned so the caller can react.
pub async fn move_task(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Extension(task): Extension<Task>,
    Json(payload): Json<MoveTask>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = deployment
        .board()
        .move_task(user.id, task.id, payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn toggle_complete(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Extension(task): Extension<Task>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = deployment.board().toggle_complete(user.id, task.id).await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let task_id_router = Router::new()
        .route("/", get(get_task).put(update_task).delete(delete_task))
        .route("/move", post(move_task))
        .route("/toggle-complete", post(toggle_complete))
        .layer(from_fn_with_state(deployment.clone(), load_task_middleware));

    let inner = Router::new()
        .route("/", get(get_tasks).post(create_task))
        .nest("/{id}", task_id_router);

    Router::new().nest("/tasks", inner)
}
