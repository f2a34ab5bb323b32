use axum::{
    Extension, Json, Router,
    extract::{State, ws::WebSocketUpgrade},
    middleware::from_fn_with_state,
    response::{IntoResponse, Json as ResponseJson},
    routing::{get, post},
};
use db::models::{
    column::{Column, CreateColumn},
    project::{CreateProject, Project, UpdateProject},
};
use deployment::Deployment;
use serde::Deserialize;
use services::services::{auth::AuthUser, board::Board};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    error::ApiError,
    middleware::load_project_middleware,
    ws_util::{WsKeepAlive, forward_stream_msgs},
};

#[derive(Debug, Deserialize, TS)]
pub struct ReorderColumns {
    pub column_ids: Vec<Uuid>,
}

pub async fn get_projects(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
) -> Result<ResponseJson<ApiResponse<Vec<Project>>>, ApiError> {
    let projects = deployment.board().list_projects(user.id).await?;
    Ok(ResponseJson(ApiResponse::success(projects)))
}

pub async fn get_project(
    Extension(project): Extension<Project>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn create_project(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateProject>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    let project = deployment.board().create_project(user.id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn update_project(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Extension(project): Extension<Project>,
    Json(payload): Json<UpdateProject>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    let project = deployment
        .board()
        .update_project(user.id, project.id, payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn delete_project(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Extension(project): Extension<Project>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment.board().delete_project(user.id, project.id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn get_board(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Extension(project): Extension<Project>,
) -> Result<ResponseJson<ApiResponse<Board>>, ApiError> {
    let board = deployment.board().load_board(user.id, project.id).await?;
    Ok(ResponseJson(ApiResponse::success(board)))
}

/// Board snapshot followed by live JSON patches.
pub async fn stream_board_ws(
    ws: WebSocketUpgrade,
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Extension(project): Extension<Project>,
) -> Result<impl IntoResponse, ApiError> {
    // subscribe before upgrading so a failure is still a proper HTTP error
    let stream = deployment.board().subscribe(user.id, project.id).await?;

    Ok(ws.on_upgrade(move |socket| async move {
        if let Err(e) = forward_stream_msgs(socket, stream, WsKeepAlive::for_board_streams()).await
        {
            tracing::warn!(project_id = %project.id, "board WS closed: {}", e);
        }
    }))
}

pub async fn create_column(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Extension(project): Extension<Project>,
    Json(payload): Json<CreateColumn>,
) -> Result<ResponseJson<ApiResponse<Column>>, ApiError> {
    let column = deployment
        .board()
        .create_column(user.id, project.id, payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(column)))
}

pub async fn reorder_columns(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Extension(project): Extension<Project>,
    Json(payload): Json<ReorderColumns>,
) -> Result<ResponseJson<ApiResponse<Vec<Column>>>, ApiError> {
    let columns = deployment
        .board()
        .reorder_columns(user.id, project.id, payload.column_ids)
        .await?;
    Ok(ResponseJson(ApiResponse::success(columns)))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let project_id_router = Router::new()
        .route(
            "/",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/board", get(get_board))
        .route("/board/ws", get(stream_board_ws))
        .route("/columns", post(create_column))
        .route("/columns/reorder", post(reorder_columns))
        .layer(from_fn_with_state(
            deployment.clone(),
            load_project_middleware,
        ));

    let inner = Router::new()
        .route("/", get(get_projects).post(create_project))
        .nest("/{id}", project_id_router);

    Router::new().nest("/projects", inner)
}
