use axum::{
    Extension, Router,
    extract::{Path, State, ws::WebSocketUpgrade},
    response::{IntoResponse, Json as ResponseJson},
    routing::{delete, get, post},
};
use db::models::notification::Notification;
use deployment::Deployment;
use serde::Serialize;
use services::services::auth::AuthUser;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    error::ApiError,
    ws_util::{WsKeepAlive, forward_stream_msgs},
};

#[derive(Debug, Serialize, TS)]
pub struct NotificationFeed {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
}

#[derive(Debug, Serialize, TS)]
pub struct MarkAllReadResponse {
    pub marked: usize,
}

pub async fn get_notifications(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
) -> ResponseJson<ApiResponse<NotificationFeed>> {
    let center = deployment.notifications();
    ResponseJson(ApiResponse::success(NotificationFeed {
        notifications: center.list(user.id),
        unread_count: center.unread_count(user.id),
    }))
}

pub async fn stream_notifications_ws(
    ws: WebSocketUpgrade,
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
) -> impl IntoResponse {
    let stream = deployment.notifications().subscribe(user.id);
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = forward_stream_msgs(socket, stream, WsKeepAlive::for_feed_streams()).await {
            tracing::warn!(user_id = %user.id, "notifications WS closed: {}", e);
        }
    })
}

pub async fn mark_read(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Notification>>, ApiError> {
    let notification = deployment.notifications().mark_read(user.id, id)?;
    Ok(ResponseJson(ApiResponse::success(notification)))
}

pub async fn mark_all_read(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
) -> ResponseJson<ApiResponse<MarkAllReadResponse>> {
    let marked = deployment.notifications().mark_all_read(user.id);
    ResponseJson(ApiResponse::success(MarkAllReadResponse { marked }))
}

pub async fn remove_notification(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment.notifications().remove(user.id, id)?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn clear_notifications(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
) -> ResponseJson<ApiResponse<()>> {
    deployment.notifications().clear(user.id);
    ResponseJson(ApiResponse::success(()))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route(
            "/notifications",
            get(get_notifications).delete(clear_notifications),
        )
        .route("/notifications/ws", get(stream_notifications_ws))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/{id}", delete(remove_notification))
        .route("/notifications/{id}/read", post(mark_read))
}
