use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::calendar_event::{CalendarEvent, CreateCalendarEvent, UpdateCalendarEvent};
use deployment::Deployment;
use services::services::{auth::AuthUser, calendar::EventRange};
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, middleware::load_event_middleware};

pub async fn get_events(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Query(range): Query<EventRange>,
) -> Result<ResponseJson<ApiResponse<Vec<CalendarEvent>>>, ApiError> {
    let events = deployment.calendar().list_events(user.id, range).await?;
    Ok(ResponseJson(ApiResponse::success(events)))
}

pub async fn get_event(
    Extension(event): Extension<CalendarEvent>,
) -> Result<ResponseJson<ApiResponse<CalendarEvent>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(event)))
}

pub async fn create_event(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateCalendarEvent>,
) -> Result<ResponseJson<ApiResponse<CalendarEvent>>, ApiError> {
    let event = deployment.calendar().create_event(user.id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(event)))
}

pub async fn update_event(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Extension(event): Extension<CalendarEvent>,
    Json(payload): Json<UpdateCalendarEvent>,
) -> Result<ResponseJson<ApiResponse<CalendarEvent>>, ApiError> {
    let event = deployment
        .calendar()
        .update_event(user.id, event.id, payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(event)))
}

pub async fn delete_event(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Extension(event): Extension<CalendarEvent>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment.calendar().delete_event(user.id, event.id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let event_id_router = Router::new()
        .route("/", get(get_event).put(update_event).delete(delete_event))
        .layer(from_fn_with_state(deployment.clone(), load_event_middleware));

    let inner = Router::new()
        .route("/", get(get_events).post(create_event))
        .nest("/{id}", event_id_router);

    Router::new().nest("/events", inner)
}
