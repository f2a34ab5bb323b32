use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::put,
};
use db::models::column::{Column, UpdateColumn};
use deployment::Deployment;
use serde::Deserialize;
use services::services::auth::AuthUser;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::load_column_middleware};

#[derive(Debug, Default, Deserialize)]
pub struct DeleteColumnQuery {
    /// Column that receives the deleted column's tasks; without it they are deleted.
    pub reassign_to: Option<Uuid>,
}

pub async fn rename_column(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Extension(column): Extension<Column>,
    Json(payload): Json<UpdateColumn>,
) -> Result<ResponseJson<ApiResponse<Column>>, ApiError> {
    let column = deployment
        .board()
        .rename_column(user.id, column.id, payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(column)))
}

pub async fn delete_column(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Extension(column): Extension<Column>,
    Query(query): Query<DeleteColumnQuery>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment
        .board()
        .delete_column(user.id, column.id, query.reassign_to)
        .await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let column_id_router = Router::new()
        .route("/", put(rename_column).delete(delete_column))
        .layer(from_fn_with_state(deployment.clone(), load_column_middleware));

    Router::new().nest("/columns/{id}", column_id_router)
}
