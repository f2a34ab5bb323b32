use axum::{
    Extension, Json, Router, extract::State, response::Json as ResponseJson, routing::get,
};
use db::models::profile::{Profile, UpdateProfile};
use deployment::Deployment;
use services::services::auth::AuthUser;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

pub async fn get_profile(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
) -> Result<ResponseJson<ApiResponse<Profile>>, ApiError> {
    let profile = deployment.profile().get_profile(user.id).await?;
    Ok(ResponseJson(ApiResponse::success(profile)))
}

pub async fn update_profile(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<UpdateProfile>,
) -> Result<ResponseJson<ApiResponse<Profile>>, ApiError> {
    let profile = deployment.profile().update_profile(user.id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(profile)))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new().route("/profile", get(get_profile).put(update_profile))
}
