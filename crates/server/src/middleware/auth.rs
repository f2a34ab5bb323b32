use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use deployment::Deployment;
use services::services::auth::AuthError;

use crate::{DeploymentImpl, error::ApiError};

/// Resolve the bearer token to an [`AuthUser`](services::services::auth::AuthUser)
/// and insert it into the request extensions.
pub async fn require_user(
    State(deployment): State<DeploymentImpl>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let bearer = match req.headers().typed_get::<Authorization<Bearer>>() {
        Some(Authorization(token)) => token.token().to_owned(),
        None => return ApiError::from(AuthError::MissingToken).into_response(),
    };

    let user = match deployment.auth().verify(&bearer) {
        Ok(user) => user,
        Err(error) => {
            tracing::warn!(%error, "Rejected access token");
            return ApiError::from(error).into_response();
        }
    };

    req.extensions_mut().insert(user);
    next.run(req).await
}
