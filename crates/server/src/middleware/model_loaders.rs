//! Resolve `{id}` path parameters to records the caller owns.
//!
//! Each loader runs after [`require_user`](super::require_user), looks the
//! record up on behalf of the signed-in user and inserts it as a request
//! extension. Records owned by someone else are reported as not found.

use axum::{
    Extension,
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};
use deployment::Deployment;
use services::services::auth::AuthUser;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

pub async fn load_project_middleware(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<Uuid>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let project = deployment.board().get_project(user.id, project_id).await?;
    request.extensions_mut().insert(project);
    Ok(next.run(request).await)
}

pub async fn load_column_middleware(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Path(column_id): Path<Uuid>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let column = deployment.board().get_column(user.id, column_id).await?;
    request.extensions_mut().insert(column);
    Ok(next.run(request).await)
}

pub async fn load_task_middleware(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Path(task_id): Path<Uuid>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let task = deployment.board().get_task(user.id, task_id).await?;
    request.extensions_mut().insert(task);
    Ok(next.run(request).await)
}

pub async fn load_event_middleware(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Path(event_id): Path<Uuid>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let event = deployment.calendar().get_event(user.id, event_id).await?;
    request.extensions_mut().insert(event);
    Ok(next.run(request).await)
}

pub async fn load_email_account_middleware(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Path(account_id): Path<Uuid>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let account = deployment.email().get_account(user.id, account_id).await?;
    request.extensions_mut().insert(account);
    Ok(next.run(request).await)
}

pub async fn load_email_middleware(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Path(email_id): Path<Uuid>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let email = deployment.email().get_email(user.id, email_id).await?;
    request.extensions_mut().insert(email);
    Ok(next.run(request).await)
}
