use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{delete, get, post},
};
use db::models::{
    email::{Email, UpdateEmail},
    email_account::{CreateEmailAccount, EmailAccount},
    notification::Notification,
};
use deployment::Deployment;
use services::services::{
    auth::AuthUser,
    email::{
        DeleteOutcome, EmailError, EmailQuery, SendEmail, SyncResult,
        providers::{ProviderPreset, all_presets},
    },
};
use utils::response::ApiResponse;

use crate::{
    DeploymentImpl,
    error::ApiError,
    middleware::{load_email_account_middleware, load_email_middleware},
};

pub async fn get_providers() -> ResponseJson<ApiResponse<Vec<ProviderPreset>>> {
    ResponseJson(ApiResponse::success(all_presets()))
}

// Accounts

pub async fn get_accounts(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
) -> Result<ResponseJson<ApiResponse<Vec<EmailAccount>>>, ApiError> {
    let accounts = deployment.email().list_accounts(user.id).await?;
    Ok(ResponseJson(ApiResponse::success(accounts)))
}

pub async fn create_account(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateEmailAccount>,
) -> Result<ResponseJson<ApiResponse<EmailAccount>>, ApiError> {
    let account = deployment.email().create_account(user.id, payload).await?;
    Ok(ResponseJson(ApiResponse::success(account)))
}

pub async fn delete_account(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Extension(account): Extension<EmailAccount>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment.email().delete_account(user.id, account.id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn sync_account(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Extension(account): Extension<EmailAccount>,
) -> Result<ResponseJson<ApiResponse<SyncResult>>, ApiError> {
    let result = deployment
        .email()
        .sync_account(user.id, account.id)
        .await
        .inspect_err(|e| notify_failure(&deployment, &user, "Sync failed", &account.email, e))?;
    Ok(ResponseJson(ApiResponse::success(result)))
}

// Messages

pub async fn get_emails(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<EmailQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Email>>>, ApiError> {
    let emails = deployment.email().list_emails(user.id, query).await?;
    Ok(ResponseJson(ApiResponse::success(emails)))
}

pub async fn get_email(
    Extension(email): Extension<Email>,
) -> Result<ResponseJson<ApiResponse<Email>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(email)))
}

pub async fn update_email(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Extension(email): Extension<Email>,
    Json(payload): Json<UpdateEmail>,
) -> Result<ResponseJson<ApiResponse<Email>>, ApiError> {
    let email = deployment
        .email()
        .update_email(user.id, email.id, payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(email)))
}

pub async fn delete_email(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Extension(email): Extension<Email>,
) -> Result<ResponseJson<ApiResponse<DeleteOutcome>>, ApiError> {
    let outcome = deployment.email().delete_email(user.id, email.id).await?;
    Ok(ResponseJson(ApiResponse::success(outcome)))
}

pub async fn send_email(
    State(deployment): State<DeploymentImpl>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<SendEmail>,
) -> Result<ResponseJson<ApiResponse<Email>>, ApiError> {
    let subject = payload.subject.clone();
    let email = deployment
        .email()
        .send_email(user.id, payload)
        .await
        .inspect_err(|e| notify_failure(&deployment, &user, "Sending failed", &subject, e))?;

    deployment.notifications().push(
        user.id,
        Notification::success("Email sent", format!("\"{}\" was sent", email.subject)),
    );
    Ok(ResponseJson(ApiResponse::success(email)))
}

/// Failures talking to the mail servers also go to the user's feed; input
/// errors are only returned.
fn notify_failure(
    deployment: &DeploymentImpl,
    user: &AuthUser,
    title: &str,
    subject: &str,
    error: &EmailError,
) {
    if matches!(error, EmailError::Function(_) | EmailError::Store(_)) {
        deployment.notifications().push(
            user.id,
            Notification::error(title, format!("{subject}: {error}")),
        );
    }
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let account_id_router = Router::new()
        .route("/", delete(delete_account))
        .route("/sync", post(sync_account))
        .layer(from_fn_with_state(
            deployment.clone(),
            load_email_account_middleware,
        ));

    let email_id_router = Router::new()
        .route(
            "/",
            get(get_email).patch(update_email).delete(delete_email),
        )
        .layer(from_fn_with_state(deployment.clone(), load_email_middleware));

    let inner = Router::new()
        .route("/accounts", get(get_accounts).post(create_account))
        .nest("/accounts/{id}", account_id_router)
        .route("/messages", get(get_emails))
        .nest("/messages/{id}", email_id_router)
        .route("/send", post(send_email));

    Router::new().nest("/email", inner)
}
