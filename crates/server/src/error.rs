use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::{StoreError, validation::ValidationError};
use deployment::DeploymentError;
use services::services::{
    auth::AuthError,
    board::BoardError,
    calendar::CalendarError,
    config::ConfigError,
    email::{EmailError, functions::FunctionError},
    notification::NotificationError,
    profile::ProfileError,
};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error(transparent)]
    Calendar(#[from] CalendarError),
    #[error(transparent)]
    Email(#[from] EmailError),
    #[error(transparent)]
    Notification(#[from] NotificationError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    BadRequest(String),
}

fn store_status(e: &StoreError) -> StatusCode {
    match e {
        StoreError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::BAD_GATEWAY,
    }
}

fn function_status(e: &FunctionError) -> StatusCode {
    match e {
        FunctionError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
        FunctionError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Board(e) => match e {
                BoardError::Store(e) => store_status(e),
                BoardError::Validation(_) | BoardError::InvalidColumnOrder(_) => {
                    StatusCode::BAD_REQUEST
                }
                BoardError::ProjectNotFound
                | BoardError::ColumnNotFound
                | BoardError::TaskNotFound => StatusCode::NOT_FOUND,
            },
            ApiError::Calendar(e) => match e {
                CalendarError::Store(e) => store_status(e),
                CalendarError::Validation(_) => StatusCode::BAD_REQUEST,
                CalendarError::NotFound => StatusCode::NOT_FOUND,
            },
            ApiError::Email(e) => match e {
                EmailError::Store(e) => store_status(e),
                EmailError::Validation(_) => StatusCode::BAD_REQUEST,
                EmailError::Function(e) => function_status(e),
                EmailError::AccountNotFound | EmailError::EmailNotFound => StatusCode::NOT_FOUND,
                EmailError::AccountExists(_) => StatusCode::CONFLICT,
            },
            ApiError::Notification(NotificationError::NotFound) => StatusCode::NOT_FOUND,
            ApiError::Profile(e) => match e {
                ProfileError::Store(e) => store_status(e),
                ProfileError::Validation(_) => StatusCode::BAD_REQUEST,
            },
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::Deployment(e) => match e {
                DeploymentError::Config(ConfigError::ValidationError(_)) => StatusCode::BAD_REQUEST,
                DeploymentError::Store(e) => store_status(e),
                DeploymentError::Function(e) => function_status(e),
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Store(e) => store_status(e),
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %message, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %message, "Request rejected");
        }

        (status, Json(ApiResponse::<()>::error(&message))).into_response()
    }
}
