use axum::{extract::State, response::Json};
use deployment::Deployment;
use serde::Serialize;

use crate::DeploymentImpl;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub git_commit: &'static str,
    pub build_timestamp: &'static str,
    pub backend_ready: bool,
}

pub async fn health_check(State(deployment): State<DeploymentImpl>) -> Json<HealthResponse> {
    let backend_ready = deployment.db().is_healthy().await;

    Json(HealthResponse {
        status: if backend_ready { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        git_commit: option_env!("WD_GIT_COMMIT").unwrap_or("unknown"),
        build_timestamp: option_env!("WD_BUILD_TIMESTAMP").unwrap_or("unknown"),
        backend_ready,
    })
}
