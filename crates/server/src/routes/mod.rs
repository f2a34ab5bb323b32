use axum::{
    Router,
    http::{Method, header},
    middleware::from_fn_with_state,
    routing::get,
};
use tower_http::cors::{Any, CorsLayer};

use crate::{DeploymentImpl, middleware::require_user};

pub mod columns;
pub mod config;
pub mod email;
pub mod events;
pub mod health;
pub mod notifications;
pub mod profile;
pub mod projects;
pub mod tasks;

pub fn router(deployment: DeploymentImpl) -> Router {
    // Everything except these two needs a signed-in user
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/email/providers", get(email::get_providers));

    let user_routes = Router::new()
        .merge(config::router())
        .merge(projects::router(&deployment))
        .merge(columns::router(&deployment))
        .merge(tasks::router(&deployment))
        .merge(events::router(&deployment))
        .merge(notifications::router())
        .merge(email::router(&deployment))
        .merge(profile::router())
        .layer(from_fn_with_state(deployment.clone(), require_user));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .nest("/api", public_routes.merge(user_routes).with_state(deployment))
        .layer(cors)
}
