use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use db::{DBService, StoreError};
use services::services::{
    auth::AuthService,
    board::BoardService,
    calendar::CalendarService,
    config::{Config, ConfigError, save_config_to_file, validate_config},
    email::{EmailService, functions::FunctionError},
    notification::NotificationCenter,
    profile::ProfileService,
};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Function(#[from] FunctionError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Everything a request handler needs, wired together once at startup.
#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new() -> Result<Self, DeploymentError>;

    fn config(&self) -> &Arc<RwLock<Config>>;

    /// Where preferences are persisted; `None` keeps them in memory only.
    fn config_path(&self) -> Option<&Path>;

    fn db(&self) -> &DBService;

    fn auth(&self) -> &AuthService;

    fn board(&self) -> &BoardService;

    fn calendar(&self) -> &CalendarService;

    fn email(&self) -> &EmailService;

    fn notifications(&self) -> &NotificationCenter;

    fn profile(&self) -> &ProfileService;

    /// Validate, persist, then swap in new preferences.
    async fn update_config(&self, new_config: Config) -> Result<Config, DeploymentError> {
        validate_config(&new_config)?;
        if let Some(path) = self.config_path() {
            save_config_to_file(&new_config, &path.to_path_buf()).await?;
        }
        let mut config = self.config().write().await;
        *config = new_config;
        tracing::info!("Preferences updated");
        Ok(config.clone())
    }
}
