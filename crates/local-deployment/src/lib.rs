use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use db::{DBService, MemoryStore};
use deployment::{Deployment, DeploymentError};
use secrecy::SecretString;
use services::services::{
    auth::AuthService,
    board::BoardService,
    calendar::CalendarService,
    config::{
        BackendConfig, BackendKind, Config, load_config_from_file, save_config_to_file,
        validate_config,
    },
    email::{EmailService, functions::FunctionsClient},
    notification::NotificationCenter,
    profile::ProfileService,
    reminders::ReminderSweeper,
};
use tokio::{sync::RwLock, task::JoinHandle};
use utils::assets::config_path;

#[derive(Clone)]
pub struct LocalDeployment {
    config: Arc<RwLock<Config>>,
    config_path: Option<PathBuf>,
    db: DBService,
    auth: AuthService,
    board: BoardService,
    calendar: CalendarService,
    email: EmailService,
    notifications: NotificationCenter,
    profile: ProfileService,
    reminder_sweeper: Arc<JoinHandle<()>>,
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new() -> Result<Self, DeploymentError> {
        let backend = BackendConfig::from_env()?;
        let path = config_path();

        let raw_config = load_config_from_file(&path).await;
        let raw_config = match validate_config(&raw_config) {
            Ok(()) => raw_config,
            Err(e) => {
                tracing::warn!(error = %e, "Stored preferences are invalid, using defaults");
                Config::default()
            }
        };
        // Always save config (may have been migrated)
        save_config_to_file(&raw_config, &path).await?;

        let (db, functions) = match &backend.kind {
            BackendKind::Rest(rest) => {
                tracing::info!(base_url = %rest.base_url, "Using managed backend");
                (
                    DBService::rest(rest.clone())?,
                    FunctionsClient::new(rest.base_url.clone(), rest.service_key.clone())?,
                )
            }
            BackendKind::Memory => {
                tracing::warn!("WD_BACKEND=memory; records are lost on restart and mail is disabled");
                (DBService::memory(MemoryStore::new()), FunctionsClient::disabled())
            }
        };

        if !db.is_healthy().await {
            tracing::warn!("Backend health check failed; requests will be retried as they arrive");
        }

        Ok(Self::assemble(
            db,
            functions,
            backend.jwt_secret,
            raw_config,
            Some(path),
        ))
    }

    fn config(&self) -> &Arc<RwLock<Config>> {
        &self.config
    }

    fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    fn db(&self) -> &DBService {
        &self.db
    }

    fn auth(&self) -> &AuthService {
        &self.auth
    }

    fn board(&self) -> &BoardService {
        &self.board
    }

    fn calendar(&self) -> &CalendarService {
        &self.calendar
    }

    fn email(&self) -> &EmailService {
        &self.email
    }

    fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    fn profile(&self) -> &ProfileService {
        &self.profile
    }
}

impl LocalDeployment {
    /// In-memory deployment with default preferences that are never written
    /// to disk. Mail functions are disabled.
    pub fn with_store(store: MemoryStore, jwt_secret: SecretString) -> Self {
        Self::assemble(
            DBService::memory(store),
            FunctionsClient::disabled(),
            jwt_secret,
            Config::default(),
            None,
        )
    }

    /// Like [`LocalDeployment::with_store`] but talking to real mail functions.
    pub fn with_functions(
        store: MemoryStore,
        functions: FunctionsClient,
        jwt_secret: SecretString,
    ) -> Self {
        Self::assemble(
            DBService::memory(store),
            functions,
            jwt_secret,
            Config::default(),
            None,
        )
    }

    fn assemble(
        db: DBService,
        functions: FunctionsClient,
        jwt_secret: SecretString,
        config: Config,
        config_path: Option<PathBuf>,
    ) -> Self {
        let config = Arc::new(RwLock::new(config));
        let notifications = NotificationCenter::new();
        let calendar = CalendarService::new(db.clone());

        let reminder_sweeper =
            ReminderSweeper::new(calendar.clone(), notifications.clone(), config.clone()).spawn();

        Self {
            config,
            config_path,
            auth: AuthService::new(jwt_secret),
            board: BoardService::new(db.clone(), notifications.clone()),
            calendar,
            email: EmailService::new(db.clone(), functions),
            profile: ProfileService::new(db.clone()),
            notifications,
            db,
            reminder_sweeper: Arc::new(reminder_sweeper),
        }
    }

    /// Stop background work. Called once on shutdown.
    pub fn shutdown(&self) {
        self.reminder_sweeper.abort();
    }
}
