use std::{path::PathBuf, time::Duration};

use db::RestStoreConfig;
use secrecy::SecretString;
use thiserror::Error;

mod versions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Missing environment variable {0}")]
    MissingEnv(&'static str),
}

pub type Config = versions::v2::Config;
pub type NotificationConfig = versions::v2::NotificationConfig;
pub type CalendarConfig = versions::v2::CalendarConfig;
pub type ThemeMode = versions::v2::ThemeMode;
pub type WeekStart = versions::v2::WeekStart;

/// Will always return config, trying old schemas or eventually returning default
pub async fn load_config_from_file(config_path: &PathBuf) -> Config {
    match std::fs::read_to_string(config_path) {
        Ok(raw_config) => Config::from(raw_config),
        Err(_) => {
            tracing::info!("No config file found, creating one");
            Config::default()
        }
    }
}

/// Saves the config to the given path
pub async fn save_config_to_file(
    config: &Config,
    config_path: &PathBuf,
) -> Result<(), ConfigError> {
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let raw_config = serde_json::to_string_pretty(config)?;
    std::fs::write(config_path, raw_config)?;
    Ok(())
}

/// Reject preferences the server cannot run with.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.calendar.reminder_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "reminder_interval_secs must be at least 1".to_string(),
        ));
    }
    Ok(())
}

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Where records are persisted.
#[derive(Debug, Clone)]
pub enum BackendKind {
    /// The managed backend's REST interface
    Rest(RestStoreConfig),
    /// In-process tables, lost on restart
    Memory,
}

/// Connection to the managed backend, read from the environment.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Secret the backend signs access tokens with
    pub jwt_secret: SecretString,
}

impl BackendConfig {
    /// Reads `WD_BACKEND`, `WD_BACKEND_URL`, `WD_SERVICE_KEY`, `WD_JWT_SECRET`
    /// and `WD_REQUEST_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingEnv(key))
        };

        let jwt_secret = SecretString::from(required("WD_JWT_SECRET")?);
        let backend = lookup("WD_BACKEND").unwrap_or_else(|| "rest".to_string());

        let kind = match backend.trim().to_ascii_lowercase().as_str() {
            "memory" => BackendKind::Memory,
            "rest" => {
                let timeout_secs = match lookup("WD_REQUEST_TIMEOUT_SECS") {
                    Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                        ConfigError::ValidationError(format!(
                            "WD_REQUEST_TIMEOUT_SECS must be a number of seconds, got '{raw}'"
                        ))
                    })?,
                    None => DEFAULT_REQUEST_TIMEOUT_SECS,
                };
                BackendKind::Rest(RestStoreConfig {
                    base_url: required("WD_BACKEND_URL")?,
                    service_key: SecretString::from(required("WD_SERVICE_KEY")?),
                    timeout: Duration::from_secs(timeout_secs),
                })
            }
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "WD_BACKEND must be 'rest' or 'memory', got '{other}'"
                )));
            }
        };

        Ok(Self { kind, jwt_secret })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tempfile::TempDir;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_rest_backend_requires_url_and_key() {
        let err = BackendConfig::from_lookup(env(&[("WD_JWT_SECRET", "s")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv("WD_BACKEND_URL")));

        let config = BackendConfig::from_lookup(env(&[
            ("WD_JWT_SECRET", "s"),
            ("WD_BACKEND_URL", "https://abc.example"),
            ("WD_SERVICE_KEY", "key"),
            ("WD_REQUEST_TIMEOUT_SECS", "3"),
        ]))
        .unwrap();
        match config.kind {
            BackendKind::Rest(rest) => {
                assert_eq!(rest.base_url, "https://abc.example");
                assert_eq!(rest.timeout, Duration::from_secs(3));
            }
            BackendKind::Memory => panic!("expected rest backend"),
        }
    }

    #[test]
    fn test_memory_backend_and_bad_kind() {
        let config =
            BackendConfig::from_lookup(env(&[("WD_JWT_SECRET", "s"), ("WD_BACKEND", "Memory")]))
                .unwrap();
        assert!(matches!(config.kind, BackendKind::Memory));

        let err =
            BackendConfig::from_lookup(env(&[("WD_JWT_SECRET", "s"), ("WD_BACKEND", "sqlite")]))
                .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));

        let err = BackendConfig::from_lookup(env(&[("WD_BACKEND", "memory")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv("WD_JWT_SECRET")));
    }

    #[test]
    fn test_v1_config_is_upgraded() {
        let raw = r#"{"config_version":"v1","theme":"dark","notifications":{"sound_enabled":false,"reminders_enabled":true}}"#;
        let config = Config::from(raw.to_string());
        assert_eq!(config.config_version, "v2");
        assert_eq!(config.theme, ThemeMode::Dark);
        assert!(!config.notifications.sound_enabled);
        assert_eq!(config.calendar, CalendarConfig::default());
    }

    #[test]
    fn test_garbage_config_falls_back_to_default() {
        let config = Config::from("not json".to_string());
        assert_eq!(config, Config::default());
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        assert_eq!(load_config_from_file(&path).await, Config::default());

        let mut config = Config::default();
        config.calendar.reminder_interval_secs = 5;
        config.calendar.week_starts_on = WeekStart::Sunday;
        save_config_to_file(&config, &path).await.unwrap();

        assert_eq!(load_config_from_file(&path).await, config);
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let mut config = Config::default();
        config.calendar.reminder_interval_secs = 0;
        assert!(validate_config(&config).is_err());
    }
}
