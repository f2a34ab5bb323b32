use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, TS, PartialEq, Eq, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ThemeMode {
    Light,
    Dark,
    System,
}

#[derive(Clone, Debug, Serialize, Deserialize, TS, PartialEq)]
pub struct NotificationConfig {
    pub sound_enabled: bool,
    pub reminders_enabled: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            reminders_enabled: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub config_version: String,
    pub theme: ThemeMode,
    pub notifications: NotificationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: "v1".to_string(),
            theme: ThemeMode::System,
            notifications: NotificationConfig::default(),
        }
    }
}

impl From<String> for Config {
    fn from(raw_config: String) -> Self {
        match serde_json::from_str::<Config>(&raw_config) {
            Ok(config) if config.config_version == "v1" => config,
            _ => {
                tracing::warn!("Unrecognised v1 config, using default");
                Self::default()
            }
        }
    }
}
