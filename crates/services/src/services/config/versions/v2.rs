use anyhow::Error;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
pub use v1::{NotificationConfig, ThemeMode};

use crate::services::config::versions::v1;

fn default_reminder_interval_secs() -> u64 {
    30
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, TS, PartialEq, Eq, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum WeekStart {
    #[default]
    Monday,
    Sunday,
}

#[derive(Clone, Debug, Serialize, Deserialize, TS, PartialEq)]
pub struct CalendarConfig {
    #[serde(default)]
    pub week_starts_on: WeekStart,
    /// How often due reminders are checked
    #[serde(default = "default_reminder_interval_secs")]
    pub reminder_interval_secs: u64,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            week_starts_on: WeekStart::default(),
            reminder_interval_secs: default_reminder_interval_secs(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, TS, PartialEq)]
pub struct Config {
    pub config_version: String,
    pub theme: ThemeMode,
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
}

impl Config {
    fn from_v1_config(old_config: v1::Config) -> Self {
        Self {
            config_version: "v2".to_string(),
            theme: old_config.theme,
            notifications: old_config.notifications,
            calendar: CalendarConfig::default(),
        }
    }

    pub fn from_previous_version(raw_config: &str) -> Result<Self, Error> {
        let old_config = v1::Config::from(raw_config.to_string());
        Ok(Self::from_v1_config(old_config))
    }
}

impl From<String> for Config {
    fn from(raw_config: String) -> Self {
        if let Ok(config) = serde_json::from_str::<Config>(&raw_config)
            && config.config_version == "v2"
        {
            return config;
        }

        match Self::from_previous_version(&raw_config) {
            Ok(config) => {
                tracing::info!("Config upgraded to v2");
                config
            }
            Err(e) => {
                tracing::warn!("Config migration failed: {}, using default", e);
                Self::default()
            }
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: "v2".to_string(),
            theme: ThemeMode::System,
            notifications: NotificationConfig::default(),
            calendar: CalendarConfig::default(),
        }
    }
}
