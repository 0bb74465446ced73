use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono_tz::Tz;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct TelegramSettings {
    pub token: String,
    /// Only this user may issue commands when set.
    #[serde(default)]
    pub owner_id: Option<u64>,
}

#[derive(Deserialize, Debug)]
pub struct ReminderSettings {
    /// Used until a timezone is set through the bot.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            check_interval_secs: default_check_interval_secs(),
        }
    }
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_check_interval_secs() -> u64 {
    45
}

#[derive(Deserialize, Debug, Default)]
pub struct StorageSettings {
    /// JSON file holding the reminders. Reminders live in memory only when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug)]
pub struct AppSettings {
    pub telegram: TelegramSettings,
    #[serde(default)]
    pub reminders: ReminderSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

impl AppSettings {
    /// `appsettings` (required), `appsettings.local` and `APP_*` environment variables, later
    /// sources winning. Nested keys use `__`, e.g. `APP_TELEGRAM__TOKEN`.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name("appsettings").required(true))
            .add_source(File::with_name("appsettings.local").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        Self::from_builder(builder)
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        builder.build()?.try_deserialize()
    }

    pub fn default_timezone(&self) -> anyhow::Result<Tz> {
        self.reminders
            .timezone
            .parse::<Tz>()
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("Unknown timezone {}", self.reminders.timezone))
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.reminders.check_interval_secs)
    }
}
