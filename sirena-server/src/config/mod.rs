//! Configuration module for sirena-server.
//!
//! Handles loading configuration from the TOML file and the environment,
//! validating it and turning it into the core's runtime settings.

pub mod file;

use crate::config::file::FileConfig;
use sirena_core::config::{
    AlertSettings, AnalyzerSettings, InfoSettings, NotificationSettings, Settings,
};
use sirena_core::entities::RegionTable;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("OPENAI_API_KEY environment variable not set")]
    MissingApiKey,
}

/// Loaded configuration: runtime settings plus the configured log filter.
pub struct LoadedConfig {
    pub settings: Settings,
    pub log_level: String,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
        }
    }

    /// Read, validate and convert the configuration file.
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        Self::parse(&config_content)
    }

    /// Same as [`load`](Self::load) for an in-memory document.
    pub fn parse(content: &str) -> Result<LoadedConfig, ConfigError> {
        let file_config: FileConfig = toml::from_str(content)?;
        validate(&file_config)?;
        build_loaded_config(file_config)
    }
}

/// One day.
const MAX_REWIND_MINUTES: i64 = 24 * 60;
/// Ten years.
const MAX_TOKEN_MAX_AGE_DAYS: i64 = 3650;

fn validation(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    if config.alert.channel.trim().is_empty() {
        return Err(validation("alert.channel must not be empty"));
    }
    if config.alert.polling_interval_secs == 0 || config.alert.backoff_polling_interval_secs == 0 {
        return Err(validation("alert polling intervals must be positive"));
    }
    if !RegionTable::ukraine().contains(config.alert.region_to_monitor) {
        return Err(validation(format!(
            "unknown region id {}",
            config.alert.region_to_monitor
        )));
    }
    if config.info.polling_interval_secs == 0 {
        return Err(validation("info.polling_interval_secs must be positive"));
    }
    if !(0..=MAX_REWIND_MINUTES).contains(&config.info.rewind_minutes) {
        return Err(validation(format!(
            "info.rewind_minutes must be between 0 and {MAX_REWIND_MINUTES}"
        )));
    }
    if config.info.channels.iter().any(|c| c.trim().is_empty()) {
        return Err(validation("info.channels must not contain empty names"));
    }
    if config.analyzer.window_size == 0 {
        return Err(validation("analyzer.window_size must be positive"));
    }
    if !(1..=MAX_TOKEN_MAX_AGE_DAYS).contains(&config.notifications.token_max_age_days) {
        return Err(validation(format!(
            "notifications.token_max_age_days must be between 1 and {MAX_TOKEN_MAX_AGE_DAYS}"
        )));
    }
    Ok(())
}

fn build_loaded_config(file_config: FileConfig) -> Result<LoadedConfig, ConfigError> {
    let FileConfig {
        alert,
        info,
        analyzer,
        notifications,
        log_level,
    } = file_config;

    let timezone = time_tz::timezones::get_by_name(&analyzer.timezone)
        .ok_or_else(|| validation(format!("unknown timezone {}", analyzer.timezone)))?;
    let api_base = Url::parse(&analyzer.api_base)
        .map_err(|e| validation(format!("invalid analyzer.api_base: {e}")))?;

    let settings = Settings {
        alert: AlertSettings {
            channel: alert.channel,
            polling_interval: Duration::from_secs(alert.polling_interval_secs),
            backoff_interval: Duration::from_secs(alert.backoff_polling_interval_secs),
            region_to_monitor: alert.region_to_monitor,
        },
        info: InfoSettings {
            channels: info.channels,
            polling_interval: Duration::from_secs(info.polling_interval_secs),
            fetch_pacing: Duration::from_millis(info.fetch_pacing_millis),
            stop_list: info.stop_list,
            rewind: time::Duration::minutes(info.rewind_minutes),
        },
        analyzer: AnalyzerSettings {
            prompt: analyzer.prompt,
            timezone,
            model: analyzer.model,
            api_base,
            window_size: analyzer.window_size,
        },
        notifications: NotificationSettings {
            enabled: notifications.enabled,
            credentials_path: notifications.firebase_credentials_path,
            token_max_age: time::Duration::days(notifications.token_max_age_days),
        },
    };

    Ok(LoadedConfig {
        settings,
        log_level,
    })
}

/// Get the classifier API key from the environment.
pub fn get_openai_api_key() -> Result<String, ConfigError> {
    std::env::var("OPENAI_API_KEY").map_err(|_| ConfigError::MissingApiKey)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<LoadedConfig, ConfigError> {
        ConfigLoader::parse(toml_str)
    }

    #[test]
    fn test_settings_from_minimal_config() {
        let loaded = parse("[alert]\nchannel = \"air_alert_ua\"\n").unwrap();
        let settings = loaded.settings;
        assert_eq!(settings.alert.polling_interval, Duration::from_secs(5));
        assert_eq!(settings.alert.backoff_interval, Duration::from_secs(60));
        assert_eq!(settings.info.fetch_pacing, Duration::from_millis(300));
        assert_eq!(settings.info.rewind, time::Duration::minutes(5));
        assert_eq!(
            settings.analyzer.timezone,
            time_tz::timezones::get_by_name("Europe/Kyiv").unwrap()
        );
        assert_eq!(settings.analyzer.api_base.as_str(), "https://api.openai.com/v1");
        assert_eq!(settings.notifications.token_max_age, time::Duration::weeks(8));
        assert_eq!(loaded.log_level, "info");
    }

    #[test]
    fn test_rejects_empty_channel() {
        let err = parse("[alert]\nchannel = \"  \"\n").err().unwrap();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_rejects_zero_interval() {
        let err = parse("[alert]\nchannel = \"a\"\npolling_interval_secs = 0\n")
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_rejects_unknown_region() {
        let err = parse("[alert]\nchannel = \"a\"\nregion_to_monitor = 26\n")
            .err()
            .unwrap();
        assert!(err.to_string().contains("unknown region id 26"));
    }

    #[test]
    fn test_rejects_unknown_timezone() {
        let err = parse("[alert]\nchannel = \"a\"\n[analyzer]\ntimezone = \"Mars/Olympus\"\n")
            .err()
            .unwrap();
        assert!(err.to_string().contains("unknown timezone"));
    }

    #[test]
    fn test_rejects_empty_window() {
        let err = parse("[alert]\nchannel = \"a\"\n[analyzer]\nwindow_size = 0\n")
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_rejects_out_of_range_durations() {
        for toml_str in [
            "[alert]\nchannel = \"a\"\n[notifications]\ntoken_max_age_days = 10000000\n",
            "[alert]\nchannel = \"a\"\n[notifications]\ntoken_max_age_days = 0\n",
            "[alert]\nchannel = \"a\"\n[info]\nrewind_minutes = 9223372036854775807\n",
            "[alert]\nchannel = \"a\"\n[info]\nrewind_minutes = -1\n",
        ] {
            let err = parse(toml_str).err().unwrap();
            assert!(matches!(err, ConfigError::ValidationError(_)), "{toml_str}");
        }
    }

    #[test]
    fn test_accepts_largest_durations() {
        let loaded = parse(
            "[alert]\nchannel = \"a\"\n[info]\nrewind_minutes = 1440\n[notifications]\ntoken_max_age_days = 3650\n",
        )
        .unwrap();
        assert_eq!(loaded.settings.info.rewind, time::Duration::days(1));
        assert_eq!(
            loaded.settings.notifications.token_max_age,
            time::Duration::days(3650)
        );
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let loader = ConfigLoader::new("/nonexistent/sirena/config.toml");
        assert!(matches!(loader.load(), Err(ConfigError::IoError(_))));
    }
}
