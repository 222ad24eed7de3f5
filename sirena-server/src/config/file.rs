//! TOML file configuration structures.
//!
//! These structs directly map to the `config.toml` file format.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub alert: AlertConfig,
    #[serde(default)]
    pub info: InfoConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    /// Log filter used when neither `RUST_LOG` nor `--log-level` is given.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Alert source section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Channel whose posts drive region alert state.
    pub channel: String,
    #[serde(default = "default_polling_interval_secs")]
    pub polling_interval_secs: u64,
    /// Polling interval while the monitored region is alerted.
    #[serde(default = "default_backoff_polling_interval_secs")]
    pub backoff_polling_interval_secs: u64,
    #[serde(default = "default_region_to_monitor")]
    pub region_to_monitor: u32,
}

/// Info sources section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoConfig {
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default = "default_polling_interval_secs")]
    pub polling_interval_secs: u64,
    #[serde(default = "default_fetch_pacing_millis")]
    pub fetch_pacing_millis: u64,
    /// Phrases removed from post text, e.g. channel signatures.
    #[serde(default)]
    pub stop_list: Vec<String>,
    #[serde(default = "default_rewind_minutes")]
    pub rewind_minutes: i64,
}

impl Default for InfoConfig {
    fn default() -> Self {
        Self {
            channels: Vec::new(),
            polling_interval_secs: default_polling_interval_secs(),
            fetch_pacing_millis: default_fetch_pacing_millis(),
            stop_list: Vec::new(),
            rewind_minutes: default_rewind_minutes(),
        }
    }
}

/// Classifier section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default)]
    pub prompt: String,
    /// IANA timezone name used for message times.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_window_size")]
    pub window_size: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            timezone: default_timezone(),
            model: default_model(),
            api_base: default_api_base(),
            window_size: default_window_size(),
        }
    }
}

/// Push notification section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Path to the Firebase service-account JSON key.
    #[serde(default = "default_credentials_path")]
    pub firebase_credentials_path: PathBuf,
    #[serde(default = "default_token_max_age_days")]
    pub token_max_age_days: i64,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            firebase_credentials_path: default_credentials_path(),
            token_max_age_days: default_token_max_age_days(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_polling_interval_secs() -> u64 {
    5
}

fn default_backoff_polling_interval_secs() -> u64 {
    60
}

fn default_region_to_monitor() -> u32 {
    14
}

fn default_fetch_pacing_millis() -> u64 {
    300
}

fn default_rewind_minutes() -> i64 {
    5
}

fn default_timezone() -> String {
    "Europe/Kyiv".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_window_size() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("/etc/sirena/account.json")
}

fn default_token_max_age_days() -> i64 {
    56
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let toml_str = r#"
[alert]
channel = "air_alert_ua"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.alert.channel, "air_alert_ua");
        assert_eq!(config.alert.polling_interval_secs, 5);
        assert_eq!(config.alert.backoff_polling_interval_secs, 60);
        assert_eq!(config.alert.region_to_monitor, 14);
        assert!(config.info.channels.is_empty());
        assert_eq!(config.info.fetch_pacing_millis, 300);
        assert_eq!(config.info.rewind_minutes, 5);
        assert_eq!(config.analyzer.timezone, "Europe/Kyiv");
        assert_eq!(config.analyzer.model, "gpt-3.5-turbo");
        assert_eq!(config.analyzer.window_size, 10);
        assert!(config.notifications.enabled);
        assert_eq!(
            config.notifications.firebase_credentials_path,
            PathBuf::from("/etc/sirena/account.json")
        );
        assert_eq!(config.notifications.token_max_age_days, 56);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
log_level = "debug"

[alert]
channel = "air_alert_ua"
polling_interval_secs = 3
backoff_polling_interval_secs = 30
region_to_monitor = 25

[info]
channels = ["news_one", "news_two"]
polling_interval_secs = 10
stop_list = ["Subscribe to our channel"]

[analyzer]
prompt = "Answer with JSON."
timezone = "UTC"

[notifications]
enabled = false
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.alert.region_to_monitor, 25);
        assert_eq!(config.info.channels, vec!["news_one", "news_two"]);
        assert_eq!(config.info.polling_interval_secs, 10);
        assert_eq!(config.info.stop_list.len(), 1);
        assert_eq!(config.analyzer.prompt, "Answer with JSON.");
        assert_eq!(config.analyzer.timezone, "UTC");
        assert!(!config.notifications.enabled);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_alert_channel_is_required() {
        assert!(toml::from_str::<FileConfig>("[info]\nchannels = []\n").is_err());
    }
}
