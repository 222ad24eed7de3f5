use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct NotificationSettings {
    pub enabled: bool,
    pub credentials_path: PathBuf,
    /// Device tokens registered longer ago than this are purged.
    pub token_max_age: time::Duration,
}
