//! Runtime settings.
//!
//! These types are the validated, immutable configuration handed to the
//! components at startup. Loading and parsing the config file is handled
//! by the server crate.

mod alert;
mod analyzer;
mod info;
mod notifications;

pub use alert::AlertSettings;
pub use analyzer::AnalyzerSettings;
pub use info::InfoSettings;
pub use notifications::NotificationSettings;

/// All runtime settings, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Alert source polling and the region to watch.
    pub alert: AlertSettings,
    /// Info source polling.
    pub info: InfoSettings,
    /// Classifier prompt, model and context window.
    pub analyzer: AnalyzerSettings,
    /// Push delivery.
    pub notifications: NotificationSettings,
}
