use time_tz::Tz;
use url::Url;

#[derive(Debug, Clone)]
pub struct AnalyzerSettings {
    /// System prompt sent with every classification request.
    pub prompt: String,
    /// Timezone used for the local times in the classifier context.
    pub timezone: &'static Tz,
    pub model: String,
    pub api_base: Url,
    /// Capacity of the rolling context window.
    pub window_size: usize,
}
