use std::time::Duration;

#[derive(Debug, Clone)]
pub struct InfoSettings {
    pub channels: Vec<String>,
    pub polling_interval: Duration,
    /// Delay between two channel fetches of the same cycle.
    pub fetch_pacing: Duration,
    /// Phrases removed from fetched post text.
    pub stop_list: Vec<String>,
    /// How far before the alert the channel cursors are rewound.
    pub rewind: time::Duration,
}
