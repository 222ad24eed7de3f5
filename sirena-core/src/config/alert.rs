use crate::entities::RegionId;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AlertSettings {
    pub channel: String,
    pub polling_interval: Duration,
    /// Polling interval while the monitored region is alerted.
    pub backoff_interval: Duration,
    pub region_to_monitor: RegionId,
}
