//! AlertMonitor processor.
//!
//! The AlertMonitor is responsible for:
//! - Polling the alert source channel for posts newer than the last check
//! - Classifying posts as raise / lower by marker phrases
//! - Tracking the alert state of every known region
//! - Emitting `Alert` / `Clear` when the monitored region changes state
//!
//! Polling is fast while the monitored region is clear and backs off while
//! it is alerted.

use crate::config::AlertSettings;
use crate::entities::{RegionId, RegionTable};
use crate::events::{Event, Publisher};
use crate::sources::ContentSource;
use crate::utils::polling_interval::alert_polling_interval;
use sirena_sdk::objects::Post;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

const RAISE_MARKER: &str = "Повітряна тривога";
const LOWER_MARKER: &str = "Відбій";

/// Direction of an alert-source post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertSignal {
    Raise,
    Lower,
}

impl AlertSignal {
    /// Classify a post by its marker phrase. Raise wins when both occur.
    pub fn classify(text: &str) -> Option<Self> {
        if text.contains(RAISE_MARKER) {
            Some(AlertSignal::Raise)
        } else if text.contains(LOWER_MARKER) {
            Some(AlertSignal::Lower)
        } else {
            None
        }
    }

    pub fn is_raise(self) -> bool {
        matches!(self, AlertSignal::Raise)
    }
}

/// AlertMonitor polls the alert source and owns all region state.
pub struct AlertMonitor {
    source: Arc<dyn ContentSource>,
    publisher: Publisher,
    channel: String,
    regions: RegionTable,
    monitored_region: RegionId,
    last_checked: Option<OffsetDateTime>,
    alerted: bool,
    polling_interval: Duration,
    backoff_interval: Duration,
}

impl AlertMonitor {
    /// Create a new AlertMonitor.
    ///
    /// # Arguments
    ///
    /// * `settings` - Alert source channel, intervals and monitored region
    /// * `source` - Content source to poll
    /// * `publisher` - Bus handle for `Alert` / `Clear` events
    pub fn new(
        settings: &AlertSettings,
        source: Arc<dyn ContentSource>,
        publisher: Publisher,
    ) -> Self {
        Self {
            source,
            publisher,
            channel: settings.channel.clone(),
            regions: RegionTable::ukraine(),
            monitored_region: settings.region_to_monitor,
            last_checked: None,
            alerted: false,
            polling_interval: settings.polling_interval,
            backoff_interval: settings.backoff_interval,
        }
    }

    /// Run the AlertMonitor until shutdown is signaled.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            channel = %self.channel,
            region = self.monitored_region,
            "AlertMonitor started"
        );

        loop {
            self.poll().await;

            let interval = self.next_interval();
            debug!(alerted = self.alerted, ?interval, "Sleeping until next alert poll");

            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("AlertMonitor received shutdown signal");
                        break;
                    }
                }

                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!("AlertMonitor shutdown complete");
    }

    /// Fetch new posts once and publish any resulting events.
    ///
    /// On fetch failure the cursor is left where it was.
    pub async fn poll(&mut self) {
        let posts = match self.source.fetch(&self.channel, self.last_checked, &[]).await {
            Ok(posts) => posts,
            Err(e) => {
                error!(channel = %self.channel, error = %e, "Failed to fetch alert source");
                return;
            }
        };

        let now = OffsetDateTime::now_utc();
        self.last_checked = Some(self.last_checked.map_or(now, |prev| prev.max(now)));

        for post in &posts {
            let Some(event) = self.apply_post(post) else {
                continue;
            };
            if let Err(e) = self.publisher.publish(event) {
                warn!(error = %e, "Failed to publish alert state change");
            }
        }
    }

    /// Apply one post to the region table.
    ///
    /// Returns the event to publish, if the post flipped the monitored
    /// region. Posts that restate the current state change nothing.
    pub fn apply_post(&mut self, post: &Post) -> Option<Event> {
        let signal = AlertSignal::classify(&post.text)?;
        let active = signal.is_raise();

        let Some(region) = self.regions.first_match_mut(&post.text) else {
            debug!(post = %post.id, "Alert post names no known region");
            return None;
        };

        if region.alert_active == active {
            debug!(region = region.id, alert = active, "Region state unchanged");
            return None;
        }

        region.alert_active = active;
        region.last_changed = Some(post.timestamp);
        info!(
            region = region.id,
            name = %region.display_name,
            alert = active,
            at = %post.timestamp,
            "Region alert state changed"
        );

        if region.id != self.monitored_region {
            return None;
        }

        self.alerted = active;
        let snapshot = region.clone();
        Some(if active {
            Event::Alert(snapshot)
        } else {
            Event::Clear(snapshot)
        })
    }

    /// Interval to sleep before the next poll.
    pub fn next_interval(&self) -> Duration {
        alert_polling_interval(self.alerted, self.polling_interval, self.backoff_interval)
    }

    pub fn is_alerted(&self) -> bool {
        self.alerted
    }

    pub fn last_checked(&self) -> Option<OffsetDateTime> {
        self.last_checked
    }

    pub fn regions(&self) -> &RegionTable {
        &self.regions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::sources::FetchError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use time::macros::datetime;

    /// Returns queued responses in order, then empty pages.
    #[derive(Default)]
    struct ScriptedSource {
        responses: Mutex<Vec<Result<Vec<Post>, FetchError>>>,
        cursors: Mutex<Vec<Option<OffsetDateTime>>>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<Vec<Post>, FetchError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into_iter().rev().collect()),
                cursors: Mutex::default(),
            })
        }
    }

    #[async_trait]
    impl ContentSource for ScriptedSource {
        async fn fetch(
            &self,
            _channel: &str,
            newer_than: Option<OffsetDateTime>,
            _stop_list: &[String],
        ) -> Result<Vec<Post>, FetchError> {
            self.cursors.lock().unwrap().push(newer_than);
            self.responses.lock().unwrap().pop().unwrap_or(Ok(Vec::new()))
        }
    }

    fn settings() -> AlertSettings {
        AlertSettings {
            channel: "air_alert_ua".to_string(),
            polling_interval: Duration::from_secs(5),
            backoff_interval: Duration::from_secs(60),
            region_to_monitor: 14,
        }
    }

    fn post(text: &str, at: OffsetDateTime) -> Post {
        Post::new("air_alert_ua/1", "Alerts", text, at)
    }

    fn monitor(source: Arc<ScriptedSource>) -> (AlertMonitor, EventBus) {
        let bus = EventBus::new();
        let monitor = AlertMonitor::new(&settings(), source, bus.publisher());
        (monitor, bus)
    }

    #[test]
    fn test_classify_markers() {
        assert_eq!(
            AlertSignal::classify("🔴 Повітряна тривога в Одеська область"),
            Some(AlertSignal::Raise)
        );
        assert_eq!(
            AlertSignal::classify("🟢 Відбій тривоги в Одеська область"),
            Some(AlertSignal::Lower)
        );
        assert_eq!(AlertSignal::classify("Загроза застосування БпЛА"), None);
    }

    #[test]
    fn test_raise_on_monitored_region_emits_alert() {
        let (mut monitor, _bus) = monitor(ScriptedSource::new(vec![]));
        let at = datetime!(2024-03-01 10:00 UTC);

        let event = monitor
            .apply_post(&post("Повітряна тривога Одеська область", at))
            .unwrap();
        let Event::Alert(region) = event else {
            panic!("expected alert event");
        };
        assert_eq!(region.id, 14);
        assert!(region.alert_active);
        assert_eq!(region.last_changed, Some(at));
        assert!(monitor.is_alerted());
        assert_eq!(monitor.next_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_repeated_raise_is_edge_triggered() {
        let (mut monitor, _bus) = monitor(ScriptedSource::new(vec![]));
        let t1 = datetime!(2024-03-01 10:00 UTC);
        let t2 = datetime!(2024-03-01 10:10 UTC);

        assert!(monitor.apply_post(&post("Повітряна тривога Одеська область", t1)).is_some());
        assert!(monitor.apply_post(&post("Повітряна тривога Одеська область", t2)).is_none());
        assert_eq!(monitor.regions().get(14).unwrap().last_changed, Some(t1));

        let cleared = monitor.apply_post(&post("Відбій тривоги Одеська область", t2));
        assert!(matches!(cleared, Some(Event::Clear(ref r)) if !r.alert_active));
        assert!(!monitor.is_alerted());
        assert_eq!(monitor.next_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_other_regions_tracked_without_events() {
        let (mut monitor, _bus) = monitor(ScriptedSource::new(vec![]));
        let at = datetime!(2024-03-01 10:00 UTC);

        assert!(monitor.apply_post(&post("Повітряна тривога Харківська область", at)).is_none());
        let kharkiv = monitor.regions().get(19).unwrap();
        assert!(kharkiv.alert_active);
        assert_eq!(kharkiv.last_changed, Some(at));
        assert!(!monitor.is_alerted());
    }

    #[test]
    fn test_first_named_region_wins_per_post() {
        // Mykolaiv precedes Odesa in table order, so the monitored region
        // is not touched by this post.
        let (mut monitor, _bus) = monitor(ScriptedSource::new(vec![]));
        let at = datetime!(2024-03-01 10:00 UTC);

        let event = monitor.apply_post(&post(
            "Повітряна тривога Одеська область, Миколаївська область",
            at,
        ));
        assert!(event.is_none());
        assert!(monitor.regions().get(13).unwrap().alert_active);
        assert!(!monitor.regions().get(14).unwrap().alert_active);
    }

    #[test]
    fn test_lower_for_clear_region_is_ignored() {
        let (mut monitor, _bus) = monitor(ScriptedSource::new(vec![]));
        let at = datetime!(2024-03-01 10:00 UTC);
        assert!(monitor.apply_post(&post("Відбій тривоги Одеська область", at)).is_none());
        assert!(monitor.regions().get(14).unwrap().last_changed.is_none());
    }

    #[tokio::test]
    async fn test_poll_publishes_and_advances_cursor() {
        let at = datetime!(2024-03-01 10:00 UTC);
        let source = ScriptedSource::new(vec![Ok(vec![post("Повітряна тривога Одеська область", at)])]);
        let (mut monitor, bus) = monitor(Arc::clone(&source));

        monitor.poll().await;
        let first_cursor = monitor.last_checked().unwrap();
        monitor.poll().await;

        assert!(monitor.is_alerted());
        assert!(monitor.last_checked().unwrap() >= first_cursor);
        assert_eq!(*source.cursors.lock().unwrap(), vec![None, Some(first_cursor)]);
        drop(bus);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_cursor() {
        let source = ScriptedSource::new(vec![
            Ok(vec![]),
            Err(FetchError::UnknownChannel("air_alert_ua".to_string())),
        ]);
        let (mut monitor, _bus) = monitor(Arc::clone(&source));

        monitor.poll().await;
        let cursor = monitor.last_checked();
        monitor.poll().await;
        assert_eq!(monitor.last_checked(), cursor);
        monitor.poll().await;
        assert_eq!(source.cursors.lock().unwrap()[2], cursor);
    }
}
