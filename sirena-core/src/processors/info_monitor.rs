//! InfoMonitor processor.
//!
//! The InfoMonitor is responsible for:
//! - Staying idle until the monitored region goes into alert
//! - Rewinding every info channel cursor to just before the alert started
//! - Polling the info channels while the alert lasts
//! - Emitting one time-sorted `NewMessages` batch per polling cycle
//!
//! `Alert` / `Clear` reach the monitor through [`InfoMonitorHandle`], which
//! only flips a `watch` channel. The cursors themselves never leave the
//! monitor's own task.

use crate::config::InfoSettings;
use crate::entities::Region;
use crate::events::{Event, EventBus, HandlerError, PostBatch, Publisher, handler_fn, topics};
use crate::sources::ContentSource;
use crate::utils::polling_interval::rewind_cursor;
use sirena_sdk::objects::Post;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Activation signal shared between the handle and the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Activation {
    active: bool,
    /// Cursor position requested by the latest `Alert`.
    rewind_to: Option<OffsetDateTime>,
    /// Bumped on every `Alert`, so each one rewinds exactly once.
    generation: u64,
}

/// Bus-facing side of the InfoMonitor.
#[derive(Debug, Clone)]
pub struct InfoMonitorHandle {
    activation: Arc<watch::Sender<Activation>>,
    rewind: time::Duration,
}

impl InfoMonitorHandle {
    /// Start polling and rewind all cursors to `region.last_changed - rewind`.
    pub fn activate(&self, region: &Region) {
        let rewind_to = region
            .last_changed
            .and_then(|changed| rewind_cursor(changed, self.rewind));
        self.activation.send_modify(|activation| {
            activation.active = true;
            activation.rewind_to = rewind_to;
            activation.generation += 1;
        });
        info!(region = region.id, ?rewind_to, "InfoMonitor activated");
    }

    /// Stop polling after the current cycle.
    pub fn deactivate(&self) {
        self.activation.send_modify(|activation| activation.active = false);
        info!("InfoMonitor deactivated");
    }

    pub fn is_active(&self) -> bool {
        self.activation.borrow().active
    }

    /// Register `Alert` / `Clear` handlers on the bus.
    pub fn subscribe(&self, bus: &mut EventBus) {
        let handle = self.clone();
        bus.subscribe::<topics::Alert, _>(handler_fn("info_monitor.alert", move |region: Region| {
            handle.activate(&region);
            async { Ok::<(), HandlerError>(()) }
        }));

        let handle = self.clone();
        bus.subscribe::<topics::Clear, _>(handler_fn("info_monitor.clear", move |_region: Region| {
            handle.deactivate();
            async { Ok::<(), HandlerError>(()) }
        }));
    }
}

/// InfoMonitor polls the info channels while an alert is active.
pub struct InfoMonitor {
    source: Arc<dyn ContentSource>,
    publisher: Publisher,
    /// One cursor per configured channel, in configuration order.
    cursors: Vec<(String, Option<OffsetDateTime>)>,
    stop_list: Vec<String>,
    polling_interval: Duration,
    fetch_pacing: Duration,
    activation_rx: watch::Receiver<Activation>,
    applied_generation: u64,
}

impl InfoMonitor {
    /// Create a new InfoMonitor and the handle that drives its activation.
    pub fn new(
        settings: &InfoSettings,
        source: Arc<dyn ContentSource>,
        publisher: Publisher,
    ) -> (Self, InfoMonitorHandle) {
        let (activation_tx, activation_rx) = watch::channel(Activation::default());
        let monitor = Self {
            source,
            publisher,
            cursors: settings
                .channels
                .iter()
                .map(|channel| (channel.clone(), None))
                .collect(),
            stop_list: settings.stop_list.clone(),
            polling_interval: settings.polling_interval,
            fetch_pacing: settings.fetch_pacing,
            activation_rx,
            applied_generation: 0,
        };
        let handle = InfoMonitorHandle {
            activation: Arc::new(activation_tx),
            rewind: settings.rewind,
        };
        (monitor, handle)
    }

    /// Run the InfoMonitor until shutdown is signaled.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(channels = self.cursors.len(), "InfoMonitor started");

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("InfoMonitor received shutdown signal");
                        break;
                    }
                    continue;
                }

                activated = async {
                    self.activation_rx.wait_for(|a| a.active).await.map(|_| ())
                } => {
                    if activated.is_err() {
                        info!("InfoMonitor handle dropped");
                        break;
                    }
                }
            }

            self.sync_activation();
            self.poll_cycle().await;

            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("InfoMonitor received shutdown signal");
                        break;
                    }
                }

                _ = tokio::time::sleep(self.polling_interval) => {}
            }
        }

        info!("InfoMonitor shutdown complete");
    }

    /// Apply a pending rewind, if an `Alert` arrived since the last call.
    ///
    /// Returns whether the monitor is currently active.
    pub fn sync_activation(&mut self) -> bool {
        let activation = *self.activation_rx.borrow_and_update();
        if activation.generation != self.applied_generation {
            self.applied_generation = activation.generation;
            for (_, cursor) in self.cursors.iter_mut() {
                *cursor = activation.rewind_to;
            }
            debug!(rewind_to = ?activation.rewind_to, "Rewound info channel cursors");
        }
        activation.active
    }

    /// Fetch every channel once and publish the merged, sorted batch.
    ///
    /// Returns the number of posts published.
    pub async fn poll_cycle(&mut self) -> usize {
        let mut collected: Vec<Post> = Vec::new();

        for i in 0..self.cursors.len() {
            if i > 0 && !self.fetch_pacing.is_zero() {
                tokio::time::sleep(self.fetch_pacing).await;
            }

            let (channel, newer_than) = self.cursors[i].clone();
            match self.source.fetch(&channel, newer_than, &self.stop_list).await {
                Ok(posts) => {
                    debug!(channel = %channel, count = posts.len(), "Fetched info channel");
                    self.cursors[i].1 = Some(OffsetDateTime::now_utc());
                    collected.extend(posts);
                }
                Err(e) => {
                    error!(channel = %channel, error = %e, "Failed to fetch info channel");
                }
            }
        }

        if collected.is_empty() {
            return 0;
        }

        // Stable, so equal timestamps keep channel order.
        collected.sort_by_key(|post| post.timestamp);
        let count = collected.len();
        let batch: PostBatch = collected.into();
        if let Err(e) = self.publisher.publish(Event::NewMessages(batch)) {
            warn!(error = %e, "Failed to publish new messages");
            return 0;
        }
        info!(count, "Published new messages");
        count
    }

    pub fn cursor(&self, channel: &str) -> Option<OffsetDateTime> {
        self.cursors
            .iter()
            .find(|(name, _)| name == channel)
            .and_then(|(_, cursor)| *cursor)
    }
}
