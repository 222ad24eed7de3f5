//! NotificationSender processor.
//!
//! The NotificationSender is responsible for:
//! - Receiving `AiAlert` verdicts from its queue
//! - Listing the active device tokens from the sink
//! - Dispatching the push in batches of at most [`BATCH_SIZE`] tokens
//! - Logging per-token failures without aborting later batches

use crate::events::{EventBus, HandlerError, handler_fn, topics};
use async_trait::async_trait;
use sirena_sdk::client::ClientError;
use sirena_sdk::objects::AnalysisVerdict;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Maximum number of tokens per `send_batch` call.
pub const BATCH_SIZE: usize = 500;

/// Errors that can occur during push delivery.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Token store or push service error
    #[error("push service error: {0}")]
    Client(#[from] ClientError),

    /// Sink refused the request
    #[error("push sink unavailable: {0}")]
    Unavailable(String),
}

/// The external push service plus its token store.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Tokens of all devices that should receive pushes. Expired tokens
    /// are the sink's concern and are never returned.
    async fn list_active_tokens(&self) -> Result<Vec<String>, SinkError>;

    /// Push `verdict` to `tokens`. The result at index `i` belongs to
    /// `tokens[i]`; an outer error fails the whole batch.
    async fn send_batch(
        &self,
        tokens: &[String],
        verdict: &AnalysisVerdict,
    ) -> Result<Vec<Result<(), SinkError>>, SinkError>;
}

/// Outcome of one delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub tokens: usize,
    pub delivered: usize,
    pub failed: usize,
    pub failed_batches: usize,
}

/// Bus-facing side of the NotificationSender.
#[derive(Debug, Clone)]
pub struct NotificationSenderHandle {
    tx: mpsc::UnboundedSender<AnalysisVerdict>,
}

impl NotificationSenderHandle {
    /// Register the `AiAlert` handler on the bus.
    pub fn subscribe(&self, bus: &mut EventBus) {
        let tx = self.tx.clone();
        bus.subscribe::<topics::AiAlert, _>(handler_fn(
            "notification_sender.ai_alert",
            move |verdict: AnalysisVerdict| {
                let result = tx
                    .send(verdict)
                    .map_err(|_| HandlerError::new("notification sender worker stopped"));
                async move { result }
            },
        ));
    }
}

/// NotificationSender delivers verdicts to subscribed devices.
pub struct NotificationSender {
    sink: Arc<dyn NotificationSink>,
    verdicts: mpsc::UnboundedReceiver<AnalysisVerdict>,
}

impl NotificationSender {
    /// Create a new NotificationSender and the handle feeding its queue.
    pub fn new(sink: Arc<dyn NotificationSink>) -> (Self, NotificationSenderHandle) {
        let (tx, verdicts) = mpsc::unbounded_channel();
        (Self { sink, verdicts }, NotificationSenderHandle { tx })
    }

    /// Run the NotificationSender worker until shutdown is signaled.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!("NotificationSender started");

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("NotificationSender received shutdown signal");
                        break;
                    }
                }

                verdict = self.verdicts.recv() => {
                    let Some(verdict) = verdict else {
                        info!("NotificationSender queue closed");
                        break;
                    };
                    self.deliver(&verdict).await;
                }
            }
        }

        info!("NotificationSender shutdown complete");
    }

    /// Push `verdict` to every active token.
    pub async fn deliver(&self, verdict: &AnalysisVerdict) -> DeliveryReport {
        let tokens = match self.sink.list_active_tokens().await {
            Ok(tokens) => tokens,
            Err(e) => {
                error!(error = %e, "Failed to list device tokens");
                return DeliveryReport::default();
            }
        };

        let mut report = DeliveryReport {
            tokens: tokens.len(),
            ..Default::default()
        };
        if tokens.is_empty() {
            info!("No device tokens registered, nothing to send");
            return report;
        }

        for (index, batch) in tokens.chunks(BATCH_SIZE).enumerate() {
            let results = match self.sink.send_batch(batch, verdict).await {
                Ok(results) => results,
                Err(e) => {
                    error!(batch = index, size = batch.len(), error = %e, "Push batch failed");
                    report.failed += batch.len();
                    report.failed_batches += 1;
                    continue;
                }
            };

            for (token, result) in batch.iter().zip(results) {
                match result {
                    Ok(()) => report.delivered += 1,
                    Err(e) => {
                        warn!(token = %token, error = %e, "Push to device failed");
                        report.failed += 1;
                    }
                }
            }
            debug!(batch = index, size = batch.len(), "Push batch sent");
        }

        info!(
            attacker = %verdict.attacker,
            delivered = report.delivered,
            failed = report.failed,
            "Notification delivered"
        );
        report
    }
}
