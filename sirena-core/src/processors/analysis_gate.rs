//! AnalysisGate processor.
//!
//! The AnalysisGate is responsible for:
//! - Tracking whether analysis is enabled (`Alert` enables, `Clear` disables)
//! - Keeping a bounded rolling window of recent posts
//! - Sending the window to the classifier after each `NewMessages` batch
//! - Emitting `AiAlert` when the classifier flags the context
//!
//! The gate runs as its own worker. [`AnalysisGateHandle`] forwards bus
//! events into the worker's queue, so a slow classifier never stalls the bus
//! and commands are still applied strictly in publish order.

use crate::config::AnalyzerSettings;
use crate::entities::Region;
use crate::events::{Event, EventBus, HandlerError, PostBatch, Publisher, handler_fn, topics};
use async_trait::async_trait;
use compact_str::CompactString;
use sirena_sdk::client::ClientError;
use sirena_sdk::objects::{AnalysisVerdict, Post, VerdictPayload};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;
use time_tz::{OffsetDateTimeExt, Tz};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

const TRANSCRIPT: &str = "sirena::transcript";

/// Errors that can occur during classification.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// Transport or API failure
    #[error("classifier request failed: {0}")]
    Client(#[from] ClientError),

    /// Response content is not a verdict object
    #[error("invalid verdict: {0}")]
    InvalidVerdict(#[from] serde_json::Error),

    /// Local time could not be rendered
    #[error("failed to format local time: {0}")]
    Format(#[from] time::error::Format),
}

/// Whether a context line was already in the window before the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    History,
    New,
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextKind::History => write!(f, "HISTORY"),
            ContextKind::New => write!(f, "NEW"),
        }
    }
}

/// One post rendered for the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextLine {
    pub kind: ContextKind,
    pub local_time: time::Time,
    pub author: CompactString,
    pub text: String,
}

impl fmt::Display for ContextLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "> {} {:02}:{:02}:{:02} {}: {}",
            self.kind,
            self.local_time.hour(),
            self.local_time.minute(),
            self.local_time.second(),
            self.author,
            self.text
        )
    }
}

/// Everything the classifier sees for one batch.
#[derive(Debug, Clone)]
pub struct ClassificationRequest {
    pub system_prompt: String,
    /// Oldest first.
    pub context: Vec<ContextLine>,
    /// Current time in the configured timezone.
    pub local_time: OffsetDateTime,
}

/// The external classifier.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(
        &self,
        request: &ClassificationRequest,
    ) -> Result<VerdictPayload, ClassifierError>;
}

/// Bounded FIFO of the most recent posts.
#[derive(Debug, Clone)]
pub struct AnalysisWindow {
    posts: VecDeque<Post>,
    capacity: usize,
}

impl AnalysisWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            posts: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `post`, evicting the oldest entry past capacity.
    pub fn push(&mut self, post: Post) {
        if self.capacity == 0 {
            return;
        }
        while self.posts.len() >= self.capacity {
            self.posts.pop_front();
        }
        self.posts.push_back(post);
    }

    pub fn clear(&mut self) {
        self.posts.clear();
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Post> {
        self.posts.iter()
    }
}

/// Gate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GateState {
    #[default]
    Disabled,
    Enabled,
}

/// Work items queued by the handle.
#[derive(Debug)]
enum GateCommand {
    Enable,
    Disable,
    Analyze(PostBatch),
}

/// Bus-facing side of the AnalysisGate.
#[derive(Debug, Clone)]
pub struct AnalysisGateHandle {
    tx: mpsc::UnboundedSender<GateCommand>,
}

impl AnalysisGateHandle {
    fn send(&self, command: GateCommand) -> Result<(), HandlerError> {
        self.tx
            .send(command)
            .map_err(|_| HandlerError::new("analysis gate worker stopped"))
    }

    /// Register `Alert` / `Clear` / `NewMessages` handlers on the bus.
    pub fn subscribe(&self, bus: &mut EventBus) {
        let handle = self.clone();
        bus.subscribe::<topics::Alert, _>(handler_fn("analysis_gate.alert", move |_region: Region| {
            let result = handle.send(GateCommand::Enable);
            async move { result }
        }));

        let handle = self.clone();
        bus.subscribe::<topics::Clear, _>(handler_fn("analysis_gate.clear", move |_region: Region| {
            let result = handle.send(GateCommand::Disable);
            async move { result }
        }));

        let handle = self.clone();
        bus.subscribe::<topics::NewMessages, _>(handler_fn(
            "analysis_gate.new_messages",
            move |batch: PostBatch| {
                let result = handle.send(GateCommand::Analyze(batch));
                async move { result }
            },
        ));
    }
}

/// AnalysisGate decides whether the recent context warrants a notification.
pub struct AnalysisGate {
    state: GateState,
    window: AnalysisWindow,
    system_prompt: String,
    timezone: &'static Tz,
    classifier: Arc<dyn Classifier>,
    publisher: Publisher,
    commands: mpsc::UnboundedReceiver<GateCommand>,
}

impl AnalysisGate {
    /// Create a new AnalysisGate and the handle feeding its queue.
    pub fn new(
        settings: &AnalyzerSettings,
        classifier: Arc<dyn Classifier>,
        publisher: Publisher,
    ) -> (Self, AnalysisGateHandle) {
        let (tx, commands) = mpsc::unbounded_channel();
        let gate = Self {
            state: GateState::Disabled,
            window: AnalysisWindow::new(settings.window_size),
            system_prompt: settings.prompt.clone(),
            timezone: settings.timezone,
            classifier,
            publisher,
            commands,
        };
        (gate, AnalysisGateHandle { tx })
    }

    /// Run the AnalysisGate worker until shutdown is signaled.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(window = self.window.capacity(), "AnalysisGate started");

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("AnalysisGate received shutdown signal");
                        break;
                    }
                }

                command = self.commands.recv() => {
                    let Some(command) = command else {
                        info!("AnalysisGate queue closed");
                        break;
                    };
                    self.apply(command).await;
                }
            }
        }

        info!("AnalysisGate shutdown complete");
    }

    async fn apply(&mut self, command: GateCommand) {
        match command {
            GateCommand::Enable => self.enable(),
            GateCommand::Disable => self.disable(),
            GateCommand::Analyze(batch) => {
                if let Err(e) = self.analyze(&batch).await {
                    error!(error = %e, batch = batch.len(), "Classification failed, batch dropped");
                }
            }
        }
    }

    /// Enter `Enabled` with an empty window. Re-enabling also resets.
    pub fn enable(&mut self) {
        self.state = GateState::Enabled;
        self.window.clear();
        info!("AnalysisGate enabled");
    }

    /// Enter `Disabled` with an empty window.
    pub fn disable(&mut self) {
        self.state = GateState::Disabled;
        self.window.clear();
        info!("AnalysisGate disabled");
    }

    /// Fold `batch` into the window and classify the whole window.
    ///
    /// Returns the verdict, if one was obtained. Posts stay in the window
    /// even when classification fails. Disabled gates ignore the batch.
    pub async fn analyze(
        &mut self,
        batch: &[Post],
    ) -> Result<Option<AnalysisVerdict>, ClassifierError> {
        if self.state == GateState::Disabled {
            debug!(batch = batch.len(), "AnalysisGate disabled, ignoring batch");
            return Ok(None);
        }
        if batch.is_empty() {
            return Ok(None);
        }

        for post in batch {
            self.window.push(post.clone());
        }

        let request = self.build_request(batch.len());
        for line in &request.context {
            debug!(target: TRANSCRIPT, "{line}");
        }

        let payload = self.classifier.classify(&request).await?;
        debug!(target: TRANSCRIPT, verdict = ?payload, "Classifier verdict");

        let verdict = AnalysisVerdict::from(payload);
        if verdict.alert {
            info!(
                attacker = %verdict.attacker,
                confidence = verdict.confidence,
                "Classifier raised an alert"
            );
            if let Err(e) = self.publisher.publish(Event::AiAlert(verdict.clone())) {
                warn!(error = %e, "Failed to publish ai alert");
            }
        } else {
            debug!("Classifier found nothing alarming");
        }
        Ok(Some(verdict))
    }

    /// Render the window, marking the last `new_count` posts as new.
    fn build_request(&self, new_count: usize) -> ClassificationRequest {
        let history = self.window.len().saturating_sub(new_count);
        let context = self
            .window
            .iter()
            .enumerate()
            .map(|(i, post)| ContextLine {
                kind: if i < history {
                    ContextKind::History
                } else {
                    ContextKind::New
                },
                local_time: post.timestamp.to_timezone(self.timezone).time(),
                author: post.author.clone(),
                text: post.text.clone(),
            })
            .collect();

        ClassificationRequest {
            system_prompt: self.system_prompt.clone(),
            context,
            local_time: OffsetDateTime::now_utc().to_timezone(self.timezone),
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn window(&self) -> &AnalysisWindow {
        &self.window
    }
}
