//! In-process publish/subscribe bus.
//!
//! Handlers are registered per topic before the bus starts; publishing is
//! non-blocking and may happen from any task. A single dispatch loop drains
//! events in publish order and runs every handler of the event's topic to
//! completion, in registration order, before taking the next event.
//!
//! Each handler invocation runs in its own task that the loop awaits, so a
//! panicking handler is reported and the loop carries on.

use super::types::{Event, Topic, TopicKind};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Error returned by a handler; logged by the dispatch loop.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HandlerError(String);

impl HandlerError {
    pub fn new(message: impl std::fmt::Display) -> Self {
        Self(message.to_string())
    }
}

/// Errors that can occur when publishing.
#[derive(Debug, Error)]
pub enum BusError {
    /// The dispatch loop has stopped and dropped its queue.
    #[error("event bus is closed, dropped {0} event")]
    Closed(TopicKind),
}

/// Consumer of one topic's payloads.
#[async_trait]
pub trait Handler<P>: Send + Sync + 'static {
    async fn handle(&self, payload: P) -> Result<(), HandlerError>;

    /// Name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Adapter turning an async closure into a [`Handler`].
pub struct FnHandler<F> {
    name: &'static str,
    f: F,
}

/// Wrap `f` so it can be passed to [`EventBus::subscribe`].
pub fn handler_fn<F>(name: &'static str, f: F) -> FnHandler<F> {
    FnHandler { name, f }
}

#[async_trait]
impl<P, F, Fut> Handler<P> for FnHandler<F>
where
    P: Send + 'static,
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, payload: P) -> Result<(), HandlerError> {
        (self.f)(payload).await
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'static>>;

/// Type-erased handler: returns `None` when the event is not for it.
type ErasedHandler = Box<dyn Fn(Event) -> Option<HandlerFuture> + Send + Sync>;

struct Subscription {
    name: &'static str,
    call: ErasedHandler,
}

/// Cloneable publishing handle.
#[derive(Debug, Clone)]
pub struct Publisher {
    tx: mpsc::UnboundedSender<Event>,
}

impl Publisher {
    /// Enqueue `event` for delivery and return immediately.
    pub fn publish(&self, event: Event) -> Result<(), BusError> {
        let kind = event.kind();
        self.tx.send(event).map_err(|_| BusError::Closed(kind))?;
        debug!(topic = %kind, "Published event");
        Ok(())
    }
}

/// The event bus: subscriber table plus the pending-event queue.
///
/// Build it, register handlers with [`subscribe`](EventBus::subscribe),
/// hand out [`Publisher`]s, then move it into [`run`](EventBus::run).
/// Events published before `run` starts are queued, not lost.
pub struct EventBus {
    subscribers: BTreeMap<TopicKind, Vec<Subscription>>,
    tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            subscribers: BTreeMap::new(),
            tx,
            rx,
        }
    }

    pub fn publisher(&self) -> Publisher {
        Publisher {
            tx: self.tx.clone(),
        }
    }

    /// Register `handler` for topic `T`. Handlers of a topic run in the
    /// order they were registered.
    pub fn subscribe<T, H>(&mut self, handler: H)
    where
        T: Topic,
        H: Handler<T::Payload>,
    {
        let name = handler.name();
        let handler = Arc::new(handler);
        let call: ErasedHandler = Box::new(move |event: Event| {
            let payload = T::payload(event)?;
            let handler = Arc::clone(&handler);
            Some(Box::pin(async move { handler.handle(payload).await }) as HandlerFuture)
        });

        debug!(topic = %T::KIND, subscriber = name, "Subscribed handler");
        self.subscribers
            .entry(T::KIND)
            .or_default()
            .push(Subscription { name, call });
    }

    pub fn subscriber_count(&self, kind: TopicKind) -> usize {
        self.subscribers.get(&kind).map_or(0, Vec::len)
    }

    /// Run the dispatch loop until shutdown is signaled.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        // Keep only publishers handed out so far alive; the loop's own
        // sender would otherwise hold the queue open forever.
        drop(self.tx);
        info!("EventBus dispatch loop started");

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("EventBus received shutdown signal");
                        break;
                    }
                }

                event = self.rx.recv() => {
                    let Some(event) = event else {
                        info!("All publishers dropped");
                        break;
                    };
                    dispatch(&self.subscribers, event).await;
                }
            }
        }

        info!("EventBus shutdown complete");
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

async fn dispatch(subscribers: &BTreeMap<TopicKind, Vec<Subscription>>, event: Event) {
    let kind = event.kind();
    let Some(subscriptions) = subscribers.get(&kind) else {
        debug!(topic = %kind, "No subscribers for event");
        return;
    };

    for subscription in subscriptions {
        let Some(future) = (subscription.call)(event.clone()) else {
            continue;
        };
        match tokio::spawn(future).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(topic = %kind, subscriber = subscription.name, error = %e, "Handler failed");
            }
            Err(e) if e.is_panic() => {
                error!(topic = %kind, subscriber = subscription.name, "Handler panicked");
            }
            Err(e) => {
                error!(topic = %kind, subscriber = subscription.name, error = %e, "Handler task failed");
            }
        }
    }
}
