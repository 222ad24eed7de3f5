//! Event system for the alert pipeline.
//!
//! This module provides the event types and the in-process bus that
//! decouples producers from consumers.
//!
//! # Event Flow
//!
//! 1. `AlertMonitor` emits `Alert` / `Clear` -> `InfoMonitor`, `AnalysisGate`
//! 2. `InfoMonitor` emits `NewMessages` -> `AnalysisGate`
//! 3. `AnalysisGate` emits `AiAlert` -> `NotificationSender`
//!
//! Events are ephemeral: delivery is at-most-once and in memory only.

pub mod bus;
pub mod types;

pub use bus::{BusError, EventBus, FnHandler, Handler, HandlerError, Publisher, handler_fn};
pub use types::{Event, PostBatch, Topic, TopicKind, topics};
