//! Event type definitions.
//!
//! `Event` is the closed set of things that travel over the bus. Each
//! variant has a zero-sized marker type in [`topics`] so handlers can be
//! registered against a variant and receive its payload already unpacked.

use crate::entities::Region;
use sirena_sdk::objects::{AnalysisVerdict, Post};
use std::sync::Arc;

/// Time-ordered batch of posts, shared between handlers without copying.
pub type PostBatch = Arc<[Post]>;

/// Discriminant of [`Event`], used for routing and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TopicKind {
    Alert,
    Clear,
    NewMessages,
    AiAlert,
}

impl std::fmt::Display for TopicKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TopicKind::Alert => write!(f, "alert"),
            TopicKind::Clear => write!(f, "clear"),
            TopicKind::NewMessages => write!(f, "new_messages"),
            TopicKind::AiAlert => write!(f, "ai_alert"),
        }
    }
}

/// An event published on the bus.
#[derive(Debug, Clone)]
pub enum Event {
    /// The monitored region went into alert. Carries a snapshot of the region.
    Alert(Region),
    /// The monitored region's alert was lifted.
    Clear(Region),
    /// Posts gathered from the info sources, sorted by timestamp ascending.
    NewMessages(PostBatch),
    /// The classifier flagged the recent context as alert-worthy.
    AiAlert(AnalysisVerdict),
}

impl Event {
    pub fn kind(&self) -> TopicKind {
        match self {
            Event::Alert(_) => TopicKind::Alert,
            Event::Clear(_) => TopicKind::Clear,
            Event::NewMessages(_) => TopicKind::NewMessages,
            Event::AiAlert(_) => TopicKind::AiAlert,
        }
    }
}

/// A typed view of one [`Event`] variant.
pub trait Topic: Send + Sync + 'static {
    const KIND: TopicKind;
    type Payload: Clone + Send + 'static;

    /// Unpack the payload if `event` is of this topic.
    fn payload(event: Event) -> Option<Self::Payload>;
}

/// Marker types for [`Topic`] registration.
pub mod topics {
    use super::*;

    pub struct Alert;
    pub struct Clear;
    pub struct NewMessages;
    pub struct AiAlert;

    impl Topic for Alert {
        const KIND: TopicKind = TopicKind::Alert;
        type Payload = Region;

        fn payload(event: Event) -> Option<Region> {
            match event {
                Event::Alert(region) => Some(region),
                _ => None,
            }
        }
    }

    impl Topic for Clear {
        const KIND: TopicKind = TopicKind::Clear;
        type Payload = Region;

        fn payload(event: Event) -> Option<Region> {
            match event {
                Event::Clear(region) => Some(region),
                _ => None,
            }
        }
    }

    impl Topic for NewMessages {
        const KIND: TopicKind = TopicKind::NewMessages;
        type Payload = PostBatch;

        fn payload(event: Event) -> Option<PostBatch> {
            match event {
                Event::NewMessages(batch) => Some(batch),
                _ => None,
            }
        }
    }

    impl Topic for AiAlert {
        const KIND: TopicKind = TopicKind::AiAlert;
        type Payload = AnalysisVerdict;

        fn payload(event: Event) -> Option<AnalysisVerdict> {
            match event {
                Event::AiAlert(verdict) => Some(verdict),
                _ => None,
            }
        }
    }
}
