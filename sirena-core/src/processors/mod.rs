//! Event processors of the alert pipeline.
//!
//! - `AlertMonitor`: polls the alert source, emits `Alert` / `Clear`
//! - `InfoMonitor`: receives `Alert` / `Clear`, polls info sources while
//!   active, emits `NewMessages`
//! - `AnalysisGate`: receives `Alert` / `Clear` / `NewMessages`, queries the
//!   classifier, emits `AiAlert`
//! - `NotificationSender`: receives `AiAlert`, pushes to devices

pub mod alert_monitor;
pub mod analysis_gate;
pub mod info_monitor;
pub mod notification_sender;

pub use alert_monitor::{AlertMonitor, AlertSignal};
pub use analysis_gate::{
    AnalysisGate, AnalysisGateHandle, AnalysisWindow, ClassificationRequest, Classifier,
    ClassifierError, ContextKind, ContextLine, GateState,
};
pub use info_monitor::{InfoMonitor, InfoMonitorHandle};
pub use notification_sender::{
    DeliveryReport, NotificationSender, NotificationSenderHandle, NotificationSink, SinkError,
};
