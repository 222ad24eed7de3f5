//! Sirena
//!
//! Watches a public alert channel for the monitored region, gathers context
//! from news channels while the alert lasts, asks a classifier whether the
//! context is alarming and pushes the verdict to subscribed devices.

mod config;
mod shutdown;

use clap::Parser;
use config::{ConfigLoader, get_openai_api_key};
use shutdown::shutdown_signal;
use sirena_core::adapters::FirebaseSink;
use sirena_core::events::{EventBus, HandlerError, handler_fn, topics};
use sirena_core::processors::{
    AlertMonitor, AnalysisGate, Classifier, InfoMonitor, NotificationSender,
};
use sirena_core::sources::ContentSource;
use sirena_core::supervisor::Supervisor;
use sirena_sdk::client::{ChannelClient, ChatClient, FcmClient, ServiceAccountKey};
use sirena_sdk::objects::AnalysisVerdict;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// How long units get to stop on their own before they are aborted.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Sirena - regional air alert watcher
#[derive(Parser, Debug)]
#[command(name = "sirena")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "SIRENA_CONFIG", default_value = "/etc/sirena/config.toml")]
    config: PathBuf,

    /// Log filter, used when RUST_LOG is not set (e.g. "debug", "info,sirena::transcript=debug")
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration first so its log level can seed the filter
    let loaded = ConfigLoader::new(&args.config).load();
    let config_level = loaded.as_ref().ok().map(|l| l.log_level.as_str());
    init_tracing(args.log_level.as_deref().or(config_level));

    tracing::info!("Starting sirena v{}", env!("CARGO_PKG_VERSION"));

    let loaded = loaded.map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", args.config);
    let settings = Arc::new(loaded.settings);

    let api_key = get_openai_api_key().map_err(|e| {
        tracing::error!("OPENAI_API_KEY environment variable not set");
        e
    })?;

    // External collaborators
    let source: Arc<dyn ContentSource> = Arc::new(ChannelClient::new()?);
    let classifier: Arc<dyn Classifier> = Arc::new(ChatClient::new(
        settings.analyzer.api_base.clone(),
        api_key,
        settings.analyzer.model.clone(),
    )?);

    let mut bus = EventBus::new();
    let mut supervisor = Supervisor::new();

    let alert_monitor = AlertMonitor::new(&settings.alert, Arc::clone(&source), bus.publisher());

    let (info_monitor, info_handle) =
        InfoMonitor::new(&settings.info, Arc::clone(&source), bus.publisher());
    info_handle.subscribe(&mut bus);

    let (analysis_gate, gate_handle) =
        AnalysisGate::new(&settings.analyzer, classifier, bus.publisher());
    gate_handle.subscribe(&mut bus);

    if settings.notifications.enabled {
        let key = ServiceAccountKey::from_file(&settings.notifications.credentials_path)
            .map_err(|e| {
                tracing::error!("Failed to read Firebase credentials: {}", e);
                e
            })?;
        let sink = FirebaseSink::new(FcmClient::new(key)?, settings.notifications.token_max_age);
        let (sender, sender_handle) = NotificationSender::new(Arc::new(sink));
        sender_handle.subscribe(&mut bus);
        let shutdown_rx = supervisor.shutdown_receiver();
        supervisor.spawn("notification_sender", sender.run(shutdown_rx));
    } else {
        tracing::warn!("Notifications disabled, verdicts will only be logged");
        bus.subscribe::<topics::AiAlert, _>(handler_fn(
            "log_verdict",
            |verdict: AnalysisVerdict| {
                tracing::info!(
                    attacker = %verdict.attacker,
                    confidence = verdict.confidence,
                    text = %verdict.text,
                    "Alert verdict (not sent)"
                );
                async { Ok::<(), HandlerError>(()) }
            },
        ));
    }

    let shutdown_rx = supervisor.shutdown_receiver();
    supervisor.spawn("analysis_gate", analysis_gate.run(shutdown_rx));
    let shutdown_rx = supervisor.shutdown_receiver();
    supervisor.spawn("info_monitor", info_monitor.run(shutdown_rx));
    let shutdown_rx = supervisor.shutdown_receiver();
    supervisor.spawn("alert_monitor", alert_monitor.run(shutdown_rx));
    let shutdown_rx = supervisor.shutdown_receiver();
    supervisor.spawn("event_bus", bus.run(shutdown_rx));

    tokio::select! {
        result = shutdown_signal() => {
            if let Err(e) = result {
                tracing::error!("Failed to install signal handlers: {}", e);
            }
        }
        exited = supervisor.join_next() => {
            tracing::error!(?exited, "A unit stopped unexpectedly");
        }
    }

    let aborted = supervisor.shutdown(SHUTDOWN_GRACE).await;
    if aborted > 0 {
        tracing::warn!(aborted, "Some units did not stop in time");
    }
    tracing::info!("Shutdown complete");

    Ok(())
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins over `fallback`; without either the level is `info`.
fn init_tracing(fallback: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(fallback.unwrap_or("info")));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
