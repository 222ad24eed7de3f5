//! Task group owning every long-running unit of the pipeline.
//!
//! All units share one shutdown `watch` channel. Shutting down flips it,
//! waits up to a grace period for the units to return, and aborts the rest.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{Instrument, error, info, info_span, warn};

pub struct Supervisor {
    tasks: JoinSet<&'static str>,
    shutdown_tx: watch::Sender<bool>,
}

impl Supervisor {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            tasks: JoinSet::new(),
            shutdown_tx,
        }
    }

    /// A receiver to hand to a unit's `run`.
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Spawn `unit` under `name`. The name is attached to its log span.
    pub fn spawn<F>(&mut self, name: &'static str, unit: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let span = info_span!("unit", name);
        self.tasks.spawn(
            async move {
                unit.await;
                name
            }
            .instrument(span),
        );
        info!(unit = name, "Spawned unit");
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for the next unit to exit on its own.
    ///
    /// Returns `None` when no units are left.
    pub async fn join_next(&mut self) -> Option<Result<&'static str, tokio::task::JoinError>> {
        self.tasks.join_next().await
    }

    /// Signal shutdown and join every unit, aborting stragglers after `grace`.
    ///
    /// Returns the number of units that had to be aborted.
    pub async fn shutdown(mut self, grace: Duration) -> usize {
        info!(units = self.tasks.len(), "Shutting down");
        // Receivers may all be gone already; that is fine.
        let _ = self.shutdown_tx.send(true);

        let drained = tokio::time::timeout(grace, async {
            while let Some(joined) = self.tasks.join_next().await {
                log_exit(joined);
            }
        })
        .await;

        if drained.is_ok() {
            info!("All units stopped");
            return 0;
        }

        let remaining = self.tasks.len();
        warn!(remaining, ?grace, "Grace period elapsed, aborting remaining units");
        self.tasks.abort_all();
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Err(e) if !e.is_cancelled() => error!(error = %e, "Unit failed during abort"),
                _ => {}
            }
        }
        remaining
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

fn log_exit(joined: Result<&'static str, tokio::task::JoinError>) {
    match joined {
        Ok(name) => info!(unit = name, "Unit stopped"),
        Err(e) if e.is_panic() => error!(error = %e, "Unit panicked"),
        Err(e) => warn!(error = %e, "Unit cancelled"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn until_shutdown(mut shutdown_rx: watch::Receiver<bool>, stopped: Arc<AtomicUsize>) {
        let _ = shutdown_rx.wait_for(|stop| *stop).await;
        stopped.fetch_add(1, Ordering::SeqCst);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_joins_cooperative_units() {
        let stopped = Arc::new(AtomicUsize::new(0));
        let mut supervisor = Supervisor::new();
        for name in ["a", "b", "c"] {
            let rx = supervisor.shutdown_receiver();
            supervisor.spawn(name, until_shutdown(rx, Arc::clone(&stopped)));
        }
        assert_eq!(supervisor.len(), 3);

        let aborted = supervisor.shutdown(Duration::from_secs(5)).await;
        assert_eq!(aborted, 0);
        assert_eq!(stopped.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stubborn_unit_is_aborted_after_grace() {
        let stopped = Arc::new(AtomicUsize::new(0));
        let mut supervisor = Supervisor::new();
        let rx = supervisor.shutdown_receiver();
        supervisor.spawn("polite", until_shutdown(rx, Arc::clone(&stopped)));
        supervisor.spawn("stubborn", async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });

        let aborted = supervisor.shutdown(Duration::from_secs(5)).await;
        assert_eq!(aborted, 1);
        assert_eq!(stopped.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_join_next_reports_exited_unit() {
        let mut supervisor = Supervisor::new();
        supervisor.spawn("oneshot", async {});
        let joined = supervisor.join_next().await.unwrap().unwrap();
        assert_eq!(joined, "oneshot");
        assert!(supervisor.is_empty());
    }
}
