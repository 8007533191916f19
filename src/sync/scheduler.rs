use crate::error::{Result, UserSyncError};
use crate::metrics;
use crate::models::SyncDirection;
use crate::pipeline::{RunReport, SyncOrchestrator};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

struct Trigger {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Periodic trigger per direction.
///
/// Each started direction gets its own task calling
/// [`SyncOrchestrator::run_once`] every interval. Stopping a direction
/// prevents further runs; a run already in progress completes first.
pub struct SyncScheduler {
    orchestrator: Arc<SyncOrchestrator>,
    period: Duration,
    triggers: RwLock<HashMap<SyncDirection, Trigger>>,
}

impl SyncScheduler {
    pub fn new(orchestrator: Arc<SyncOrchestrator>, period: Duration) -> Self {
        Self {
            orchestrator,
            period,
            triggers: RwLock::new(HashMap::new()),
        }
    }

    pub fn orchestrator(&self) -> Arc<SyncOrchestrator> {
        self.orchestrator.clone()
    }

    /// Start the periodic trigger; returns false if it was already started
    pub async fn start(&self, direction: SyncDirection) -> bool {
        let mut triggers = self.triggers.write().await;
        if let Some(trigger) = triggers.get(&direction) {
            if !trigger.handle.is_finished() {
                debug!("Scheduler for '{}' already running", direction);
                return false;
            }
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(Self::trigger_loop(
            self.orchestrator.clone(),
            direction,
            self.period,
            shutdown_rx,
        ));
        triggers.insert(direction, Trigger { shutdown_tx, handle });

        metrics::set_scheduler_running(direction, true);
        info!(
            "Started scheduler for '{}' every {}ms",
            direction,
            self.period.as_millis()
        );
        true
    }

    async fn trigger_loop(
        orchestrator: Arc<SyncOrchestrator>,
        direction: SyncDirection,
        period: Duration,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    debug!("Scheduler for '{}' received shutdown", direction);
                    break;
                }
                _ = ticker.tick() => {
                    match orchestrator.run_once(direction).await {
                        Ok(_) => {}
                        Err(UserSyncError::AlreadyRunning(_)) => {
                            debug!("Skipping trigger for '{}': run in progress", direction);
                        }
                        Err(e) if e.is_transient() => {
                            warn!("Run for '{}' failed, retrying on next trigger: {}", direction, e);
                        }
                        Err(e) => {
                            error!("Run for '{}' failed and needs attention: {}", direction, e);
                        }
                    }
                }
            }
        }
    }

    /// Stop the periodic trigger, waiting for an in-flight run to finish.
    /// Returns false if the direction was not started.
    pub async fn stop(&self, direction: SyncDirection) -> bool {
        let trigger = self.triggers.write().await.remove(&direction);
        let Some(trigger) = trigger else {
            return false;
        };

        let _ = trigger.shutdown_tx.send(true);
        if let Err(e) = trigger.handle.await {
            warn!("Scheduler task for '{}' ended abnormally: {}", direction, e);
        }

        metrics::set_scheduler_running(direction, false);
        info!("Stopped scheduler for '{}'", direction);
        true
    }

    /// Manual trigger outside the schedule
    pub async fn run_once(&self, direction: SyncDirection) -> Result<RunReport> {
        self.orchestrator.run_once(direction).await
    }

    pub async fn is_running(&self, direction: SyncDirection) -> bool {
        self.triggers
            .read()
            .await
            .get(&direction)
            .map(|t| !t.handle.is_finished())
            .unwrap_or(false)
    }

    pub async fn start_all(&self) {
        for direction in SyncDirection::ALL {
            self.start(direction).await;
        }
    }

    /// Stop every direction
    pub async fn shutdown(&self) {
        info!("Shutting down sync schedulers");
        for direction in SyncDirection::ALL {
            self.stop(direction).await;
        }
    }
}
