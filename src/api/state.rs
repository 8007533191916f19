use crate::pipeline::SyncOrchestrator;
use crate::sync::SyncScheduler;
use std::sync::Arc;
use std::time::Instant;

/// Shared state for the API server
#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<SyncOrchestrator>,
    pub scheduler: Arc<SyncScheduler>,
    pub started_at: Instant,
}

impl ApiState {
    pub fn new(scheduler: Arc<SyncScheduler>) -> Self {
        Self {
            orchestrator: scheduler.orchestrator(),
            scheduler,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
