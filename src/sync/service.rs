use crate::batch::BatchUpsertEngine;
use crate::config::{Config, SyncConfig};
use crate::error::Result;
use crate::models::SystemId;
use crate::pipeline::SyncOrchestrator;
use crate::sync::scheduler::SyncScheduler;
use crate::system::{create_connector, SystemConnector};
use crate::watermark::{create_storage, WatermarkStorage, WatermarkStore};
use std::sync::Arc;
use tracing::info;

/// The assembled sync engine: connectors, watermark store, batch engine,
/// orchestrator and scheduler
pub struct SyncService {
    orchestrator: Arc<SyncOrchestrator>,
    scheduler: Arc<SyncScheduler>,
}

impl SyncService {
    /// Connect to everything the configuration names
    pub async fn from_config(config: &Config) -> Result<Self> {
        let system_a = create_connector(SystemId::A, &config.system_a)?;
        let system_b = create_connector(SystemId::B, &config.system_b)?;
        let storage = create_storage(&config.watermark).await?;

        info!(
            "Syncing '{}' <-> '{}'",
            config.system_a.name, config.system_b.name
        );
        Self::with_parts(config.sync.clone(), system_a, system_b, storage)
    }

    /// Assemble from already-built connectors and storage
    pub fn with_parts(
        sync: SyncConfig,
        system_a: Arc<dyn SystemConnector>,
        system_b: Arc<dyn SystemConnector>,
        storage: Arc<dyn WatermarkStorage>,
    ) -> Result<Self> {
        let default_watermark = sync.default_watermark()?;
        let watermarks = Arc::new(WatermarkStore::new(storage, default_watermark));
        let engine = Arc::new(BatchUpsertEngine::new(sync.upsert_concurrency));
        let period = sync.poll_interval();

        let orchestrator = Arc::new(SyncOrchestrator::new(
            sync, system_a, system_b, watermarks, engine,
        ));
        let scheduler = Arc::new(SyncScheduler::new(orchestrator.clone(), period));

        Ok(Self {
            orchestrator,
            scheduler,
        })
    }

    pub fn orchestrator(&self) -> Arc<SyncOrchestrator> {
        self.orchestrator.clone()
    }

    pub fn scheduler(&self) -> Arc<SyncScheduler> {
        self.scheduler.clone()
    }
}
