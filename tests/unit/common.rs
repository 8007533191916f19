// Shared fixtures for sync tests

use std::sync::Arc;
use usersync::config::SyncConfig;
use usersync::models::{Record, SystemId};
use usersync::pipeline::SyncOrchestrator;
use usersync::sync::{SyncScheduler, SyncService};
use usersync::system::{MemorySystem, SystemDescriptor};
use usersync::watermark::MemoryStorage;

pub const PAST: &str = "2020-01-01T00:00:00.000Z";
pub const TEST_EMAIL: &str = "noreply@chatter.salesforce.com";

pub fn memory_system(id: SystemId, name: &str) -> Arc<MemorySystem> {
    Arc::new(MemorySystem::new(SystemDescriptor::with_defaults(id, name)))
}

/// A user as it would be created in either system
pub fn user(email: &str, first_name: &str, title: &str) -> Record {
    Record::new()
        .with("Email", email)
        .with("FirstName", first_name)
        .with("LastName", "Sync")
        .with("Title", title)
        .with("IsActive", true)
        .with("Username", format!("{}.test", email))
        .with("ProfileId", "00e000000000001")
        .with("type", "User")
}

/// Fast timings and a watermark that predates every fixture
pub fn sync_config() -> SyncConfig {
    SyncConfig {
        watermark_default_expression: Some(PAST.to_string()),
        poll_interval_ms: 50,
        batch_timeout_ms: 5_000,
        batch_poll_interval_ms: 10,
        ..SyncConfig::default()
    }
}

pub struct Harness {
    pub a: Arc<MemorySystem>,
    pub b: Arc<MemorySystem>,
    pub service: SyncService,
}

impl Harness {
    pub fn new(config: SyncConfig) -> Self {
        let a = memory_system(SystemId::A, "system-a");
        let b = memory_system(SystemId::B, "system-b");
        let service = SyncService::with_parts(
            config,
            a.clone(),
            b.clone(),
            Arc::new(MemoryStorage::new()),
        )
        .expect("valid sync config");
        Self { a, b, service }
    }

    pub fn orchestrator(&self) -> Arc<SyncOrchestrator> {
        self.service.orchestrator()
    }

    pub fn scheduler(&self) -> Arc<SyncScheduler> {
        self.service.scheduler()
    }
}
