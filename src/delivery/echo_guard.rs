//! Echo-loop suppression.
//!
//! When the A->B direction writes a record into B, B stamps it with a new
//! last-modified time and the B->A poll would see it as a B-side change. The
//! guard remembers every write by `(system, identifier, last_modified)`; the
//! opposite direction drops a polled record only when all three match, so a
//! later human edit of the same record still goes through.

use crate::models::{SystemId, Watermark};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct EchoGuardStats {
    pub recorded: u64,
    pub suppressed: u64,
    pub expired: u64,
}

#[derive(Debug, Default)]
pub struct EchoGuard {
    writes: RwLock<HashMap<(SystemId, String), Watermark>>,
    stats: RwLock<EchoGuardStats>,
}

impl EchoGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember that we wrote `identifier` into `system` at `written_at`
    pub async fn record_write(&self, system: SystemId, identifier: &str, written_at: Watermark) {
        self.writes
            .write()
            .await
            .insert((system, identifier.to_string()), written_at);
        self.stats.write().await.recorded += 1;
    }

    /// True when the polled record is exactly our own earlier write.
    ///
    /// A matching entry is consumed. An entry older than the polled record is
    /// dropped as stale, since somebody changed the record after we did.
    pub async fn is_echo(&self, system: SystemId, identifier: &str, modified_at: Option<Watermark>) -> bool {
        let key = (system, identifier.to_string());
        let mut writes = self.writes.write().await;

        let Some(written_at) = writes.get(&key).copied() else {
            return false;
        };

        match modified_at {
            Some(at) if at == written_at => {
                writes.remove(&key);
                drop(writes);
                self.stats.write().await.suppressed += 1;
                debug!("Suppressed echo of {} from system {}", identifier, system);
                true
            }
            Some(at) if at > written_at => {
                writes.remove(&key);
                drop(writes);
                self.stats.write().await.expired += 1;
                false
            }
            _ => false,
        }
    }

    pub async fn pending(&self) -> usize {
        self.writes.read().await.len()
    }

    pub async fn clear(&self) {
        self.writes.write().await.clear();
    }

    pub async fn stats(&self) -> EchoGuardStats {
        self.stats.read().await.clone()
    }
}
