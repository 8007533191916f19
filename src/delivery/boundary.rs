//! Deduplication at the watermark boundary.
//!
//! Polls use `>=`, so records stamped exactly at the stored watermark are
//! returned again by the next run. The ledger remembers which identifiers were
//! already delivered at that timestamp and lets the next run skip them.

use crate::models::{SyncDirection, Watermark};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct BoundaryLedger {
    delivered: RwLock<HashMap<SyncDirection, (Watermark, HashSet<String>)>>,
}

impl BoundaryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the direction's boundary after a successful run
    pub async fn commit(
        &self,
        direction: SyncDirection,
        watermark: Watermark,
        identifiers: HashSet<String>,
    ) {
        self.delivered
            .write()
            .await
            .insert(direction, (watermark, identifiers));
    }

    /// Whether `identifier` stamped `modified_at` was delivered by the last run
    pub async fn already_delivered(
        &self,
        direction: SyncDirection,
        identifier: &str,
        modified_at: Option<Watermark>,
    ) -> bool {
        let delivered = self.delivered.read().await;
        match (delivered.get(&direction), modified_at) {
            (Some((boundary, ids)), Some(at)) => at == *boundary && ids.contains(identifier),
            _ => false,
        }
    }

    pub async fn reset(&self, direction: SyncDirection) {
        self.delivered.write().await.remove(&direction);
    }
}
