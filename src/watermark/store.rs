use crate::error::Result;
use crate::metrics;
use crate::models::{SyncDirection, Watermark};
use crate::watermark::storage::{WatermarkEntry, WatermarkStorage};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Per-direction watermarks on top of a storage backend.
///
/// The first `get` for a direction with nothing stored seeds it with the
/// configured default (or the current time) and persists that seed, so a new
/// deployment only picks up changes made from then on.
pub struct WatermarkStore {
    storage: Arc<dyn WatermarkStorage>,
    default: Option<Watermark>,
    a_to_b: Mutex<()>,
    b_to_a: Mutex<()>,
}

impl WatermarkStore {
    pub fn new(storage: Arc<dyn WatermarkStorage>, default: Option<Watermark>) -> Self {
        Self {
            storage,
            default,
            a_to_b: Mutex::new(()),
            b_to_a: Mutex::new(()),
        }
    }

    fn lock_for(&self, direction: SyncDirection) -> &Mutex<()> {
        match direction {
            SyncDirection::AToB => &self.a_to_b,
            SyncDirection::BToA => &self.b_to_a,
        }
    }

    /// Current watermark, seeding it on first access
    pub async fn get(&self, direction: SyncDirection) -> Result<Watermark> {
        let _guard = self.lock_for(direction).lock().await;

        if let Some(entry) = self.storage.load(direction).await? {
            return Ok(entry.watermark);
        }

        let seed = self.default.unwrap_or_else(Watermark::now);
        self.storage
            .save(&WatermarkEntry::new(direction, seed))
            .await?;
        info!("Seeded watermark for direction '{}' at {}", direction, seed);
        metrics::record_watermark(direction, seed);
        Ok(seed)
    }

    /// Advance the watermark; a value lower than the stored one is ignored.
    /// Returns the watermark in effect afterwards.
    pub async fn set(&self, direction: SyncDirection, watermark: Watermark) -> Result<Watermark> {
        let _guard = self.lock_for(direction).lock().await;

        if let Some(current) = self.storage.load(direction).await? {
            if watermark < current.watermark {
                warn!(
                    "Refusing to move watermark for '{}' backwards from {} to {}",
                    direction, current.watermark, watermark
                );
                return Ok(current.watermark);
            }
            if watermark == current.watermark {
                return Ok(watermark);
            }
        }

        self.storage
            .save(&WatermarkEntry::new(direction, watermark))
            .await?;
        debug!("Watermark for '{}' advanced to {}", direction, watermark);
        metrics::record_watermark(direction, watermark);
        Ok(watermark)
    }

    /// Forget the stored watermark; the next `get` seeds it again
    pub async fn reset(&self, direction: SyncDirection) -> Result<()> {
        let _guard = self.lock_for(direction).lock().await;
        self.storage.delete(direction).await?;
        info!("Reset watermark for direction '{}'", direction);
        Ok(())
    }

    /// Stored watermark without seeding
    pub async fn peek(&self, direction: SyncDirection) -> Result<Option<Watermark>> {
        Ok(self.storage.load(direction).await?.map(|e| e.watermark))
    }

    pub async fn is_healthy(&self) -> bool {
        self.storage.is_healthy().await
    }
}
