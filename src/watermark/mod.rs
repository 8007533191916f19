pub mod storage;
pub mod store;

pub use storage::{FileStorage, MemoryStorage, RedisStorage, WatermarkEntry, WatermarkStorage};
pub use store::WatermarkStore;

use crate::config::WatermarkStorageConfig;
use crate::error::Result;
use std::sync::Arc;

/// Build the configured storage backend, connecting where needed
pub async fn create_storage(config: &WatermarkStorageConfig) -> Result<Arc<dyn WatermarkStorage>> {
    match config {
        WatermarkStorageConfig::Memory => Ok(Arc::new(MemoryStorage::new())),
        WatermarkStorageConfig::File { path } => Ok(Arc::new(FileStorage::new(path))),
        WatermarkStorageConfig::Redis(redis) => Ok(Arc::new(RedisStorage::connect(redis).await?)),
    }
}
