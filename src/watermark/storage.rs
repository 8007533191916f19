use crate::config::RedisConfig;
use crate::error::{Result, UserSyncError};
use crate::models::{SyncDirection, Watermark};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Persisted watermark of one direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatermarkEntry {
    pub direction: SyncDirection,
    pub watermark: Watermark,
    pub updated_at: DateTime<Utc>,
}

impl WatermarkEntry {
    pub fn new(direction: SyncDirection, watermark: Watermark) -> Self {
        Self {
            direction,
            watermark,
            updated_at: Utc::now(),
        }
    }
}

/// Trait for watermark storage backends
#[async_trait]
pub trait WatermarkStorage: Send + Sync {
    async fn save(&self, entry: &WatermarkEntry) -> Result<()>;

    async fn load(&self, direction: SyncDirection) -> Result<Option<WatermarkEntry>>;

    async fn delete(&self, direction: SyncDirection) -> Result<()>;

    async fn is_healthy(&self) -> bool;
}

/// In-memory storage (tests and throwaway runs)
pub struct MemoryStorage {
    entries: Arc<RwLock<HashMap<SyncDirection, WatermarkEntry>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WatermarkStorage for MemoryStorage {
    async fn save(&self, entry: &WatermarkEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(entry.direction, entry.clone());
        debug!("Saved watermark {} for direction '{}'", entry.watermark, entry.direction);
        Ok(())
    }

    async fn load(&self, direction: SyncDirection) -> Result<Option<WatermarkEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.get(&direction).cloned())
    }

    async fn delete(&self, direction: SyncDirection) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.remove(&direction);
        debug!("Deleted watermark for direction '{}'", direction);
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}

/// JSON file storage; survives process restarts
pub struct FileStorage {
    path: PathBuf,
    // serializes read-modify-write cycles on the file
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<HashMap<SyncDirection, WatermarkEntry>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(UserSyncError::Io(e)),
        }
    }

    async fn write_all(&self, entries: &HashMap<SyncDirection, WatermarkEntry>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(entries)?;
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl WatermarkStorage for FileStorage {
    async fn save(&self, entry: &WatermarkEntry) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        entries.insert(entry.direction, entry.clone());
        self.write_all(&entries).await?;
        debug!(
            "Saved watermark {} for direction '{}' to {}",
            entry.watermark,
            entry.direction,
            self.path.display()
        );
        Ok(())
    }

    async fn load(&self, direction: SyncDirection) -> Result<Option<WatermarkEntry>> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        Ok(entries.remove(&direction))
    }

    async fn delete(&self, direction: SyncDirection) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        if entries.remove(&direction).is_some() {
            self.write_all(&entries).await?;
        }
        debug!("Deleted watermark for direction '{}'", direction);
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        let _guard = self.lock.lock().await;
        self.read_all().await.is_ok()
    }
}

/// Redis-based storage (for distributed deployments).
///
/// One [`ConnectionManager`] is shared by all calls and reconnects on its own
/// after the server goes away. Entries never expire.
pub struct RedisStorage {
    manager: ConnectionManager,
    key_prefix: String,
}

impl RedisStorage {
    /// Open the client, connect and check the server answers `PING`
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str()).map_err(|e| {
            UserSyncError::Configuration(format!("Failed to create Redis client: {}", e))
        })?;

        let mut manager = ConnectionManager::new(client)
            .await
            .map_err(|e| UserSyncError::Redis(format!("Failed to connect to Redis: {}", e)))?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut manager)
            .await
            .map_err(|e| UserSyncError::Redis(format!("Redis ping failed: {}", e)))?;

        info!("Connected to Redis for watermark storage");
        Ok(Self {
            manager,
            key_prefix: config.key_prefix.clone(),
        })
    }

    /// Key holding a direction's watermark: `<prefix>:watermark:<direction>`
    pub fn key_for(key_prefix: &str, direction: SyncDirection) -> String {
        format!("{}:watermark:{}", key_prefix, direction)
    }

    fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

#[async_trait]
impl WatermarkStorage for RedisStorage {
    async fn save(&self, entry: &WatermarkEntry) -> Result<()> {
        let key = Self::key_for(&self.key_prefix, entry.direction);
        let value = serde_json::to_string(entry)?;

        self.connection()
            .set::<_, _, ()>(&key, value)
            .await
            .map_err(|e| UserSyncError::Redis(format!("Failed to save watermark: {}", e)))?;

        debug!("Saved watermark {} for direction '{}' to Redis", entry.watermark, entry.direction);
        Ok(())
    }

    async fn load(&self, direction: SyncDirection) -> Result<Option<WatermarkEntry>> {
        let key = Self::key_for(&self.key_prefix, direction);

        let value: Option<String> = self
            .connection()
            .get(&key)
            .await
            .map_err(|e| UserSyncError::Redis(format!("Failed to load watermark: {}", e)))?;

        match value {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, direction: SyncDirection) -> Result<()> {
        let key = Self::key_for(&self.key_prefix, direction);

        self.connection()
            .del::<_, ()>(&key)
            .await
            .map_err(|e| UserSyncError::Redis(format!("Failed to delete watermark: {}", e)))?;

        debug!("Deleted watermark for direction '{}' from Redis", direction);
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        redis::cmd("PING")
            .query_async::<_, String>(&mut self.connection())
            .await
            .is_ok()
    }
}
