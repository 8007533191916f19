// Watermark storage backend tests

use usersync::config::{RedisConfig, WatermarkStorageConfig};
use usersync::error::UserSyncError;
use usersync::models::{SyncDirection, Watermark};
use usersync::watermark::{
    create_storage, FileStorage, MemoryStorage, RedisStorage, WatermarkEntry, WatermarkStorage,
};

#[cfg(test)]
mod storage_tests {
    use super::*;

    fn entry(direction: SyncDirection, at: &str) -> WatermarkEntry {
        WatermarkEntry::new(direction, Watermark::parse(at).unwrap())
    }

    async fn exercise(storage: &dyn WatermarkStorage) {
        assert!(storage.load(SyncDirection::AToB).await.unwrap().is_none());

        storage
            .save(&entry(SyncDirection::AToB, "2024-01-01T00:00:00.000Z"))
            .await
            .unwrap();
        storage
            .save(&entry(SyncDirection::BToA, "2024-02-01T00:00:00.000Z"))
            .await
            .unwrap();

        let a_to_b = storage.load(SyncDirection::AToB).await.unwrap().unwrap();
        assert_eq!(a_to_b.watermark.to_rfc3339(), "2024-01-01T00:00:00.000Z");
        let b_to_a = storage.load(SyncDirection::BToA).await.unwrap().unwrap();
        assert_eq!(b_to_a.watermark.to_rfc3339(), "2024-02-01T00:00:00.000Z");

        storage.delete(SyncDirection::AToB).await.unwrap();
        assert!(storage.load(SyncDirection::AToB).await.unwrap().is_none());
        assert!(storage.load(SyncDirection::BToA).await.unwrap().is_some());
        assert!(storage.is_healthy().await);
    }

    #[tokio::test]
    async fn test_memory_storage_basic_operations() {
        exercise(&MemoryStorage::new()).await;
    }

    #[tokio::test]
    async fn test_file_storage_basic_operations() {
        let dir = tempfile::tempdir().unwrap();
        exercise(&FileStorage::new(dir.path().join("watermarks.json"))).await;
    }

    #[tokio::test]
    async fn test_file_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("watermarks.json");

        {
            let storage = FileStorage::new(&path);
            storage
                .save(&entry(SyncDirection::BToA, "2024-03-01T12:00:00.250Z"))
                .await
                .unwrap();
        }

        let reopened = FileStorage::new(&path);
        let loaded = reopened.load(SyncDirection::BToA).await.unwrap().unwrap();
        assert_eq!(loaded.watermark.to_rfc3339(), "2024-03-01T12:00:00.250Z");
        assert_eq!(loaded.direction, SyncDirection::BToA);

        // no temp file left behind
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_file_storage_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watermarks.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let storage = FileStorage::new(&path);
        assert!(storage.load(SyncDirection::AToB).await.is_err());
        assert!(!storage.is_healthy().await);
    }

    #[test]
    fn test_redis_keys_are_namespaced_per_direction() {
        assert_eq!(
            RedisStorage::key_for("usersync", SyncDirection::AToB),
            "usersync:watermark:a_to_b"
        );
        assert_eq!(
            RedisStorage::key_for("tenant-1", SyncDirection::BToA),
            "tenant-1:watermark:b_to_a"
        );
    }

    #[tokio::test]
    async fn test_redis_storage_rejects_invalid_url() {
        let config = RedisConfig {
            url: "not a redis url".to_string(),
            key_prefix: "usersync".to_string(),
        };
        let result = RedisStorage::connect(&config).await;
        assert!(matches!(result, Err(UserSyncError::Configuration(_))));

        let result = create_storage(&WatermarkStorageConfig::Redis(config)).await;
        assert!(matches!(result, Err(UserSyncError::Configuration(_))));
    }

    // Runs against a live server only when USERSYNC_TEST_REDIS_URL is set
    #[tokio::test]
    async fn test_redis_storage_basic_operations() {
        let Ok(url) = std::env::var("USERSYNC_TEST_REDIS_URL") else {
            return;
        };
        let config = RedisConfig {
            url,
            key_prefix: format!("usersync-test-{}", uuid::Uuid::new_v4()),
        };
        let storage = RedisStorage::connect(&config).await.unwrap();

        exercise(&storage).await;
        storage.delete(SyncDirection::BToA).await.unwrap();
    }
}
