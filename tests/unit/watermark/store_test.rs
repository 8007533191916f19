// Watermark store tests

use std::sync::Arc;
use usersync::models::{SyncDirection, Watermark};
use usersync::watermark::{FileStorage, MemoryStorage, WatermarkStore};

#[cfg(test)]
mod store_tests {
    use super::*;

    fn wm(at: &str) -> Watermark {
        Watermark::parse(at).unwrap()
    }

    fn store_with_default(default: Option<Watermark>) -> WatermarkStore {
        WatermarkStore::new(Arc::new(MemoryStorage::new()), default)
    }

    #[tokio::test]
    async fn test_first_get_seeds_configured_default() {
        let default = wm("2024-01-01T00:00:00.000Z");
        let store = store_with_default(Some(default));

        assert_eq!(store.peek(SyncDirection::AToB).await.unwrap(), None);
        assert_eq!(store.get(SyncDirection::AToB).await.unwrap(), default);
        // the seed is persisted
        assert_eq!(store.peek(SyncDirection::AToB).await.unwrap(), Some(default));
    }

    #[tokio::test]
    async fn test_first_get_without_default_seeds_now() {
        let store = store_with_default(None);
        let before = Watermark::now();
        let seeded = store.get(SyncDirection::BToA).await.unwrap();
        let after = Watermark::now();

        assert!(seeded >= before && seeded <= after);
        // stable once seeded
        assert_eq!(store.get(SyncDirection::BToA).await.unwrap(), seeded);
    }

    #[tokio::test]
    async fn test_set_never_moves_backwards() {
        let store = store_with_default(Some(wm("2024-01-01T00:00:00.000Z")));
        let forward = wm("2024-06-01T00:00:00.000Z");

        assert_eq!(store.set(SyncDirection::AToB, forward).await.unwrap(), forward);
        let kept = store
            .set(SyncDirection::AToB, wm("2024-03-01T00:00:00.000Z"))
            .await
            .unwrap();
        assert_eq!(kept, forward);
        assert_eq!(store.get(SyncDirection::AToB).await.unwrap(), forward);
    }

    #[tokio::test]
    async fn test_directions_are_independent() {
        let store = store_with_default(Some(wm("2024-01-01T00:00:00.000Z")));
        store
            .set(SyncDirection::AToB, wm("2024-05-01T00:00:00.000Z"))
            .await
            .unwrap();

        assert_eq!(
            store.get(SyncDirection::BToA).await.unwrap(),
            wm("2024-01-01T00:00:00.000Z")
        );
    }

    #[tokio::test]
    async fn test_reset_reseeds_on_next_get() {
        let default = wm("2024-01-01T00:00:00.000Z");
        let store = store_with_default(Some(default));
        store
            .set(SyncDirection::AToB, wm("2024-05-01T00:00:00.000Z"))
            .await
            .unwrap();

        store.reset(SyncDirection::AToB).await.unwrap();
        assert_eq!(store.peek(SyncDirection::AToB).await.unwrap(), None);
        assert_eq!(store.get(SyncDirection::AToB).await.unwrap(), default);
    }

    #[tokio::test]
    async fn test_file_backed_store_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watermarks.json");
        let advanced = wm("2024-07-04T08:15:30.500Z");

        {
            let store = WatermarkStore::new(Arc::new(FileStorage::new(&path)), None);
            store.set(SyncDirection::AToB, advanced).await.unwrap();
        }

        let restarted = WatermarkStore::new(
            Arc::new(FileStorage::new(&path)),
            Some(wm("2020-01-01T00:00:00.000Z")),
        );
        assert_eq!(restarted.get(SyncDirection::AToB).await.unwrap(), advanced);
        assert!(restarted.is_healthy().await);
    }
}
