// Scheduler tests

use crate::unit::common::{sync_config, user, Harness, TEST_EMAIL};
use std::time::Duration;
use usersync::models::SyncDirection;

#[cfg(test)]
mod scheduler_tests {
    use super::*;

    async fn wait_until<F, Fut>(mut condition: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for _ in 0..100 {
            if condition().await {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_start_runs_periodically_and_stop_halts() {
        let harness = Harness::new(sync_config());
        let scheduler = harness.scheduler();

        assert!(!scheduler.is_running(SyncDirection::AToB).await);
        assert!(scheduler.start(SyncDirection::AToB).await);
        assert!(!scheduler.start(SyncDirection::AToB).await);
        assert!(scheduler.is_running(SyncDirection::AToB).await);
        assert!(!scheduler.is_running(SyncDirection::BToA).await);

        harness.a.seed(user(TEST_EMAIL, "Scheduled", "Doctor")).await.unwrap();
        let b = harness.b.clone();
        assert!(wait_until(|| { let b = b.clone(); async move { b.get(TEST_EMAIL).await.is_some() } }).await);

        assert!(scheduler.stop(SyncDirection::AToB).await);
        assert!(!scheduler.is_running(SyncDirection::AToB).await);
        assert!(!scheduler.stop(SyncDirection::AToB).await);

        // no more runs once stopped
        let runs = harness
            .orchestrator()
            .status(SyncDirection::AToB)
            .await
            .runs_succeeded;
        tokio::time::sleep(Duration::from_millis(200)).await;
        let later = harness
            .orchestrator()
            .status(SyncDirection::AToB)
            .await
            .runs_succeeded;
        assert_eq!(runs, later);
    }

    #[tokio::test]
    async fn test_stop_waits_for_in_flight_run() {
        let harness = Harness::new(sync_config());
        let scheduler = harness.scheduler();

        harness.a.seed(user(TEST_EMAIL, "Slow", "Doctor")).await.unwrap();
        harness
            .b
            .set_write_delay(Some(Duration::from_millis(300)))
            .await;

        scheduler.start(SyncDirection::AToB).await;
        // first tick fires immediately
        tokio::time::sleep(Duration::from_millis(80)).await;
        scheduler.stop(SyncDirection::AToB).await;

        assert!(harness.b.get(TEST_EMAIL).await.is_some());
        let status = harness.orchestrator().status(SyncDirection::AToB).await;
        assert_eq!(status.runs_succeeded, 1);
        assert_eq!(status.runs_failed, 0);
    }

    #[tokio::test]
    async fn test_shutdown_stops_every_direction() {
        let harness = Harness::new(sync_config());
        let scheduler = harness.scheduler();

        scheduler.start_all().await;
        assert!(scheduler.is_running(SyncDirection::AToB).await);
        assert!(scheduler.is_running(SyncDirection::BToA).await);

        scheduler.shutdown().await;
        assert!(!scheduler.is_running(SyncDirection::AToB).await);
        assert!(!scheduler.is_running(SyncDirection::BToA).await);
    }

    #[tokio::test]
    async fn test_manual_run_once() {
        let harness = Harness::new(sync_config());
        harness.b.seed(user(TEST_EMAIL, "Manual", "Doctor")).await.unwrap();

        let report = harness
            .scheduler()
            .run_once(SyncDirection::BToA)
            .await
            .unwrap();
        assert_eq!(report.upserted, 1);
        assert!(harness.a.get(TEST_EMAIL).await.is_some());
    }
}
