// Boundary ledger tests

use std::collections::HashSet;
use usersync::delivery::BoundaryLedger;
use usersync::models::{SyncDirection, Watermark};

#[cfg(test)]
mod boundary_tests {
    use super::*;

    fn ids(values: &[&str]) -> HashSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_only_same_identifier_at_same_timestamp() {
        let ledger = BoundaryLedger::new();
        let boundary = Watermark::parse("2024-01-01T00:00:00.000Z").unwrap();
        let later = Watermark::parse("2024-01-01T00:00:00.001Z").unwrap();
        ledger
            .commit(SyncDirection::AToB, boundary, ids(&["a@example.com"]))
            .await;

        assert!(ledger.already_delivered(SyncDirection::AToB, "a@example.com", Some(boundary)).await);
        assert!(!ledger.already_delivered(SyncDirection::AToB, "a@example.com", Some(later)).await);
        assert!(!ledger.already_delivered(SyncDirection::AToB, "b@example.com", Some(boundary)).await);
        assert!(!ledger.already_delivered(SyncDirection::AToB, "a@example.com", None).await);
        assert!(!ledger.already_delivered(SyncDirection::BToA, "a@example.com", Some(boundary)).await);
    }

    #[tokio::test]
    async fn test_commit_replaces_and_reset_clears() {
        let ledger = BoundaryLedger::new();
        let first = Watermark::parse("2024-01-01T00:00:00.000Z").unwrap();
        let second = Watermark::parse("2024-02-01T00:00:00.000Z").unwrap();

        ledger.commit(SyncDirection::AToB, first, ids(&["a@example.com"])).await;
        ledger.commit(SyncDirection::AToB, second, ids(&["b@example.com"])).await;
        assert!(!ledger.already_delivered(SyncDirection::AToB, "a@example.com", Some(first)).await);
        assert!(ledger.already_delivered(SyncDirection::AToB, "b@example.com", Some(second)).await);

        ledger.reset(SyncDirection::AToB).await;
        assert!(!ledger.already_delivered(SyncDirection::AToB, "b@example.com", Some(second)).await);
    }
}
