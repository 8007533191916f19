// Sync filter tests

use serde_json::json;
use usersync::config::SyncConfig;
use usersync::models::{Record, SystemId};
use usersync::pipeline::{should_propagate, FilterDecision, SyncFilter};
use usersync::system::SystemDescriptor;

#[cfg(test)]
mod filter_tests {
    use super::*;

    fn with_active(value: serde_json::Value) -> Record {
        Record::new()
            .with("Email", "user@example.com")
            .with("IsActive", value)
    }

    #[test]
    fn test_active_only_filter() {
        let config = SyncConfig::default();

        assert!(should_propagate(&with_active(json!(true)), &config));
        assert!(!should_propagate(&with_active(json!(false)), &config));
        assert!(!should_propagate(&with_active(json!("false")), &config));
        assert!(!should_propagate(&with_active(json!("FALSE")), &config));
        assert!(!should_propagate(&with_active(json!("0")), &config));
        assert!(!should_propagate(&with_active(json!(0)), &config));
        assert!(should_propagate(&with_active(json!("true")), &config));
        assert!(should_propagate(&with_active(json!(1)), &config));
    }

    #[test]
    fn test_missing_flag_counts_as_active() {
        let record = Record::new().with("Email", "user@example.com");
        assert!(should_propagate(&record, &SyncConfig::default()));
        assert!(should_propagate(&with_active(json!(null)), &SyncConfig::default()));
    }

    #[test]
    fn test_filter_disabled_passes_everything() {
        let config = SyncConfig {
            active_only_filter: false,
            ..SyncConfig::default()
        };
        assert!(should_propagate(&with_active(json!(false)), &config));
    }

    #[test]
    fn test_custom_active_field() {
        let config = SyncConfig {
            active_field: "isActive".to_string(),
            ..SyncConfig::default()
        };
        let record = Record::new()
            .with("isActive", false)
            .with("IsActive", true);
        assert!(!should_propagate(&record, &config));
    }

    #[test]
    fn test_evaluate_detects_integration_user() {
        let mut config = SyncConfig::default();
        config.echo_suppression.integration_user = Some("integration-user".to_string());
        let source = SystemDescriptor::with_defaults(SystemId::B, "system-b");
        let filter = SyncFilter::new(config, &source);

        let own = with_active(json!(false)).with("LastModifiedById", "integration-user");
        assert!(filter.is_own_write(&own));
        // own-write wins over the inactive check
        assert_eq!(filter.evaluate(&own), FilterDecision::OwnWrite);

        let human = with_active(json!(true)).with("LastModifiedById", "someone");
        assert_eq!(filter.evaluate(&human), FilterDecision::Propagate);

        let inactive = with_active(json!(false)).with("LastModifiedById", "someone");
        assert_eq!(filter.evaluate(&inactive), FilterDecision::Inactive);
        assert_eq!(FilterDecision::Inactive.reason(), "inactive");
    }

    #[test]
    fn test_no_integration_user_means_no_own_writes() {
        let source = SystemDescriptor::with_defaults(SystemId::A, "system-a");
        let filter = SyncFilter::new(SyncConfig::default(), &source);
        let record = with_active(json!(true)).with("LastModifiedById", "integration-user");
        assert!(!filter.is_own_write(&record));
    }
}
