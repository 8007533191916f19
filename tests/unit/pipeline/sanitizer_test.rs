// Field sanitizer tests

use crate::unit::common::{user, TEST_EMAIL};
use std::collections::BTreeSet;
use usersync::config::SyncConfig;
use usersync::models::SystemId;
use usersync::pipeline::{sanitize, FieldSanitizer};
use usersync::system::SystemDescriptor;

#[cfg(test)]
mod sanitizer_tests {
    use super::*;

    fn excluded(fields: &[&str]) -> BTreeSet<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn test_removes_only_excluded_keys() {
        let record = user(TEST_EMAIL, "First", "Doctor");
        let clean = sanitize(&record, &excluded(&["type", "Username", "ProfileId"]));

        assert!(!clean.contains("type"));
        assert!(!clean.contains("Username"));
        assert!(!clean.contains("ProfileId"));
        assert_eq!(clean.get_str("Email"), Some(TEST_EMAIL));
        assert_eq!(clean.get_str("Title"), Some("Doctor"));
        assert_eq!(clean.len(), record.len() - 3);
        // input untouched
        assert!(record.contains("Username"));
    }

    #[test]
    fn test_is_idempotent() {
        let set = excluded(&["type", "Username"]);
        let once = sanitize(&user(TEST_EMAIL, "First", "Doctor"), &set);
        let twice = sanitize(&once, &set);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_direction_sanitizer_strips_system_fields() {
        let a = SystemDescriptor::with_defaults(SystemId::A, "system-a");
        let b = SystemDescriptor::with_defaults(SystemId::B, "system-b");
        let sanitizer = FieldSanitizer::for_direction(&SyncConfig::default(), &a, &b);

        let record = user(TEST_EMAIL, "First", "Doctor")
            .with("Id", "a-000001")
            .with("LastModifiedDate", "2024-01-01T00:00:00.000Z")
            .with("LastModifiedById", "local-user");
        let clean = sanitizer.sanitize(&record);

        for field in ["Id", "LastModifiedDate", "LastModifiedById", "type", "Username", "ProfileId"] {
            assert!(!clean.contains(field), "{} should be stripped", field);
        }
        assert_eq!(clean.get_str("Email"), Some(TEST_EMAIL));
        assert!(sanitizer.excluded().contains("ProfileId"));
    }

    #[test]
    fn test_identifier_is_never_excluded() {
        let a = SystemDescriptor::with_defaults(SystemId::A, "system-a");
        let b = SystemDescriptor::with_defaults(SystemId::B, "system-b");
        let config = SyncConfig {
            excluded_fields: vec!["Email".to_string(), "Username".to_string()],
            ..SyncConfig::default()
        };
        let sanitizer = FieldSanitizer::for_direction(&config, &a, &b);

        let clean = sanitizer.sanitize(&user(TEST_EMAIL, "First", "Doctor"));
        assert_eq!(clean.get_str("Email"), Some(TEST_EMAIL));
        assert!(!clean.contains("Username"));
    }
}
