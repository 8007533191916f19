// Configuration loader tests

use usersync::config::{
    Config, ConfigLoader, LogFormat, SystemKind, WatermarkStorageConfig,
};
use usersync::error::UserSyncError;
use usersync::models::Watermark;

#[cfg(test)]
mod loader_tests {
    use super::*;

    const MINIMAL: &str = r#"
system_a:
  name: org-a
  type: memory
system_b:
  name: org-b
  type: memory
"#;

    fn validation_message(yaml: &str) -> String {
        match ConfigLoader::from_yaml(yaml) {
            Err(UserSyncError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = ConfigLoader::from_yaml(MINIMAL).unwrap();

        assert_eq!(config.app.name, "user-bidirectional-sync");
        assert!(config.app.auto_start);
        assert_eq!(config.system_a.identifier_field, "Email");
        assert_eq!(config.system_a.primary_key_field, "Id");
        assert_eq!(config.system_a.last_modified_field, "LastModifiedDate");
        assert!(matches!(config.system_b.kind, SystemKind::Memory));

        let sync = &config.sync;
        assert_eq!(sync.page_size, 1000);
        assert_eq!(sync.poll_interval_ms, 10_000);
        assert_eq!(sync.batch_timeout_ms, 60_000);
        assert_eq!(sync.batch_poll_interval_ms, 500);
        assert!(sync.active_only_filter);
        assert_eq!(sync.active_field, "IsActive");
        assert_eq!(
            sync.excluded_fields,
            vec!["type".to_string(), "Username".to_string(), "ProfileId".to_string()]
        );
        assert!(sync.echo_suppression.track_writes);
        assert!(sync.default_watermark().unwrap().is_none());

        assert!(matches!(config.watermark, WatermarkStorageConfig::File { .. }));
        assert_eq!(config.api.port, 7801);
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
app:
  name: users
  auto_start: false
system_a:
  name: org-a
  type: http
  base_url: https://a.example.com/api
  api_key: secret
  identifier_field: EmailAddress
system_b:
  name: org-b
  type: memory
  modified_by_field: null
sync:
  page_size: 200
  watermark_default_expression: "2024-01-01T00:00:00.000Z"
  echo_suppression:
    integration_user: integration
watermark:
  type: redis
  url: redis://localhost:6379
logging:
  level: debug
  format: json
"#;
        let config = ConfigLoader::from_yaml(yaml).unwrap();

        assert!(!config.app.auto_start);
        match &config.system_a.kind {
            SystemKind::Http(http) => {
                assert_eq!(http.base_url, "https://a.example.com/api");
                assert_eq!(http.resource, "users");
                assert_eq!(http.api_key.as_deref(), Some("secret"));
                assert_eq!(http.timeout_secs, 30);
            }
            other => panic!("expected http system, got {:?}", other),
        }
        assert_eq!(config.system_a.identifier_field, "EmailAddress");
        assert!(config.system_b.modified_by_field.is_none());
        assert_eq!(config.sync.page_size, 200);
        assert_eq!(
            config.sync.default_watermark().unwrap(),
            Some(Watermark::parse("2024-01-01T00:00:00.000Z").unwrap())
        );
        assert_eq!(
            config.sync.echo_suppression.integration_user.as_deref(),
            Some("integration")
        );
        match &config.watermark {
            WatermarkStorageConfig::Redis(redis) => {
                assert_eq!(redis.url, "redis://localhost:6379");
                assert_eq!(redis.key_prefix, "usersync");
            }
            other => panic!("expected redis storage, got {:?}", other),
        }
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_validation_collects_all_problems() {
        let yaml = r#"
system_a:
  name: org-a
  type: http
  base_url: ""
  identifier_field: ""
system_b:
  name: org-b
  type: memory
sync:
  page_size: 0
  batch_timeout_ms: 0
  watermark_default_expression: "yesterday"
"#;
        let msg = validation_message(yaml);
        assert!(msg.contains("system_a.base_url"));
        assert!(msg.contains("system_a.identifier_field"));
        assert!(msg.contains("page_size"));
        assert!(msg.contains("batch_timeout_ms"));
        assert!(msg.contains("watermark_default_expression"));
    }

    #[test]
    fn test_identifier_cannot_be_excluded() {
        let yaml = r#"
system_a:
  name: org-a
  type: memory
system_b:
  name: org-b
  type: memory
sync:
  excluded_fields: [Email, Username]
"#;
        assert!(validation_message(yaml).contains("identifier field"));
    }

    #[test]
    fn test_redis_storage_requires_url() {
        let yaml = r#"
system_a:
  name: org-a
  type: memory
system_b:
  name: org-b
  type: memory
watermark:
  type: redis
  url: ""
"#;
        assert!(validation_message(yaml).contains("watermark.url"));
    }

    #[test]
    fn test_unknown_system_type_is_rejected() {
        let yaml = r#"
system_a:
  name: org-a
  type: ldap
system_b:
  name: org-b
  type: memory
"#;
        assert!(matches!(
            ConfigLoader::from_yaml(yaml),
            Err(UserSyncError::Yaml(_))
        ));
    }

    #[test]
    fn test_sample_config_is_valid() {
        let config = ConfigLoader::from_yaml(ConfigLoader::generate_sample()).unwrap();
        assert_eq!(config.system_a.name, "org-a");
        assert_eq!(config.sync.page_size, 1000);
        assert!(matches!(config.system_b.kind, SystemKind::Http(_)));
    }

    #[test]
    fn test_in_memory_config_is_valid() {
        let config = Config::in_memory();
        assert!(ConfigLoader::validate(&config).is_ok());
        assert!(matches!(config.watermark, WatermarkStorageConfig::Memory));
    }
}
