use super::{Config, SystemConfig, SystemKind, WatermarkStorageConfig};
use crate::error::{Result, UserSyncError};
use config::{Config as ConfigBuilder, Environment, File};
use std::env;
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load() -> Result<Config> {
        let mut builder = ConfigBuilder::builder();

        // Load from config file if specified
        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path));
        } else {
            let config_files = ["config.yaml", "config.yml", "usersync.yaml", "usersync.yml"];
            for file in &config_files {
                if Path::new(file).exists() {
                    builder = builder.add_source(File::with_name(file));
                    break;
                }
            }
        }

        // Load environment-specific config
        if let Ok(env_name) = env::var("APP_ENV") {
            let env_configs = [
                format!("config.{}.yaml", env_name),
                format!("config.{}.yml", env_name),
            ];

            for file in &env_configs {
                if Path::new(file).exists() {
                    builder = builder.add_source(File::with_name(file));
                    break;
                }
            }
        }

        // USERSYNC__SYNC__PAGE_SIZE=500 becomes sync.page_size
        builder = builder.add_source(
            Environment::with_prefix("USERSYNC")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| UserSyncError::Configuration(format!("Failed to build config: {}", e)))?;

        let config: Config = config.try_deserialize().map_err(|e| {
            UserSyncError::Configuration(format!("Failed to deserialize config: {}", e))
        })?;

        Self::validate(&config)?;

        Ok(config)
    }

    /// Load configuration from a specific file, still honouring env overrides
    pub fn load_from_file(path: &str) -> Result<Config> {
        let config = ConfigBuilder::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("USERSYNC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| UserSyncError::Configuration(format!("Failed to build config: {}", e)))?;

        let config: Config = config.try_deserialize().map_err(|e| {
            UserSyncError::Configuration(format!("Failed to deserialize config: {}", e))
        })?;

        Self::validate(&config)?;

        Ok(config)
    }

    /// Parse a YAML document without touching files or the environment
    pub fn from_yaml(yaml: &str) -> Result<Config> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Collect every configuration problem; any problem is fatal at startup
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_system("system_a", &config.system_a, &mut errors);
        Self::validate_system("system_b", &config.system_b, &mut errors);

        let sync = &config.sync;
        if sync.page_size == 0 {
            errors.push("sync.page_size must be > 0".to_string());
        }
        if sync.poll_interval_ms == 0 {
            errors.push("sync.poll_interval_ms must be > 0".to_string());
        }
        if sync.batch_timeout_ms == 0 {
            errors.push("sync.batch_timeout_ms must be > 0".to_string());
        }
        if sync.batch_poll_interval_ms == 0 {
            errors.push("sync.batch_poll_interval_ms must be > 0".to_string());
        }
        if sync.upsert_concurrency == 0 {
            errors.push("sync.upsert_concurrency must be > 0".to_string());
        }
        if sync.active_only_filter && sync.active_field.trim().is_empty() {
            errors.push("sync.active_field cannot be empty when active_only_filter is set".to_string());
        }
        if let Err(e) = sync.default_watermark() {
            errors.push(format!("sync.watermark_default_expression: {}", e));
        }
        if sync
            .excluded_fields
            .iter()
            .any(|f| f == &config.system_a.identifier_field || f == &config.system_b.identifier_field)
        {
            errors.push("sync.excluded_fields cannot contain the identifier field".to_string());
        }

        match &config.watermark {
            WatermarkStorageConfig::File { path } if path.trim().is_empty() => {
                errors.push("watermark.path cannot be empty".to_string());
            }
            WatermarkStorageConfig::Redis(redis) if redis.url.is_empty() => {
                errors.push("watermark.url cannot be empty for redis storage".to_string());
            }
            _ => {}
        }

        if config.api.enabled && config.api.port == 0 {
            errors.push("API port must be > 0".to_string());
        }

        if !errors.is_empty() {
            return Err(UserSyncError::Validation(errors.join(", ")));
        }

        Ok(())
    }

    fn validate_system(label: &str, system: &SystemConfig, errors: &mut Vec<String>) {
        if system.name.trim().is_empty() {
            errors.push(format!("{}.name cannot be empty", label));
        }
        if system.identifier_field.trim().is_empty() {
            errors.push(format!("{}.identifier_field cannot be empty", label));
        }
        if system.primary_key_field.trim().is_empty() {
            errors.push(format!("{}.primary_key_field cannot be empty", label));
        }
        if system.last_modified_field.trim().is_empty() {
            errors.push(format!("{}.last_modified_field cannot be empty", label));
        }
        if let SystemKind::Http(http) = &system.kind {
            if http.base_url.trim().is_empty() {
                errors.push(format!("{}.base_url cannot be empty", label));
            }
            if http.timeout_secs == 0 {
                errors.push(format!("{}.timeout_secs must be > 0", label));
            }
        }
    }

    /// Create a sample configuration file
    pub fn generate_sample() -> &'static str {
        r#"# usersync configuration example
# Copy this file to config.yaml and adjust for your environment

app:
  name: user-bidirectional-sync
  auto_start: true

system_a:
  name: org-a
  type: http
  base_url: https://a.example.com/api
  resource: users
  api_key: ${SYSTEM_A_API_KEY}
  identifier_field: Email
  primary_key_field: Id
  last_modified_field: LastModifiedDate
  modified_by_field: LastModifiedById

system_b:
  name: org-b
  type: http
  base_url: https://b.example.com/api
  resource: users
  api_key: ${SYSTEM_B_API_KEY}

sync:
  page_size: 1000
  poll_interval_ms: 10000
  # watermark_default_expression: "2024-01-01T00:00:00.000Z"
  excluded_fields:
    - type
    - Username
    - ProfileId
  active_only_filter: true
  active_field: IsActive
  batch_timeout_ms: 60000
  batch_poll_interval_ms: 500
  upsert_concurrency: 4
  echo_suppression:
    track_writes: true
    # integration_user: 005000000000001

watermark:
  type: file
  path: ./usersync-watermarks.json
  # type: redis
  # url: redis://localhost:6379
  # key_prefix: usersync

api:
  enabled: true
  host: 127.0.0.1
  port: 7801

logging:
  level: info
  format: text  # text, json, or pretty
"#
    }
}
