use super::RedisConfig;
use serde::{Deserialize, Serialize};

/// Where watermarks are persisted
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WatermarkStorageConfig {
    /// Lost on restart; first run after a restart seeds from the default
    Memory,

    /// JSON document on local disk
    File { path: String },

    Redis(RedisConfig),
}

impl Default for WatermarkStorageConfig {
    fn default() -> Self {
        WatermarkStorageConfig::File {
            path: "usersync-watermarks.json".to_string(),
        }
    }
}
