use serde::{Deserialize, Serialize};

mod api;
mod loader;
mod logging;
mod redis;
mod sync;
mod system;
mod watermark;

pub use api::*;
pub use loader::*;
pub use logging::*;
pub use redis::*;
pub use sync::*;
pub use system::*;
pub use watermark::*;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Application metadata
    #[serde(default)]
    pub app: AppConfig,

    /// System A (e.g. the first user directory)
    pub system_a: SystemConfig,

    /// System B
    pub system_b: SystemConfig,

    /// Sync behaviour shared by both directions
    #[serde(default)]
    pub sync: SyncConfig,

    /// Watermark persistence
    #[serde(default)]
    pub watermark: WatermarkStorageConfig,

    /// Operator API
    #[serde(default)]
    pub api: ApiConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Two in-memory systems with default options
    pub fn in_memory() -> Self {
        Self {
            app: AppConfig::default(),
            system_a: SystemConfig::memory("system-a"),
            system_b: SystemConfig::memory("system-b"),
            sync: SyncConfig::default(),
            watermark: WatermarkStorageConfig::Memory,
            api: ApiConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default = "default_name")]
    pub name: String,

    /// Start both schedulers when the service starts
    #[serde(default = "default_true")]
    pub auto_start: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            auto_start: true,
        }
    }
}

fn default_name() -> String {
    "user-bidirectional-sync".to_string()
}

fn default_true() -> bool {
    true
}
