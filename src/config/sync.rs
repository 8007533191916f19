use crate::error::Result;
use crate::models::Watermark;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Options shared by both sync directions; built once at startup
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncConfig {
    /// Max records requested per poll page and per submitted batch
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Trigger cadence for each direction's scheduler
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Initial watermark (ISO-8601 UTC); process start time when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watermark_default_expression: Option<String>,

    /// Fields never propagated from one system to the other
    #[serde(default = "default_excluded_fields")]
    pub excluded_fields: Vec<String>,

    /// Drop inactive records from the outbound batch
    #[serde(default = "default_true")]
    pub active_only_filter: bool,

    /// Name of the activity flag field
    #[serde(default = "default_active_field")]
    pub active_field: String,

    /// How long to wait for a batch job to terminate
    #[serde(default = "default_batch_timeout_ms")]
    pub batch_timeout_ms: u64,

    /// How often to check a batch job's status while waiting
    #[serde(default = "default_batch_poll_interval_ms")]
    pub batch_poll_interval_ms: u64,

    /// Concurrent upserts within one batch job
    #[serde(default = "default_upsert_concurrency")]
    pub upsert_concurrency: usize,

    #[serde(default)]
    pub echo_suppression: EchoSuppressionConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            poll_interval_ms: default_poll_interval_ms(),
            watermark_default_expression: None,
            excluded_fields: default_excluded_fields(),
            active_only_filter: true,
            active_field: default_active_field(),
            batch_timeout_ms: default_batch_timeout_ms(),
            batch_poll_interval_ms: default_batch_poll_interval_ms(),
            upsert_concurrency: default_upsert_concurrency(),
            echo_suppression: EchoSuppressionConfig::default(),
        }
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_timeout_ms)
    }

    pub fn batch_poll_interval(&self) -> Duration {
        Duration::from_millis(self.batch_poll_interval_ms)
    }

    pub fn excluded_field_set(&self) -> BTreeSet<String> {
        self.excluded_fields.iter().cloned().collect()
    }

    /// Parsed default watermark, if one is configured
    pub fn default_watermark(&self) -> Result<Option<Watermark>> {
        self.watermark_default_expression
            .as_deref()
            .map(Watermark::parse)
            .transpose()
    }
}

/// Suppression of changes that the integration itself wrote
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EchoSuppressionConfig {
    /// Skip records we wrote ourselves, matched by identifier and last-modified
    #[serde(default = "default_true")]
    pub track_writes: bool,

    /// Skip records last modified by this user (the integration account)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration_user: Option<String>,
}

impl Default for EchoSuppressionConfig {
    fn default() -> Self {
        Self {
            track_writes: true,
            integration_user: None,
        }
    }
}

fn default_page_size() -> usize {
    1000
}
fn default_poll_interval_ms() -> u64 {
    10_000
}
fn default_excluded_fields() -> Vec<String> {
    vec!["type", "Username", "ProfileId"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_active_field() -> String {
    "IsActive".to_string()
}
fn default_batch_timeout_ms() -> u64 {
    60_000
}
fn default_batch_poll_interval_ms() -> u64 {
    500
}
fn default_upsert_concurrency() -> usize {
    4
}
fn default_true() -> bool {
    true
}
