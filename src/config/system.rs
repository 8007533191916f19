use serde::{Deserialize, Serialize};

/// Connection and field layout of one synchronized system
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SystemConfig {
    /// Display name used in logs and metrics
    pub name: String,

    #[serde(flatten)]
    pub kind: SystemKind,

    /// Business identifier used to match records across systems
    #[serde(default = "default_identifier_field")]
    pub identifier_field: String,

    /// System-managed primary key, never propagated
    #[serde(default = "default_primary_key_field")]
    pub primary_key_field: String,

    #[serde(default = "default_last_modified_field")]
    pub last_modified_field: String,

    #[serde(default = "default_modified_by_field")]
    pub modified_by_field: Option<String>,
}

impl SystemConfig {
    pub fn memory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SystemKind::Memory,
            identifier_field: default_identifier_field(),
            primary_key_field: default_primary_key_field(),
            last_modified_field: default_last_modified_field(),
            modified_by_field: default_modified_by_field(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SystemKind {
    /// In-process store, for local runs and tests
    Memory,

    /// JSON over HTTP
    Http(HttpSystemConfig),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpSystemConfig {
    pub base_url: String,

    /// Path of the record collection below `base_url`
    #[serde(default = "default_resource")]
    pub resource: String,

    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_identifier_field() -> String {
    "Email".to_string()
}
fn default_primary_key_field() -> String {
    "Id".to_string()
}
fn default_last_modified_field() -> String {
    "LastModifiedDate".to_string()
}
fn default_modified_by_field() -> Option<String> {
    Some("LastModifiedById".to_string())
}
fn default_resource() -> String {
    "users".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_connect_timeout_secs() -> u64 {
    10
}
