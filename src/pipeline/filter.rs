use crate::config::SyncConfig;
use crate::models::Record;
use crate::system::SystemDescriptor;
use serde_json::Value;
use tracing::debug;

/// Why a polled record was or was not propagated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Propagate,
    /// Activity flag is false and the active-only filter is on
    Inactive,
    /// Last modified by the integration account itself
    OwnWrite,
}

impl FilterDecision {
    pub fn reason(&self) -> &'static str {
        match self {
            FilterDecision::Propagate => "propagate",
            FilterDecision::Inactive => "inactive",
            FilterDecision::OwnWrite => "own_write",
        }
    }
}

/// Active-only filter: false when the filter is on and the record is inactive.
/// A record without the flag counts as active.
pub fn should_propagate(record: &Record, config: &SyncConfig) -> bool {
    if !config.active_only_filter {
        return true;
    }
    !matches!(record.get(&config.active_field), Some(v) if is_false(v))
}

fn is_false(value: &Value) -> bool {
    match value {
        Value::Bool(b) => !b,
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "false" | "0"),
        Value::Number(n) => n.as_i64() == Some(0),
        _ => false,
    }
}

/// Decides which polled records of one source leave for the destination
#[derive(Debug, Clone)]
pub struct SyncFilter {
    config: SyncConfig,
    modified_by_field: Option<String>,
}

impl SyncFilter {
    pub fn new(config: SyncConfig, source: &SystemDescriptor) -> Self {
        Self {
            config,
            modified_by_field: source.modified_by_field.clone(),
        }
    }

    pub fn should_propagate(&self, record: &Record) -> bool {
        should_propagate(record, &self.config)
    }

    /// Modified-by check against the configured integration user
    pub fn is_own_write(&self, record: &Record) -> bool {
        match (
            &self.config.echo_suppression.integration_user,
            &self.modified_by_field,
        ) {
            (Some(user), Some(field)) => record.get_str(field) == Some(user.as_str()),
            _ => false,
        }
    }

    pub fn evaluate(&self, record: &Record) -> FilterDecision {
        if self.is_own_write(record) {
            debug!("Skipping record last modified by the integration user");
            return FilterDecision::OwnWrite;
        }
        if !self.should_propagate(record) {
            debug!("Skipping inactive record");
            return FilterDecision::Inactive;
        }
        FilterDecision::Propagate
    }
}
