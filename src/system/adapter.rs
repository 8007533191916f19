use crate::config::SystemConfig;
use crate::error::Result;
use crate::models::{Record, SystemId, Watermark};
use async_trait::async_trait;

/// Field layout of one system
#[derive(Debug, Clone)]
pub struct SystemDescriptor {
    pub id: SystemId,
    pub name: String,
    pub identifier_field: String,
    pub primary_key_field: String,
    pub last_modified_field: String,
    pub modified_by_field: Option<String>,
}

impl SystemDescriptor {
    pub fn from_config(id: SystemId, config: &SystemConfig) -> Self {
        Self {
            id,
            name: config.name.clone(),
            identifier_field: config.identifier_field.clone(),
            primary_key_field: config.primary_key_field.clone(),
            last_modified_field: config.last_modified_field.clone(),
            modified_by_field: config.modified_by_field.clone(),
        }
    }

    /// Descriptor with the default field names
    pub fn with_defaults(id: SystemId, name: impl Into<String>) -> Self {
        Self::from_config(id, &SystemConfig::memory(name))
    }

    /// Fields the system manages itself and that must never be copied out
    pub fn system_managed_fields(&self) -> Vec<String> {
        let mut fields = vec![
            self.primary_key_field.clone(),
            self.last_modified_field.clone(),
        ];
        if let Some(modified_by) = &self.modified_by_field {
            fields.push(modified_by.clone());
        }
        fields
    }
}

/// Position of the last record read, for keyset paging over
/// `(last_modified, primary_key)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageKey {
    pub last_modified: Watermark,
    pub primary_key: String,
}

/// Outcome of a single write, as reported by the destination
#[derive(Debug, Clone, PartialEq)]
pub struct WriteReceipt {
    pub primary_key: String,
    /// Last-modified stamp the destination assigned to the write
    pub last_modified: Option<Watermark>,
}

/// A system holding user records; reached through a connector this crate does
/// not own (HTTP service, in-memory store, ...)
#[async_trait]
pub trait SystemConnector: Send + Sync {
    fn descriptor(&self) -> &SystemDescriptor;

    /// One page of records modified at or after `since`, ordered by
    /// `(last_modified, primary_key)` ascending. With `after`, only records
    /// strictly past that key are returned.
    async fn fetch_changes(
        &self,
        since: Watermark,
        after: Option<&PageKey>,
        limit: usize,
    ) -> Result<Vec<Record>>;

    /// Look a record up by business identifier; `None` when absent
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Record>>;

    /// Create a record
    async fn insert(&self, record: Record) -> Result<WriteReceipt>;

    /// Overwrite the given fields of an existing record, keeping all others
    async fn update(&self, primary_key: &str, fields: Record) -> Result<WriteReceipt>;

    async fn health_check(&self) -> Result<bool>;

    async fn is_healthy(&self) -> bool {
        self.health_check().await.unwrap_or(false)
    }
}
