//! In-process system used for local runs and tests.
//!
//! Writes made through [`SystemConnector`] behave like the integration account
//! writing to the system; [`MemorySystem::seed`] and [`MemorySystem::edit`]
//! behave like a person editing records directly in it.

use crate::error::{Result, UserSyncError};
use crate::models::{Record, Watermark};
use crate::system::adapter::{PageKey, SystemConnector, SystemDescriptor, WriteReceipt};
use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

const LOCAL_USER: &str = "local-user";
const DEFAULT_INTEGRATION_USER: &str = "integration-user";

pub struct MemorySystem {
    descriptor: SystemDescriptor,
    records: RwLock<BTreeMap<String, Record>>,
    next_id: AtomicU64,
    last_stamp: RwLock<Option<Watermark>>,
    integration_user: String,
    unavailable: AtomicBool,
    failing_identifiers: RwLock<HashSet<String>>,
    write_delay: RwLock<Option<Duration>>,
}

impl MemorySystem {
    pub fn new(descriptor: SystemDescriptor) -> Self {
        Self {
            descriptor,
            records: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            last_stamp: RwLock::new(None),
            integration_user: DEFAULT_INTEGRATION_USER.to_string(),
            unavailable: AtomicBool::new(false),
            failing_identifiers: RwLock::new(HashSet::new()),
            write_delay: RwLock::new(None),
        }
    }

    /// User id stamped on writes made through the connector
    pub fn with_integration_user(mut self, user: impl Into<String>) -> Self {
        self.integration_user = user.into();
        self
    }

    /// Create a record as a person working in this system would
    pub async fn seed(&self, record: Record) -> Result<String> {
        let receipt = self.create(record, LOCAL_USER).await?;
        Ok(receipt.primary_key)
    }

    /// Change fields of an existing record as a person working in this system would
    pub async fn edit(&self, identifier: &str, changes: Record) -> Result<Watermark> {
        let pk = self
            .primary_key_of(identifier)
            .await
            .ok_or_else(|| UserSyncError::NotFound(format!("{} in {}", identifier, self.descriptor.name)))?;
        let receipt = self.modify(&pk, changes, LOCAL_USER).await?;
        receipt
            .last_modified
            .ok_or_else(|| UserSyncError::Pipeline("edit produced no timestamp".to_string()))
    }

    /// Query by identifier; `None` is the not-found result
    pub async fn get(&self, identifier: &str) -> Option<Record> {
        let pk = self.primary_key_of(identifier).await?;
        self.records.read().await.get(&pk).cloned()
    }

    pub async fn all(&self) -> Vec<Record> {
        self.records.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Make every operation fail with a connection error
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make connector writes for this identifier fail
    pub async fn fail_writes_for(&self, identifier: &str) {
        self.failing_identifiers
            .write()
            .await
            .insert(identifier.trim().to_lowercase());
    }

    /// Delay every connector write, e.g. to exceed a batch timeout
    pub async fn set_write_delay(&self, delay: Option<Duration>) {
        *self.write_delay.write().await = delay;
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(UserSyncError::Connection(format!(
                "{} is unreachable",
                self.descriptor.name
            )));
        }
        Ok(())
    }

    async fn before_write(&self, identifier: Option<&str>) -> Result<()> {
        self.check_available()?;

        let delay = *self.write_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(identifier) = identifier {
            if self.failing_identifiers.read().await.contains(identifier) {
                return Err(UserSyncError::Connection(format!(
                    "write rejected by {} for {}",
                    self.descriptor.name, identifier
                )));
            }
        }
        Ok(())
    }

    async fn primary_key_of(&self, identifier: &str) -> Option<String> {
        let wanted = identifier.trim().to_lowercase();
        let field = &self.descriptor.identifier_field;
        self.records
            .read()
            .await
            .iter()
            .find(|(_, r)| r.identifier(field).as_deref() == Some(wanted.as_str()))
            .map(|(pk, _)| pk.clone())
    }

    /// Strictly increasing last-modified stamps, millisecond precision
    async fn next_stamp(&self) -> Watermark {
        let mut last = self.last_stamp.write().await;
        let now = Watermark::now();
        let stamp = match *last {
            Some(prev) if now <= prev => {
                Watermark::new(prev.timestamp() + ChronoDuration::milliseconds(1))
            }
            _ => now,
        };
        *last = Some(stamp);
        stamp
    }

    fn stamp(&self, record: &mut Record, at: Watermark, user: &str) {
        record.insert(self.descriptor.last_modified_field.clone(), at.to_rfc3339());
        if let Some(field) = &self.descriptor.modified_by_field {
            record.insert(field.clone(), user.to_string());
        }
    }

    async fn create(&self, mut record: Record, user: &str) -> Result<WriteReceipt> {
        let field = &self.descriptor.identifier_field;
        if let Some(identifier) = record.identifier(field) {
            if self.primary_key_of(&identifier).await.is_some() {
                return Err(UserSyncError::Validation(format!(
                    "{} already exists in {}",
                    identifier, self.descriptor.name
                )));
            }
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let pk = format!("{}-{:06}", self.descriptor.id, n);
        let at = self.next_stamp().await;
        record.insert(self.descriptor.primary_key_field.clone(), pk.clone());
        self.stamp(&mut record, at, user);

        self.records.write().await.insert(pk.clone(), record);
        debug!("Inserted {} into {}", pk, self.descriptor.name);

        Ok(WriteReceipt {
            primary_key: pk,
            last_modified: Some(at),
        })
    }

    async fn modify(&self, primary_key: &str, fields: Record, user: &str) -> Result<WriteReceipt> {
        let at = self.next_stamp().await;
        let mut records = self.records.write().await;
        let existing = records
            .get_mut(primary_key)
            .ok_or_else(|| UserSyncError::NotFound(format!("{} in {}", primary_key, self.descriptor.name)))?;

        existing.merge(&fields);
        existing.insert(self.descriptor.primary_key_field.clone(), primary_key.to_string());
        self.stamp(existing, at, user);
        debug!("Updated {} in {}", primary_key, self.descriptor.name);

        Ok(WriteReceipt {
            primary_key: primary_key.to_string(),
            last_modified: Some(at),
        })
    }
}

#[async_trait]
impl SystemConnector for MemorySystem {
    fn descriptor(&self) -> &SystemDescriptor {
        &self.descriptor
    }

    async fn fetch_changes(
        &self,
        since: Watermark,
        after: Option<&PageKey>,
        limit: usize,
    ) -> Result<Vec<Record>> {
        self.check_available()?;

        let lm_field = &self.descriptor.last_modified_field;
        let records = self.records.read().await;
        let mut changed: Vec<(Watermark, &String, &Record)> = records
            .iter()
            .filter_map(|(pk, r)| {
                let at = Watermark::new(r.timestamp(lm_field)?);
                let past_key = after.map_or(true, |key| {
                    (at, pk.as_str()) > (key.last_modified, key.primary_key.as_str())
                });
                (at >= since && past_key).then_some((at, pk, r))
            })
            .collect();
        changed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));

        Ok(changed
            .into_iter()
            .take(limit)
            .map(|(_, _, r)| r.clone())
            .collect())
    }

    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Record>> {
        self.check_available()?;
        Ok(self.get(identifier).await)
    }

    async fn insert(&self, record: Record) -> Result<WriteReceipt> {
        let identifier = record.identifier(&self.descriptor.identifier_field);
        self.before_write(identifier.as_deref()).await?;
        let user = self.integration_user.clone();
        self.create(record, &user).await
    }

    async fn update(&self, primary_key: &str, fields: Record) -> Result<WriteReceipt> {
        let identifier = fields.identifier(&self.descriptor.identifier_field);
        self.before_write(identifier.as_deref()).await?;
        let user = self.integration_user.clone();
        self.modify(primary_key, fields, &user).await
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(!self.unavailable.load(Ordering::SeqCst))
    }
}
