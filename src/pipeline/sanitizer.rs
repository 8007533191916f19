use crate::config::SyncConfig;
use crate::models::Record;
use crate::system::SystemDescriptor;
use std::collections::BTreeSet;
use tracing::trace;

/// Return a copy of `record` without any key in `excluded`
pub fn sanitize(record: &Record, excluded: &BTreeSet<String>) -> Record {
    Record::from_fields(
        record
            .fields()
            .iter()
            .filter(|(k, _)| !excluded.contains(k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    )
}

/// Strips identity and system-managed fields so only attributes cross systems
#[derive(Debug, Clone)]
pub struct FieldSanitizer {
    excluded: BTreeSet<String>,
}

impl FieldSanitizer {
    pub fn new(excluded: impl IntoIterator<Item = String>) -> Self {
        Self {
            excluded: excluded.into_iter().collect(),
        }
    }

    /// Configured exclusions plus the system-managed fields of both ends
    pub fn for_direction(
        config: &SyncConfig,
        source: &SystemDescriptor,
        destination: &SystemDescriptor,
    ) -> Self {
        let mut excluded = config.excluded_field_set();
        excluded.extend(source.system_managed_fields());
        excluded.extend(destination.system_managed_fields());
        // never strip the match key
        excluded.remove(&source.identifier_field);
        excluded.remove(&destination.identifier_field);
        Self { excluded }
    }

    pub fn sanitize(&self, record: &Record) -> Record {
        let clean = sanitize(record, &self.excluded);
        trace!(
            "Sanitized record: {} -> {} fields",
            record.len(),
            clean.len()
        );
        clean
    }

    pub fn excluded(&self) -> &BTreeSet<String> {
        &self.excluded
    }
}
