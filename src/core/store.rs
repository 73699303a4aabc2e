// Regression - core/store.rs
//
// Collaborator seams for ingestion: where sources come from and where
// records go. Durable implementations live in the platform layer; the
// in-memory versions here back tests and dry runs.

use crate::core::model::{DedupKey, LogDataSource, LogRecord, MetadataEntry, StoredLog};
use crate::util::error::StoreError;
use chrono::NaiveDateTime;
use std::collections::{HashMap, HashSet};

/// Supplies the registered data sources.
pub trait DataSourceRegistry {
    /// All sources whose `source_type` is `"local"`, in registry order.
    fn list_local_sources(&self) -> Result<Vec<LogDataSource>, StoreError>;
}

/// Persists records and answers the dedup question.
pub trait LogStore {
    /// Whether a record with this `(timestamp, application_id, source_id)`
    /// has already been saved.
    fn exists(
        &self,
        timestamp: NaiveDateTime,
        application_id: &str,
        source_id: &str,
    ) -> Result<bool, StoreError>;

    /// Persist one log record.
    fn save_log(&mut self, record: &LogRecord) -> Result<(), StoreError>;

    /// Persist one metadata entry. Its `log_id` must name a saved record.
    fn save_metadata(&mut self, entry: &MetadataEntry) -> Result<(), StoreError>;

    /// Every stored record joined with its metadata, in save order.
    fn stored_logs(&self) -> Result<Vec<StoredLog>, StoreError>;
}

// =============================================================================
// In-memory registry
// =============================================================================

/// A fixed list of sources.
#[derive(Debug, Clone, Default)]
pub struct StaticSourceRegistry {
    sources: Vec<LogDataSource>,
}

impl StaticSourceRegistry {
    pub fn new(sources: Vec<LogDataSource>) -> Self {
        Self { sources }
    }

    /// Every registered source, local or not.
    pub fn all(&self) -> &[LogDataSource] {
        &self.sources
    }
}

impl DataSourceRegistry for StaticSourceRegistry {
    fn list_local_sources(&self) -> Result<Vec<LogDataSource>, StoreError> {
        Ok(self
            .sources
            .iter()
            .filter(|s| s.is_local())
            .cloned()
            .collect())
    }
}

// =============================================================================
// In-memory store
// =============================================================================

/// Records and metadata held in memory, with a dedup index.
#[derive(Debug, Default)]
pub struct MemoryStore {
    logs: Vec<LogRecord>,
    metadata: HashMap<String, Vec<MetadataEntry>>,
    index: HashSet<DedupKey>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Saved records, in save order.
    pub fn logs(&self) -> &[LogRecord] {
        &self.logs
    }

    /// Whether a record with this id has been saved.
    pub fn has_log(&self, log_id: &str) -> bool {
        self.metadata.contains_key(log_id)
    }

    /// Metadata saved for one record, in save order.
    pub fn metadata_for(&self, log_id: &str) -> &[MetadataEntry] {
        self.metadata.get(log_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total metadata entries across all records.
    pub fn metadata_count(&self) -> usize {
        self.metadata.values().map(Vec::len).sum()
    }
}

impl LogStore for MemoryStore {
    fn exists(
        &self,
        timestamp: NaiveDateTime,
        application_id: &str,
        source_id: &str,
    ) -> Result<bool, StoreError> {
        Ok(self.index.contains(&DedupKey {
            timestamp,
            application_id: application_id.to_string(),
            source_id: source_id.to_string(),
        }))
    }

    fn save_log(&mut self, record: &LogRecord) -> Result<(), StoreError> {
        self.index.insert(record.dedup_key());
        self.metadata.entry(record.id.clone()).or_default();
        self.logs.push(record.clone());
        Ok(())
    }

    fn save_metadata(&mut self, entry: &MetadataEntry) -> Result<(), StoreError> {
        match self.metadata.get_mut(&entry.log_id) {
            Some(entries) => {
                entries.push(entry.clone());
                Ok(())
            }
            None => Err(StoreError::UnknownLog {
                log_id: entry.log_id.clone(),
            }),
        }
    }

    fn stored_logs(&self) -> Result<Vec<StoredLog>, StoreError> {
        Ok(self
            .logs
            .iter()
            .map(|record| StoredLog {
                record: record.clone(),
                metadata: self.metadata_for(&record.id).to_vec(),
            })
            .collect())
    }
}
