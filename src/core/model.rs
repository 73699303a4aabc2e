// Regression - core/model.rs
//
// Core data model types. Pure data definitions with no I/O and no
// platform dependencies.
//
// These types are the shared vocabulary across all layers.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// =============================================================================
// Log data source (read-only input to ingestion)
// =============================================================================

/// One registered log file belonging to one application.
///
/// Created and edited outside the ingestion engine; ingestion only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogDataSource {
    /// Unique source identifier. Stored on every record as `source_id`.
    pub id: String,

    /// Human-readable name (e.g. "Apache Tomcat 10 (Linux Ubuntu 20.04.01)").
    pub name: String,

    /// Source kind. Ingestion acts only on `"local"`.
    pub source_type: String,

    /// Owning application identifier.
    pub application_id: String,

    /// When the source was registered.
    pub created_at: NaiveDateTime,

    /// Path of the log file to ingest.
    pub path: PathBuf,
}

impl LogDataSource {
    /// Whether this is a file-based source the ingestion engine should read.
    pub fn is_local(&self) -> bool {
        self.source_type == crate::util::constants::LOCAL_SOURCE_TYPE
    }
}

// =============================================================================
// Trace group (intermediate, never persisted)
// =============================================================================

/// One reconstructed log record's full text: the timestamped anchor line plus
/// every continuation line up to the next timestamped line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceGroup {
    /// Timestamp parsed from the anchor line.
    pub timestamp: NaiveDateTime,

    /// Character length of `chunk`.
    pub length: usize,

    /// Anchor line plus continuation lines, line terminators included.
    pub chunk: String,
}

impl TraceGroup {
    /// Build a group, deriving `length` from the chunk.
    pub fn new(timestamp: NaiveDateTime, chunk: String) -> Self {
        Self {
            timestamp,
            length: chunk.chars().count(),
            chunk,
        }
    }

    /// The anchor line without its terminator.
    pub fn first_line(&self) -> &str {
        self.chunk.lines().next().unwrap_or("")
    }

    /// Number of lines in the chunk.
    pub fn line_count(&self) -> usize {
        self.chunk.lines().count()
    }
}

// =============================================================================
// Severity
// =============================================================================

/// The closed severity vocabulary recognised on a record's first line.
///
/// Variants serialise as the literal log tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Debug,
    Error,
    Warn,
}

impl Severity {
    /// Returns all variants.
    pub fn all() -> &'static [Severity] {
        &[
            Severity::Info,
            Severity::Debug,
            Severity::Error,
            Severity::Warn,
        ]
    }

    /// The literal token as it appears in log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Debug => "DEBUG",
            Severity::Error => "ERROR",
            Severity::Warn => "WARN",
        }
    }

    /// Exact, case-sensitive token lookup.
    pub fn from_token(token: &str) -> Option<Severity> {
        Severity::all().iter().copied().find(|s| s.as_str() == token)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Persisted records
// =============================================================================

/// A persisted log record. One per non-duplicate trace group.
///
/// Deduplication identity is `(timestamp, application_id, source_id)`,
/// not `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Generated record identifier (UUID v4).
    pub id: String,

    /// Timestamp of the anchor line (naive, offset discarded).
    pub timestamp: NaiveDateTime,

    /// Severity token found on the first line; `None` when absent.
    pub severity: Option<Severity>,

    /// Owning application (copied from the source).
    pub application_id: String,

    /// Id of the data source the record was read from.
    pub source_id: String,

    /// Full original multi-line chunk, stack trace included.
    pub message: String,
}

impl LogRecord {
    /// The dedup key of this record.
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            timestamp: self.timestamp,
            application_id: self.application_id.clone(),
            source_id: self.source_id.clone(),
        }
    }

    /// Severity as stored/exported: the token, or an empty string.
    pub fn severity_label(&self) -> &'static str {
        self.severity.map(|s| s.as_str()).unwrap_or("")
    }
}

/// `(timestamp, application_id, source_id)`: the identity used to detect
/// already-ingested records.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub timestamp: NaiveDateTime,
    pub application_id: String,
    pub source_id: String,
}

/// One named, regex-extracted field attached to a persisted log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    /// Generated entry identifier (UUID v4).
    pub id: String,

    /// Id of the owning `LogRecord`.
    pub log_id: String,

    /// Name of the rule that produced this entry (e.g. "exceptionClass").
    pub metadata_type: String,

    /// Text captured by the rule.
    pub metadata_value: String,
}

/// A candidate record together with the metadata extracted from its group,
/// in rule-table order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedLog {
    pub record: LogRecord,
    pub metadata: Vec<MetadataEntry>,
}

/// A stored record joined with its metadata, as read back for export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredLog {
    #[serde(flatten)]
    pub record: LogRecord,
    pub metadata: Vec<MetadataEntry>,
}

// =============================================================================
// Ingestion report
// =============================================================================

/// Counters for one ingestion pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestionReport {
    /// Local sources visited.
    pub sources: usize,

    /// Sources skipped because their file was empty.
    pub empty_sources: usize,

    /// Trace groups reconstructed across all sources.
    pub groups: usize,

    /// New records persisted.
    pub persisted: usize,

    /// Candidates discarded because their dedup key already existed.
    pub duplicates: usize,

    /// Metadata entries persisted.
    pub metadata: usize,

    /// Wall-clock pass duration.
    pub duration: std::time::Duration,
}

impl IngestionReport {
    /// True if at least one new record was persisted in this pass.
    pub fn persisted_any(&self) -> bool {
        self.persisted > 0
    }
}
