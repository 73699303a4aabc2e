// Regression - platform/store.rs
//
// Durable record store: an append-only JSON-lines file.
//
// Design:
// - One JSON object per line, tagged `"kind": "log"` or `"kind": "metadata"`
//   and stamped with the store schema version.
// - Every row is written with a single write_all of `json + "\n"` and
//   flushed before the in-memory index is updated, so a record is either
//   fully on disk or absent.
// - A final line without a terminator is the remains of an interrupted
//   write. It is dropped with a warning and truncated away on open so the
//   next append starts on a clean line.
// - The byte length of complete rows is tracked. A failed append truncates
//   the file back to it; if that fails too the store is poisoned and refuses
//   further writes, so a fragment never ends up in the middle of the file.
// - Any other unreadable line is reported as `StoreError::Json`: the file is
//   corrupt and ingestion must not guess.
// - The dedup index and the metadata join are rebuilt in memory on open.

use crate::core::model::{LogRecord, MetadataEntry, StoredLog};
use crate::core::store::{LogStore, MemoryStore};
use crate::util::constants::STORE_SCHEMA_VERSION;
use crate::util::error::StoreError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// On-disk row payload.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Row {
    Log(LogRecord),
    Metadata(MetadataEntry),
}

/// One line of the store file.
#[derive(Debug, Serialize, Deserialize)]
struct StoreLine {
    /// Schema version; rows with another version are skipped on load.
    v: u32,
    #[serde(flatten)]
    row: Row,
}

/// Append-only JSON-lines implementation of `LogStore`.
#[derive(Debug)]
pub struct JsonLinesStore {
    path: PathBuf,
    file: File,
    cache: MemoryStore,
    /// Byte length of the complete rows on disk.
    committed: u64,
    /// Set when a failed append could not be rolled back.
    poisoned: bool,
}

impl JsonLinesStore {
    /// Open (or create) the store at `path`, replaying existing rows.
    ///
    /// Parent directories are created as needed.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let io_err = |e: std::io::Error| StoreError::Io {
            path: path.to_path_buf(),
            source: e,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(io_err(e)),
        };

        let (cache, good_len) = replay(path, &content)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_err)?;

        if good_len < content.len() {
            tracing::warn!(
                path = %path.display(),
                dropped_bytes = content.len() - good_len,
                "Store ends with an incomplete row; truncating it"
            );
            file.set_len(good_len as u64).map_err(io_err)?;
        }

        tracing::info!(
            path = %path.display(),
            logs = cache.logs().len(),
            metadata = cache.metadata_count(),
            "Record store opened"
        );

        Ok(Self {
            path: path.to_path_buf(),
            file,
            cache,
            committed: good_len as u64,
            poisoned: false,
        })
    }

    /// Number of stored log records.
    pub fn log_count(&self) -> usize {
        self.cache.logs().len()
    }

    fn append(&mut self, row: Row) -> Result<(), StoreError> {
        if self.poisoned {
            return Err(StoreError::Io {
                path: self.path.clone(),
                source: std::io::Error::other(
                    "store refused write after an earlier append could not be rolled back",
                ),
            });
        }

        let line = StoreLine {
            v: STORE_SCHEMA_VERSION,
            row,
        };
        let mut json = serde_json::to_string(&line).map_err(|e| StoreError::Json {
            path: self.path.clone(),
            line_number: 0,
            source: e,
        })?;
        json.push('\n');

        match self
            .file
            .write_all(json.as_bytes())
            .and_then(|()| self.file.flush())
        {
            Ok(()) => {
                self.committed += json.len() as u64;
                Ok(())
            }
            Err(e) => {
                self.roll_back();
                Err(StoreError::Io {
                    path: self.path.clone(),
                    source: e,
                })
            }
        }
    }

    /// Drop anything written after the last complete row.
    fn roll_back(&mut self) {
        match self.file.set_len(self.committed) {
            Ok(()) => tracing::warn!(
                path = %self.path.display(),
                committed = self.committed,
                "Append failed; store truncated to its last complete row"
            ),
            Err(e) => {
                self.poisoned = true;
                tracing::error!(
                    path = %self.path.display(),
                    error = %e,
                    "Append failed and could not be rolled back; store is read-only"
                );
            }
        }
    }
}

/// Rebuild the in-memory view from file content.
///
/// Returns the view and the byte length of the complete rows.
fn replay(path: &Path, content: &str) -> Result<(MemoryStore, usize), StoreError> {
    let mut cache = MemoryStore::new();
    let mut good_len = 0usize;

    for (idx, line) in content.split_inclusive('\n').enumerate() {
        let line_number = (idx as u64) + 1;
        if !line.ends_with('\n') {
            // Interrupted write; everything before it is intact.
            break;
        }
        good_len += line.len();

        if line.trim().is_empty() {
            continue;
        }

        let stored: StoreLine = serde_json::from_str(line).map_err(|e| StoreError::Json {
            path: path.to_path_buf(),
            line_number,
            source: e,
        })?;

        if stored.v != STORE_SCHEMA_VERSION {
            tracing::warn!(
                line_number,
                found = stored.v,
                expected = STORE_SCHEMA_VERSION,
                "Store row has an unknown schema version; skipped"
            );
            continue;
        }

        let result = match &stored.row {
            Row::Log(record) => cache.save_log(record),
            Row::Metadata(entry) => cache.save_metadata(entry),
        };
        if let Err(e) = result {
            tracing::warn!(line_number, error = %e, "Store row skipped");
        }
    }

    Ok((cache, good_len))
}

impl LogStore for JsonLinesStore {
    fn exists(
        &self,
        timestamp: NaiveDateTime,
        application_id: &str,
        source_id: &str,
    ) -> Result<bool, StoreError> {
        self.cache.exists(timestamp, application_id, source_id)
    }

    fn save_log(&mut self, record: &LogRecord) -> Result<(), StoreError> {
        self.append(Row::Log(record.clone()))?;
        self.cache.save_log(record)
    }

    fn save_metadata(&mut self, entry: &MetadataEntry) -> Result<(), StoreError> {
        if !self.cache.has_log(&entry.log_id) {
            return Err(StoreError::UnknownLog {
                log_id: entry.log_id.clone(),
            });
        }
        self.append(Row::Metadata(entry.clone()))?;
        self.cache.save_metadata(entry)
    }

    fn stored_logs(&self) -> Result<Vec<StoredLog>, StoreError> {
        self.cache.stored_logs()
    }
}
