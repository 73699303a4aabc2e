// Regression - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// Expected absences (empty file, no severity token, rule not matching,
// duplicate record) are modelled as Option/bool and never appear here.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all Regression operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum RegressionError {
    /// An ingestion pass failed.
    Ingest(IngestError),

    /// The record store or source registry failed.
    Store(StoreError),

    /// Configuration loading or validation failed.
    Config(ConfigError),

    /// Export operation failed.
    Export(ExportError),
}

impl fmt::Display for RegressionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ingest(e) => write!(f, "Ingestion error: {e}"),
            Self::Store(e) => write!(f, "Store error: {e}"),
            Self::Config(e) => write!(f, "Configuration error: {e}"),
            Self::Export(e) => write!(f, "Export error: {e}"),
        }
    }
}

impl std::error::Error for RegressionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Ingest(e) => Some(e),
            Self::Store(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::Export(e) => Some(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------

/// Errors raised while reconstructing records from raw log text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The first non-blank line of a non-empty file carries no recognisable
    /// timestamp, so the file does not start on a record boundary.
    MissingTimestamp {
        /// 1-based line number of the offending line.
        line_number: u64,
        /// The offending line, truncated to `DEBUG_MAX_LINE_PREVIEW` chars.
        preview: String,
    },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTimestamp { .. } => {
                f.write_str("Failed to process logs, invalid instant group, missing timestamp")
            }
        }
    }
}

impl std::error::Error for ParseError {}

// ---------------------------------------------------------------------------
// Ingestion errors
// ---------------------------------------------------------------------------

/// Errors that abort an ingestion pass.
#[derive(Debug)]
pub enum IngestError {
    /// A registered local source's file cannot be opened or read.
    /// Signals a setup mistake; never silently skipped.
    SourceRead {
        source_id: String,
        path: PathBuf,
        source: io::Error,
    },

    /// The source file is not valid UTF-8 text.
    InvalidEncoding {
        source_id: String,
        path: PathBuf,
        source: std::string::FromUtf8Error,
    },

    /// The source file's log format is unsupported (no leading timestamp).
    Malformed {
        source_id: String,
        path: PathBuf,
        source: ParseError,
    },

    /// Persisting or querying records failed mid-pass.
    Store(StoreError),
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceRead {
                source_id,
                path,
                source,
            } => write!(
                f,
                "Cannot read local source '{source_id}' at '{}': {source}",
                path.display()
            ),
            Self::InvalidEncoding {
                source_id,
                path,
                source,
            } => write!(
                f,
                "Local source '{source_id}' at '{}' is not valid UTF-8: {source}",
                path.display()
            ),
            Self::Malformed {
                source_id,
                path,
                source,
            } => write!(
                f,
                "Local source '{source_id}' at '{}' has an unsupported format: {source}",
                path.display()
            ),
            Self::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for IngestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SourceRead { source, .. } => Some(source),
            Self::InvalidEncoding { source, .. } => Some(source),
            Self::Malformed { source, .. } => Some(source),
            Self::Store(e) => Some(e),
        }
    }
}

impl From<StoreError> for IngestError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<IngestError> for RegressionError {
    fn from(e: IngestError) -> Self {
        Self::Ingest(e)
    }
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

/// Errors related to the record store and the data-source registry.
#[derive(Debug)]
pub enum StoreError {
    /// I/O error reading or appending to the store file.
    Io { path: PathBuf, source: io::Error },

    /// A row could not be serialised or a stored row could not be decoded.
    Json {
        path: PathBuf,
        line_number: u64,
        source: serde_json::Error,
    },

    /// A metadata entry references a log record that was never saved.
    UnknownLog { log_id: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "Store I/O error '{}': {source}", path.display())
            }
            Self::Json {
                path,
                line_number,
                source,
            } => write!(
                f,
                "Store '{}' line {line_number}: invalid row: {source}",
                path.display()
            ),
            Self::UnknownLog { log_id } => {
                write!(f, "Metadata references unknown log record '{log_id}'")
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            Self::UnknownLog { .. } => None,
        }
    }
}

impl From<StoreError> for RegressionError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors related to configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// TOML parsing failed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A config value is out of the allowed range.
    ValueOutOfRange {
        field: String,
        value: String,
        expected: String,
    },

    /// A user-defined metadata rule could not be compiled.
    InvalidRule {
        name: String,
        pattern: String,
        source: regex::Error,
    },

    /// I/O error reading config file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { path, source } => {
                write!(f, "Config parse error '{}': {source}", path.display())
            }
            Self::ValueOutOfRange {
                field,
                value,
                expected,
            } => write!(
                f,
                "Config '{field}' = '{value}' is out of range. Expected: {expected}"
            ),
            Self::InvalidRule {
                name,
                pattern,
                source,
            } => write!(
                f,
                "Metadata rule '{name}' has an invalid pattern ('{pattern}'): {source}"
            ),
            Self::Io { path, source } => {
                write!(f, "Config I/O error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::InvalidRule { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            Self::ValueOutOfRange { .. } => None,
        }
    }
}

impl From<ConfigError> for RegressionError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Export errors
// ---------------------------------------------------------------------------

/// Errors related to export operations.
#[derive(Debug)]
pub enum ExportError {
    /// I/O error writing the export output.
    Io { path: PathBuf, source: io::Error },

    /// CSV serialisation error.
    Csv { path: PathBuf, source: csv::Error },

    /// JSON serialisation error.
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "Export I/O error '{}': {source}", path.display())
            }
            Self::Csv { path, source } => {
                write!(f, "CSV export error '{}': {source}", path.display())
            }
            Self::Json { path, source } => {
                write!(f, "JSON export error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Csv { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
        }
    }
}

impl From<ExportError> for RegressionError {
    fn from(e: ExportError) -> Self {
        Self::Export(e)
    }
}
