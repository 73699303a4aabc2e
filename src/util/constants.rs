// Regression - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "Regression";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "Regression";

/// Current application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Data sources
// =============================================================================

/// The only `source_type` the ingestion engine acts on.
pub const LOCAL_SOURCE_TYPE: &str = "local";

// =============================================================================
// Scheduling
// =============================================================================

/// Default delay between two scheduled ingestion passes (seconds).
pub const DEFAULT_INGESTION_INTERVAL_SECS: u64 = 60;

/// Minimum user-configurable ingestion interval (seconds).
pub const MIN_INGESTION_INTERVAL_SECS: u64 = 1;

/// Maximum user-configurable ingestion interval (seconds). One day.
pub const MAX_INGESTION_INTERVAL_SECS: u64 = 86_400;

/// How often the scheduler thread checks its stop/trigger flags while
/// waiting for the next tick (ms).
pub const SCHEDULER_CHECK_INTERVAL_MS: u64 = 100;

// =============================================================================
// Metadata rules
// =============================================================================

/// Maximum regex pattern length accepted from config.toml.
pub const MAX_REGEX_PATTERN_LENGTH: usize = 4_096;

/// Maximum number of user-defined metadata rules appended to the built-in table.
pub const MAX_USER_METADATA_RULES: usize = 100;

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Maximum length of a log line included in error messages and debug output.
/// Prevents whole stack traces from being echoed into the job log.
pub const DEBUG_MAX_LINE_PREVIEW: usize = 200;

// =============================================================================
// Persistence
// =============================================================================

/// Default record store file name (stored in the platform data directory).
pub const DEFAULT_STORE_FILE_NAME: &str = "records.jsonl";

/// Schema version stamped on every stored row.
pub const STORE_SCHEMA_VERSION: u32 = 1;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";
