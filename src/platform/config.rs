// Regression - platform/config.rs
//
// Platform directory resolution and config.toml loading with startup
// validation.
//
// Uses the `directories` crate for XDG (Linux), AppData (Windows),
// Library (macOS) compliance.

use crate::core::metadata::RegexRule;
use crate::core::model::LogDataSource;
use crate::util::constants;
use crate::util::error::ConfigError;
use chrono::NaiveDateTime;
use directories::ProjectDirs;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Resolved platform paths for Regression configuration and data.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Configuration directory (e.g. ~/.config/regression/ or %APPDATA%\Regression\config\)
    pub config_dir: PathBuf,

    /// Data directory holding the record store.
    pub data_dir: PathBuf,
}

impl PlatformPaths {
    /// Resolve platform-appropriate paths.
    ///
    /// Falls back to current directory if platform dirs cannot be determined.
    pub fn resolve() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("", "", constants::APP_ID) {
            let config_dir = proj_dirs.config_dir().to_path_buf();
            let data_dir = proj_dirs.data_dir().to_path_buf();

            tracing::debug!(
                config = %config_dir.display(),
                data = %data_dir.display(),
                "Platform paths resolved"
            );

            Self {
                config_dir,
                data_dir,
            }
        } else {
            tracing::warn!("Could not determine platform directories, using current directory");
            Self {
                config_dir: PathBuf::from("."),
                data_dir: PathBuf::from("."),
            }
        }
    }

    /// Default location of config.toml.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(constants::CONFIG_FILE_NAME)
    }
}

// =============================================================================
// config.toml shape
// =============================================================================

/// Raw deserialisable shape of config.toml.
///
/// Unknown keys are ignored so an older binary still starts with a newer file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// `[ingestion]` section.
    pub ingestion: IngestionSection,
    /// `[logging]` section.
    pub logging: LoggingSection,
    /// `[metadata]` section.
    pub metadata: MetadataSection,
    /// `[[sources]]` tables.
    pub sources: Vec<RawSource>,
}

/// `[ingestion]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct IngestionSection {
    /// Seconds between scheduled passes.
    pub interval_seconds: Option<u64>,
    /// Record store file, relative to the data directory unless absolute.
    pub store_file: Option<String>,
}

/// `[logging]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: Option<String>,
}

/// `[metadata]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct MetadataSection {
    /// Extra rules appended after the built-in table.
    pub rules: Vec<RawRule>,
}

/// One `[[metadata.rules]]` table.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawRule {
    pub name: Option<String>,
    pub pattern: Option<String>,
}

/// One `[[sources]]` table.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawSource {
    pub id: Option<String>,
    pub name: Option<String>,
    pub source_type: Option<String>,
    pub application_id: Option<String>,
    pub created_at: Option<String>,
    pub path: Option<PathBuf>,
}

/// Validated application configuration derived from config.toml.
///
/// Invalid values produce warnings and fall back to defaults; invalid rules
/// and sources are skipped.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Delay between scheduled passes.
    pub interval: Duration,

    /// Record store file as configured (resolved by `store_path`).
    pub store_file: PathBuf,

    /// Logging level string (for init before tracing is available).
    pub log_level: Option<String>,

    /// User-defined metadata rules, applied after the built-in table.
    pub extra_rules: Vec<RegexRule>,

    /// Registered data sources, in file order.
    pub sources: Vec<LogDataSource>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(constants::DEFAULT_INGESTION_INTERVAL_SECS),
            store_file: PathBuf::from(constants::DEFAULT_STORE_FILE_NAME),
            log_level: None,
            extra_rules: Vec::new(),
            sources: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Absolute store location: `store_file` joined onto `data_dir` unless
    /// it is already absolute.
    pub fn store_path(&self, data_dir: &Path) -> PathBuf {
        if self.store_file.is_absolute() {
            self.store_file.clone()
        } else {
            data_dir.join(&self.store_file)
        }
    }
}

/// Layouts accepted for `[[sources]] created_at`.
const CREATED_AT_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Load and validate config.toml at `config_path`.
///
/// Returns `AppConfig` with validated values and a list of non-fatal warnings.
/// A missing file yields defaults with no warnings (first run). A file that
/// exists but cannot be read or parsed is an error.
///
/// Relative source paths are resolved against the config file's directory.
pub fn load_config(config_path: &Path) -> Result<(AppConfig, Vec<String>), ConfigError> {
    let mut warnings: Vec<String> = Vec::new();

    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "No config.toml found; using defaults");
        return Ok((AppConfig::default(), warnings));
    }

    let content = std::fs::read_to_string(config_path).map_err(|e| ConfigError::Io {
        path: config_path.to_path_buf(),
        source: e,
    })?;

    let raw: RawConfig = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
        path: config_path.to_path_buf(),
        source: e,
    })?;

    tracing::info!(path = %config_path.display(), "Loaded config.toml");

    let base_dir = config_path.parent().unwrap_or(Path::new("."));
    let config = validate(raw, base_dir, &mut warnings);

    if !warnings.is_empty() {
        tracing::warn!(count = warnings.len(), "Config validation produced warnings");
    }

    Ok((config, warnings))
}

/// Validate every field against named constants, accumulating warnings.
fn validate(raw: RawConfig, base_dir: &Path, warnings: &mut Vec<String>) -> AppConfig {
    let mut config = AppConfig::default();

    // -- Ingestion: interval_seconds --
    if let Some(secs) = raw.ingestion.interval_seconds {
        if (constants::MIN_INGESTION_INTERVAL_SECS..=constants::MAX_INGESTION_INTERVAL_SECS)
            .contains(&secs)
        {
            config.interval = Duration::from_secs(secs);
        } else {
            warnings.push(format!(
                "[ingestion] interval_seconds = {secs} is out of range ({}-{}). Using default ({}).",
                constants::MIN_INGESTION_INTERVAL_SECS,
                constants::MAX_INGESTION_INTERVAL_SECS,
                constants::DEFAULT_INGESTION_INTERVAL_SECS,
            ));
        }
    }

    // -- Ingestion: store_file --
    if let Some(ref file) = raw.ingestion.store_file {
        if file.trim().is_empty() {
            warnings.push(format!(
                "[ingestion] store_file is empty. Using default ({}).",
                constants::DEFAULT_STORE_FILE_NAME
            ));
        } else {
            config.store_file = PathBuf::from(file);
        }
    }

    // -- Logging: level --
    if let Some(ref level) = raw.logging.level {
        let valid = ["error", "warn", "info", "debug", "trace"];
        if valid.contains(&level.to_lowercase().as_str()) {
            config.log_level = Some(level.clone());
        } else {
            warnings.push(format!(
                "[logging] level = \"{level}\" is not recognised. \
                 Valid values: error, warn, info, debug, trace. Using default (info).",
            ));
        }
    }

    config.extra_rules = validate_rules(raw.metadata.rules, warnings);
    config.sources = validate_sources(raw.sources, base_dir, warnings);
    config
}

fn validate_rules(raw: Vec<RawRule>, warnings: &mut Vec<String>) -> Vec<RegexRule> {
    let mut rules = Vec::new();
    for (idx, rule) in raw.into_iter().enumerate() {
        if rules.len() == constants::MAX_USER_METADATA_RULES {
            warnings.push(format!(
                "[[metadata.rules]] more than {} rules configured; the rest are ignored.",
                constants::MAX_USER_METADATA_RULES
            ));
            break;
        }
        let (Some(name), Some(pattern)) = (rule.name, rule.pattern) else {
            warnings.push(format!(
                "[[metadata.rules]] #{} needs both 'name' and 'pattern'. Skipped.",
                idx + 1
            ));
            continue;
        };
        if pattern.len() > constants::MAX_REGEX_PATTERN_LENGTH {
            warnings.push(format!(
                "[[metadata.rules]] '{name}' pattern is {} bytes (max {}). Skipped.",
                pattern.len(),
                constants::MAX_REGEX_PATTERN_LENGTH
            ));
            continue;
        }
        match RegexRule::new(name.clone(), &pattern) {
            Ok(compiled) => {
                tracing::debug!(rule = %name, pattern = %pattern, "Loaded metadata rule");
                rules.push(compiled);
            }
            Err(e) => {
                let err = ConfigError::InvalidRule {
                    name,
                    pattern,
                    source: e,
                };
                warnings.push(format!("{err}. Skipped."));
            }
        }
    }
    rules
}

fn validate_sources(
    raw: Vec<RawSource>,
    base_dir: &Path,
    warnings: &mut Vec<String>,
) -> Vec<LogDataSource> {
    let mut seen = HashSet::new();
    let mut sources = Vec::new();

    for (idx, source) in raw.into_iter().enumerate() {
        let position = idx + 1;
        let (Some(id), Some(application_id), Some(path)) =
            (source.id, source.application_id, source.path)
        else {
            warnings.push(format!(
                "[[sources]] #{position} needs 'id', 'application_id' and 'path'. Skipped."
            ));
            continue;
        };
        if !seen.insert(id.clone()) {
            warnings.push(format!("[[sources]] duplicate id '{id}'. Skipped."));
            continue;
        }

        let created_at = match source.created_at.as_deref() {
            Some(raw_ts) => match parse_created_at(raw_ts) {
                Some(ts) => ts,
                None => {
                    warnings.push(format!(
                        "[[sources]] '{id}' created_at = \"{raw_ts}\" is not a date-time \
                         (expected e.g. 2000-11-05T21:15:00). Using load time."
                    ));
                    chrono::Local::now().naive_local()
                }
            },
            None => chrono::Local::now().naive_local(),
        };

        let path = if path.is_absolute() {
            path
        } else {
            base_dir.join(path)
        };

        sources.push(LogDataSource {
            name: source.name.unwrap_or_else(|| id.clone()),
            id,
            source_type: source
                .source_type
                .unwrap_or_else(|| constants::LOCAL_SOURCE_TYPE.to_string()),
            application_id,
            created_at,
            path,
        });
    }
    sources
}

fn parse_created_at(raw: &str) -> Option<NaiveDateTime> {
    CREATED_AT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw.trim(), fmt).ok())
}
