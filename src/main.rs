// Regression - main.rs
//
// Command-line entry point. Handles:
// 1. CLI argument parsing
// 2. config.toml loading and logging initialisation (debug mode support)
// 3. Dispatch to a one-shot pass, the scheduler, source listing or export

use clap::{Parser, Subcommand, ValueEnum};
use regression::app::ingest::IngestionService;
use regression::app::scheduler::{IngestionScheduler, SchedulerProgress};
use regression::core::export;
use regression::core::model::IngestionReport;
use regression::core::store::{LogStore, StaticSourceRegistry};
use regression::platform::config::{self, AppConfig, PlatformPaths};
use regression::platform::store::JsonLinesStore;
use regression::util;
use regression::util::error::{ConfigError, ExportError, RegressionError};
use std::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

/// Regression - scheduled ingestion of multi-line application logs.
///
/// Reads every configured local log file, rebuilds records (stack traces
/// included), classifies severity, extracts metadata and stores records that
/// were not ingested before.
#[derive(Parser, Debug)]
#[command(name = "regression", version, about)]
struct Cli {
    /// Path to config.toml (defaults to the platform config directory).
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Directory holding the record store (defaults to the platform data directory).
    #[arg(long = "data-dir")]
    data_dir: Option<PathBuf>,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug")]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single ingestion pass and print its report.
    Once,

    /// Run ingestion passes on a schedule.
    Run {
        /// Seconds between passes (overrides [ingestion] interval_seconds).
        #[arg(short = 'i', long = "interval")]
        interval: Option<u64>,

        /// Stop after this many passes (runs until killed when omitted).
        #[arg(short = 'n', long = "passes")]
        passes: Option<u64>,
    },

    /// List the configured data sources.
    Sources,

    /// Export stored records with their metadata.
    Export {
        /// Output format.
        #[arg(short = 'f', long = "format", value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,

        /// Output file (stdout when omitted).
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,

        /// Only export records of this application.
        #[arg(short = 'a', long = "application")]
        application: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ExportFormat {
    Csv,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let paths = PlatformPaths::resolve();
    let config_path = cli.config.clone().unwrap_or_else(|| paths.config_file());
    let (app_config, warnings) = match config::load_config(&config_path) {
        Ok(loaded) => loaded,
        Err(e) => {
            util::logging::init(cli.debug, None);
            return report_failure(&RegressionError::from(e));
        }
    };

    util::logging::init(cli.debug, app_config.log_level.as_deref());
    for warning in &warnings {
        tracing::warn!("{}", warning);
    }

    tracing::info!(
        version = util::constants::APP_VERSION,
        debug = cli.debug,
        config = %config_path.display(),
        sources = app_config.sources.len(),
        "Regression starting"
    );

    let data_dir = cli.data_dir.clone().unwrap_or(paths.data_dir);

    match run(cli.command, &app_config, &data_dir) {
        Ok(code) => code,
        Err(e) => report_failure(&e),
    }
}

/// Log `e` and print it with its cause chain to stderr.
fn report_failure(e: &RegressionError) -> ExitCode {
    tracing::error!(error = %e, "Command failed");
    eprintln!("Error: {e}");
    let mut cause = e.source();
    while let Some(inner) = cause {
        eprintln!("  caused by: {inner}");
        cause = inner.source();
    }
    ExitCode::FAILURE
}

fn run(
    command: Command,
    app_config: &AppConfig,
    data_dir: &Path,
) -> Result<ExitCode, RegressionError> {
    match command {
        Command::Once => {
            let mut service = build_service(app_config, data_dir)?;
            let report = service.run_pass()?;
            print_report(1, &report);
            Ok(ExitCode::SUCCESS)
        }
        Command::Run { interval, passes } => {
            let interval = match interval {
                Some(secs) => validate_interval(secs)?,
                None => app_config.interval,
            };
            run_scheduler(build_service(app_config, data_dir)?, interval, passes)
        }
        Command::Sources => {
            if app_config.sources.is_empty() {
                println!("No data sources configured.");
            }
            for source in &app_config.sources {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    source.id,
                    source.application_id,
                    source.source_type,
                    source.path.display(),
                    source.name
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Export {
            format,
            output,
            application,
        } => {
            let store = JsonLinesStore::open(&app_config.store_path(data_dir))?;
            tracing::debug!(stored = store.log_count(), "Exporting from record store");
            let mut logs = store.stored_logs()?;
            if let Some(app) = application {
                logs.retain(|l| l.record.application_id == app);
            }
            let count = export_logs(&logs, format, output.as_deref())?;
            tracing::info!(count, ?format, "Export complete");
            Ok(ExitCode::SUCCESS)
        }
    }
}

type Service = IngestionService<StaticSourceRegistry, JsonLinesStore>;

fn build_service(app_config: &AppConfig, data_dir: &Path) -> Result<Service, RegressionError> {
    let store = JsonLinesStore::open(&app_config.store_path(data_dir))?;
    let registry = StaticSourceRegistry::new(app_config.sources.clone());
    Ok(IngestionService::new(registry, store).with_extra_rules(app_config.extra_rules.clone()))
}

fn validate_interval(secs: u64) -> Result<Duration, ConfigError> {
    let range =
        util::constants::MIN_INGESTION_INTERVAL_SECS..=util::constants::MAX_INGESTION_INTERVAL_SECS;
    if range.contains(&secs) {
        Ok(Duration::from_secs(secs))
    } else {
        Err(ConfigError::ValueOutOfRange {
            field: "--interval".to_string(),
            value: secs.to_string(),
            expected: format!("{}-{} seconds", range.start(), range.end()),
        })
    }
}

fn run_scheduler(
    service: Service,
    interval: Duration,
    passes: Option<u64>,
) -> Result<ExitCode, RegressionError> {
    let mut scheduler = IngestionScheduler::new();
    scheduler.start(service, interval, passes);

    let mut failed = 0u64;
    loop {
        for message in scheduler.poll_progress() {
            match message {
                SchedulerProgress::Started { interval } => {
                    println!("Scheduler started (every {}s)", interval.as_secs());
                }
                SchedulerProgress::PassCompleted { pass, report } => print_report(pass, &report),
                SchedulerProgress::PassFailed { pass, message } => {
                    failed += 1;
                    eprintln!("Pass {pass} failed: {message}");
                }
                SchedulerProgress::PassSkipped => {}
                SchedulerProgress::Stopped => {
                    scheduler.join();
                    return Ok(if failed == 0 {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::FAILURE
                    });
                }
            }
        }
        std::thread::sleep(Duration::from_millis(
            util::constants::SCHEDULER_CHECK_INTERVAL_MS,
        ));
    }
}

fn print_report(pass: u64, report: &IngestionReport) {
    println!(
        "Pass {pass}: {} source(s), {} empty, {} record(s) found, {} new, {} duplicate, {} metadata in {} ms",
        report.sources,
        report.empty_sources,
        report.groups,
        report.persisted,
        report.duplicates,
        report.metadata,
        report.duration.as_millis()
    );
}

fn export_logs(
    logs: &[regression::core::model::StoredLog],
    format: ExportFormat,
    output: Option<&Path>,
) -> Result<usize, ExportError> {
    let label = output.unwrap_or(Path::new("<stdout>"));
    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = std::fs::File::create(path).map_err(|e| ExportError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
            Box::new(std::io::BufWriter::new(file))
        }
        None => Box::new(std::io::stdout().lock()),
    };

    match format {
        ExportFormat::Csv => export::export_csv(logs, writer, label),
        ExportFormat::Json => export::export_json(logs, writer, label),
    }
}
