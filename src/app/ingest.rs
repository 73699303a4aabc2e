// Regression - app/ingest.rs
//
// One ingestion pass over every registered local source.
//
// Pipeline per source, in registry order:
//   read whole file -> trace groups -> (severity, metadata) per group
//   -> candidate records -> dedup filter -> persist record, then metadata.
//
// Failure policy:
//   - Unreadable, non-UTF-8 or malformed sources abort the pass. They are
//     setup mistakes and must surface, not be skipped.
//   - Store failures abort the pass.
//   - Records already persisted stay persisted; the next pass skips them via
//     the dedup check, so a retried pass is idempotent.

use crate::core::grouper::compose_trace_groups;
use crate::core::metadata::{default_rules, extract_all_metadata, RegexRule};
use crate::core::model::{
    ComposedLog, IngestionReport, LogDataSource, LogRecord, MetadataEntry, TraceGroup,
};
use crate::core::severity::extract_log_level;
use crate::core::store::{DataSourceRegistry, LogStore};
use crate::platform::fs::{self, TextRead};
use crate::util::error::{IngestError, ParseError, StoreError};
use std::time::Instant;

/// Runs ingestion passes against a source registry and a record store.
pub struct IngestionService<R, S> {
    registry: R,
    store: S,
    rules: Vec<RegexRule>,
}

impl<R: DataSourceRegistry, S: LogStore> IngestionService<R, S> {
    /// A service applying the built-in metadata rules.
    pub fn new(registry: R, store: S) -> Self {
        Self {
            registry,
            store,
            rules: default_rules().to_vec(),
        }
    }

    /// Append rules after the built-in table.
    pub fn with_extra_rules(mut self, rules: Vec<RegexRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// The rules applied to every group, in order.
    pub fn rules(&self) -> &[RegexRule] {
        &self.rules
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one pass. Returns `true` iff at least one new record was persisted.
    pub fn process_local_logs(&mut self) -> Result<bool, IngestError> {
        Ok(self.run_pass()?.persisted_any())
    }

    /// Run one pass and report what it did.
    pub fn run_pass(&mut self) -> Result<IngestionReport, IngestError> {
        let started = Instant::now();
        let mut report = IngestionReport::default();

        let sources = self.registry.list_local_sources()?;
        tracing::debug!(sources = sources.len(), "Ingestion pass started");

        for source in sources.iter().filter(|s| s.is_local()) {
            report.sources += 1;

            let text = Self::collect_raw_logs(source)?;
            if text.is_empty() {
                tracing::debug!(source_id = %source.id, path = %source.path.display(), "Source is empty; skipped");
                report.empty_sources += 1;
                continue;
            }

            let groups =
                Self::compose_raw_logs_trace_group(&text).map_err(|e| IngestError::Malformed {
                    source_id: source.id.clone(),
                    path: source.path.clone(),
                    source: e,
                })?;
            report.groups += groups.len();

            let mut persisted = 0usize;
            let mut duplicates = 0usize;
            for composed in self.compose_logs_and_metadata(source, &groups) {
                let record = &composed.record;
                if self
                    .store
                    .exists(record.timestamp, &record.application_id, &record.source_id)?
                {
                    duplicates += 1;
                    continue;
                }
                report.metadata += self.save_new_logs(record, &composed.metadata)?;
                persisted += 1;
            }

            tracing::debug!(
                source_id = %source.id,
                groups = groups.len(),
                persisted,
                duplicates,
                "Source ingested"
            );
            report.persisted += persisted;
            report.duplicates += duplicates;
        }

        report.duration = started.elapsed();
        tracing::info!(
            sources = report.sources,
            empty = report.empty_sources,
            groups = report.groups,
            persisted = report.persisted,
            duplicates = report.duplicates,
            metadata = report.metadata,
            duration_ms = report.duration.as_millis() as u64,
            "Ingestion pass completed"
        );
        Ok(report)
    }

    /// Read a source's whole file as UTF-8 text.
    pub fn collect_raw_logs(source: &LogDataSource) -> Result<String, IngestError> {
        match fs::read_text(&source.path) {
            Ok(TextRead::Text(text)) => Ok(text),
            Ok(TextRead::NotUtf8(e)) => Err(IngestError::InvalidEncoding {
                source_id: source.id.clone(),
                path: source.path.clone(),
                source: e,
            }),
            Err(e) => Err(IngestError::SourceRead {
                source_id: source.id.clone(),
                path: source.path.clone(),
                source: e,
            }),
        }
    }

    /// Group raw text into trace groups.
    pub fn compose_raw_logs_trace_group(text: &str) -> Result<Vec<TraceGroup>, ParseError> {
        compose_trace_groups(text)
    }

    /// Build one candidate record per group, with its metadata, in group order.
    ///
    /// A group without a recognised severity still yields a record.
    pub fn compose_logs_and_metadata(
        &self,
        source: &LogDataSource,
        groups: &[TraceGroup],
    ) -> Vec<ComposedLog> {
        groups
            .iter()
            .map(|group| {
                let record = LogRecord {
                    id: uuid::Uuid::new_v4().to_string(),
                    timestamp: group.timestamp,
                    severity: extract_log_level(group),
                    application_id: source.application_id.clone(),
                    source_id: source.id.clone(),
                    message: group.chunk.clone(),
                };
                let metadata = extract_all_metadata(&record, group, &self.rules);
                ComposedLog { record, metadata }
            })
            .collect()
    }

    /// Persist a record, then its metadata entries in order.
    ///
    /// If the record cannot be saved no metadata is written. Returns the
    /// number of metadata entries saved.
    pub fn save_new_logs(
        &mut self,
        record: &LogRecord,
        metadata: &[MetadataEntry],
    ) -> Result<usize, StoreError> {
        self.store.save_log(record)?;
        for entry in metadata {
            self.store.save_metadata(entry)?;
        }
        Ok(metadata.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{Severity, StoredLog};
    use crate::core::store::{MemoryStore, StaticSourceRegistry};
    use chrono::{NaiveDate, NaiveDateTime};
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const TWO_RECORDS: &str = "\
15-May-2025 14:32:10.213 INFO [main] org.apache.catalina.startup.Catalina.start Server startup in [5452] milliseconds
15-May-2025 14:32:20.500 ERROR [http-nio-8080-exec-2] com.example.controller.LoginController.login Failed to authenticate user
java.lang.NullPointerException: Cannot invoke \"User.getEmail()\" because \"user\" is null
    at com.example.service.AuthService.authenticate(AuthService.java:45)
";

    /// Records every store call in order; optionally refuses log rows.
    #[derive(Default)]
    struct RecordingStore {
        inner: MemoryStore,
        calls: Vec<String>,
        fail_logs: bool,
    }

    impl LogStore for RecordingStore {
        fn exists(&self, ts: NaiveDateTime, app: &str, src: &str) -> Result<bool, StoreError> {
            self.inner.exists(ts, app, src)
        }

        fn save_log(&mut self, record: &LogRecord) -> Result<(), StoreError> {
            if self.fail_logs {
                return Err(StoreError::Io {
                    path: PathBuf::from("records.jsonl"),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                });
            }
            self.calls.push(format!("log:{}", record.id));
            self.inner.save_log(record)
        }

        fn save_metadata(&mut self, entry: &MetadataEntry) -> Result<(), StoreError> {
            self.calls.push(format!("metadata:{}", entry.log_id));
            self.inner.save_metadata(entry)
        }

        fn stored_logs(&self) -> Result<Vec<StoredLog>, StoreError> {
            self.inner.stored_logs()
        }
    }

    fn source_at(path: &Path) -> LogDataSource {
        LogDataSource {
            id: "UUID1".to_string(),
            name: "Apache Tomcat 10 (Linux Ubuntu 20.04.01)".to_string(),
            source_type: "local".to_string(),
            application_id: "App_UUID1".to_string(),
            created_at: NaiveDate::from_ymd_opt(2000, 11, 5)
                .unwrap()
                .and_hms_opt(21, 15, 0)
                .unwrap(),
            path: path.to_path_buf(),
        }
    }

    fn service_for(
        dir: &TempDir,
        content: &str,
    ) -> IngestionService<StaticSourceRegistry, MemoryStore> {
        let path = dir.path().join("mock_log.log");
        std::fs::write(&path, content).unwrap();
        IngestionService::new(
            StaticSourceRegistry::new(vec![source_at(&path)]),
            MemoryStore::new(),
        )
    }

    #[test]
    fn test_process_local_logs_persists_new_records() {
        let dir = TempDir::new().unwrap();
        let mut service = service_for(&dir, TWO_RECORDS);

        assert!(service.process_local_logs().unwrap());

        let logs = service.store().logs();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].severity, Some(Severity::Info));
        assert_eq!(logs[1].severity, Some(Severity::Error));
        assert_eq!(logs[1].application_id, "App_UUID1");
        assert_eq!(logs[1].source_id, "UUID1");
        assert!(logs[1].message.contains("AuthService.authenticate"));

        let metadata = service.store().metadata_for(&logs[1].id);
        let exception = metadata
            .iter()
            .find(|m| m.metadata_type == "exceptionClass")
            .unwrap();
        assert_eq!(exception.metadata_value, "java.lang.NullPointerException");
    }

    #[test]
    fn test_empty_file_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let mut service = service_for(&dir, "");
        let report = service.run_pass().unwrap();
        assert!(!report.persisted_any());
        assert_eq!(report.empty_sources, 1);
        assert!(service.store().logs().is_empty());
    }

    #[test]
    fn test_second_pass_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut service = service_for(&dir, TWO_RECORDS);
        assert!(service.process_local_logs().unwrap());
        let metadata_after_first = service.store().metadata_count();

        let report = service.run_pass().unwrap();
        assert!(!report.persisted_any());
        assert_eq!(report.duplicates, 2);
        assert_eq!(service.store().logs().len(), 2);
        assert_eq!(service.store().metadata_count(), metadata_after_first);
    }

    #[test]
    fn test_appended_lines_only_add_new_records() {
        let dir = TempDir::new().unwrap();
        let mut service = service_for(&dir, TWO_RECORDS);
        service.process_local_logs().unwrap();

        let path = dir.path().join("mock_log.log");
        let grown = format!("{TWO_RECORDS}15-May-2025 14:33:00.001 WARN [main] heap at 91%\n");
        std::fs::write(&path, grown).unwrap();

        let report = service.run_pass().unwrap();
        assert_eq!(report.persisted, 1);
        assert_eq!(report.duplicates, 2);
        assert_eq!(service.store().logs()[2].severity, Some(Severity::Warn));
    }

    #[test]
    fn test_invalid_path_aborts_pass_without_saving() {
        let dir = TempDir::new().unwrap();
        let mut service = IngestionService::new(
            StaticSourceRegistry::new(vec![source_at(&dir.path().join("invalid_path.log"))]),
            RecordingStore::default(),
        );
        let err = service.process_local_logs().unwrap_err();
        assert!(matches!(err, IngestError::SourceRead { .. }));
        assert!(service.store().calls.is_empty());
    }

    #[test]
    fn test_non_utf8_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("latin1.log");
        std::fs::write(&path, b"15-May-2025 14:32:10.213 INFO caf\xe9\n").unwrap();
        let mut service = IngestionService::new(
            StaticSourceRegistry::new(vec![source_at(&path)]),
            MemoryStore::new(),
        );
        assert!(matches!(
            service.run_pass().unwrap_err(),
            IngestError::InvalidEncoding { .. }
        ));
    }

    #[test]
    fn test_missing_leading_timestamp_is_malformed() {
        let dir = TempDir::new().unwrap();
        let mut service = service_for(&dir, "INFO [main] started without a timestamp\n");
        let err = service.run_pass().unwrap_err();
        match err {
            IngestError::Malformed { source_id, source, .. } => {
                assert_eq!(source_id, "UUID1");
                assert_eq!(
                    source.to_string(),
                    "Failed to process logs, invalid instant group, missing timestamp"
                );
            }
            other => panic!("expected Malformed, got {other:?}"),
        }
        assert!(service.store().logs().is_empty());
    }

    #[test]
    fn test_first_failing_source_stops_later_sources() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.log");
        std::fs::write(&good, TWO_RECORDS).unwrap();
        let mut missing = source_at(&dir.path().join("missing.log"));
        missing.id = "UUID0".to_string();

        let mut service = IngestionService::new(
            StaticSourceRegistry::new(vec![missing, source_at(&good)]),
            MemoryStore::new(),
        );
        assert!(service.run_pass().is_err());
        assert!(service.store().logs().is_empty());
    }

    #[test]
    fn test_non_local_sources_ignored() {
        struct AllSources(Vec<LogDataSource>);
        impl DataSourceRegistry for AllSources {
            fn list_local_sources(&self) -> Result<Vec<LogDataSource>, StoreError> {
                Ok(self.0.clone())
            }
        }

        let dir = TempDir::new().unwrap();
        let mut remote = source_at(&dir.path().join("does_not_exist.log"));
        remote.source_type = "remote".to_string();

        let mut service = IngestionService::new(AllSources(vec![remote]), MemoryStore::new());
        let report = service.run_pass().unwrap();
        assert_eq!(report.sources, 0);
    }

    #[test]
    fn test_save_new_logs_writes_record_before_metadata() {
        let mut service = IngestionService::new(
            StaticSourceRegistry::default(),
            RecordingStore::default(),
        );
        let groups = compose_trace_groups(TWO_RECORDS).unwrap();
        let source = source_at(Path::new("mock_log.log"));
        let composed = service.compose_logs_and_metadata(&source, &groups);
        let last = composed.last().unwrap();
        assert!(last.metadata.len() >= 2);

        let saved = service.save_new_logs(&last.record, &last.metadata).unwrap();
        assert_eq!(saved, last.metadata.len());

        let calls = &service.store().calls;
        assert_eq!(calls[0], format!("log:{}", last.record.id));
        assert!(calls[1..]
            .iter()
            .all(|c| *c == format!("metadata:{}", last.record.id)));
        assert_eq!(calls.len(), 1 + last.metadata.len());
    }

    #[test]
    fn test_failed_record_save_writes_no_metadata() {
        let mut service = IngestionService::new(
            StaticSourceRegistry::default(),
            RecordingStore {
                fail_logs: true,
                ..Default::default()
            },
        );
        let groups = compose_trace_groups(TWO_RECORDS).unwrap();
        let composed =
            service.compose_logs_and_metadata(&source_at(Path::new("mock_log.log")), &groups);
        let last = composed.last().unwrap();

        assert!(service.save_new_logs(&last.record, &last.metadata).is_err());
        assert!(service.store().calls.is_empty());
    }

    #[test]
    fn test_missing_severity_still_yields_record() {
        let service =
            IngestionService::new(StaticSourceRegistry::default(), MemoryStore::new());
        let groups = compose_trace_groups(
            "15-May-2025 14:32:15.138 WARNING [http-nio-8080-exec-1] com.example.dao.UserDao.getUserById User not found: 42\n",
        )
        .unwrap();
        let composed =
            service.compose_logs_and_metadata(&source_at(Path::new("mock_log.log")), &groups);
        assert_eq!(composed.len(), 1);
        assert_eq!(composed[0].record.severity, None);
        assert!(composed[0]
            .metadata
            .iter()
            .all(|m| m.log_id == composed[0].record.id));
    }

    #[test]
    fn test_extra_rules_run_after_builtins() {
        let service = IngestionService::new(StaticSourceRegistry::default(), MemoryStore::new())
            .with_extra_rules(vec![RegexRule::new("userId", r"user with ID (\d+)").unwrap()]);
        assert_eq!(service.rules().last().unwrap().name, "userId");

        let groups = compose_trace_groups(
            "15-May-2025 14:32:15.134 INFO [http-nio-8080-exec-1] com.example.service.UserService.getUserById Fetching user with ID 42\n",
        )
        .unwrap();
        let composed =
            service.compose_logs_and_metadata(&source_at(Path::new("mock_log.log")), &groups);
        let last = composed[0].metadata.last().unwrap();
        assert_eq!(last.metadata_type, "userId");
        assert_eq!(last.metadata_value, "42");
    }

    #[test]
    fn test_same_timestamp_in_one_file_collapses_to_first() {
        let dir = TempDir::new().unwrap();
        let mut service = service_for(
            &dir,
            "15-May-2025 14:32:10.213 INFO [main] first\n15-May-2025 14:32:10.213 ERROR [main] second\n",
        );
        let report = service.run_pass().unwrap();
        assert_eq!(report.persisted, 1);
        assert_eq!(report.duplicates, 1);
        assert!(service.store().logs()[0].message.contains("first"));
    }
}
