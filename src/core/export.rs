// Regression - core/export.rs
//
// CSV and JSON export of ingested records with their metadata.
// Core layer: writes to any Write implementation; the path is only used to
// give errors context.

use crate::core::model::StoredLog;
use crate::util::error::ExportError;
use std::io::Write;
use std::path::Path;

/// Timestamp layout used in exported rows.
const EXPORT_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Export records to CSV.
///
/// Columns: id, timestamp, severity, application_id, source_id, message,
/// metadata. The metadata column holds `type=value` pairs joined by `"; "`.
/// Multi-line messages are quoted by the csv writer.
pub fn export_csv<W: Write>(
    logs: &[StoredLog],
    writer: W,
    export_path: &Path,
) -> Result<usize, ExportError> {
    let csv_err = |e: csv::Error| ExportError::Csv {
        path: export_path.to_path_buf(),
        source: e,
    };
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer
        .write_record([
            "id",
            "timestamp",
            "severity",
            "application_id",
            "source_id",
            "message",
            "metadata",
        ])
        .map_err(csv_err)?;

    for log in logs {
        let record = &log.record;
        let metadata = log
            .metadata
            .iter()
            .map(|m| format!("{}={}", m.metadata_type, m.metadata_value))
            .collect::<Vec<_>>()
            .join("; ");

        let timestamp = record.timestamp.format(EXPORT_TIMESTAMP_FORMAT).to_string();

        csv_writer
            .write_record([
                record.id.as_str(),
                timestamp.as_str(),
                record.severity_label(),
                record.application_id.as_str(),
                record.source_id.as_str(),
                record.message.as_str(),
                metadata.as_str(),
            ])
            .map_err(csv_err)?;
    }

    csv_writer.flush().map_err(|e| ExportError::Io {
        path: export_path.to_path_buf(),
        source: e,
    })?;

    Ok(logs.len())
}

/// Export records to JSON: a pretty-printed array of objects, each record's
/// fields flattened alongside its `metadata` array.
pub fn export_json<W: Write>(
    logs: &[StoredLog],
    mut writer: W,
    export_path: &Path,
) -> Result<usize, ExportError> {
    serde_json::to_writer_pretty(&mut writer, logs).map_err(|e| ExportError::Json {
        path: export_path.to_path_buf(),
        source: e,
    })?;
    writer.write_all(b"\n").and_then(|()| writer.flush()).map_err(|e| ExportError::Io {
        path: export_path.to_path_buf(),
        source: e,
    })?;
    Ok(logs.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{LogRecord, MetadataEntry, Severity};
    use chrono::NaiveDate;

    fn make_log(id: &str, severity: Option<Severity>, message: &str) -> StoredLog {
        StoredLog {
            record: LogRecord {
                id: id.to_string(),
                timestamp: NaiveDate::from_ymd_opt(2025, 5, 15)
                    .unwrap()
                    .and_hms_milli_opt(14, 32, 20, 500)
                    .unwrap(),
                severity,
                application_id: "App_UUID1".to_string(),
                source_id: "UUID1".to_string(),
                message: message.to_string(),
            },
            metadata: vec![MetadataEntry {
                id: format!("{id}-m"),
                log_id: id.to_string(),
                metadata_type: "threadName".to_string(),
                metadata_value: "main".to_string(),
            }],
        }
    }

    #[test]
    fn test_csv_export() {
        let logs = vec![
            make_log("a", Some(Severity::Error), "first\n\tat Foo.bar(Foo.java:1)\n"),
            make_log("b", None, "second\n"),
        ];
        let mut buf = Vec::new();
        let count = export_csv(&logs, &mut buf, Path::new("out.csv")).unwrap();
        assert_eq!(count, 2);

        let mut reader = csv::Reader::from_reader(buf.as_slice());
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][1], "2025-05-15T14:32:20.500");
        assert_eq!(&rows[0][2], "ERROR");
        assert_eq!(&rows[0][5], "first\n\tat Foo.bar(Foo.java:1)\n");
        assert_eq!(&rows[0][6], "threadName=main");
        assert_eq!(&rows[1][2], "");
    }

    #[test]
    fn test_json_export() {
        let logs = vec![make_log("a", Some(Severity::Warn), "Test message")];
        let mut buf = Vec::new();
        let count = export_json(&logs, &mut buf, Path::new("out.json")).unwrap();
        assert_eq!(count, 1);

        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value[0]["id"], "a");
        assert_eq!(value[0]["severity"], "WARN");
        assert_eq!(value[0]["message"], "Test message");
        assert_eq!(value[0]["metadata"][0]["metadata_type"], "threadName");
    }

    #[test]
    fn test_json_export_missing_severity_is_null() {
        let logs = vec![make_log("a", None, "x")];
        let mut buf = Vec::new();
        export_json(&logs, &mut buf, Path::new("out.json")).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert!(value[0]["severity"].is_null());
    }
}
