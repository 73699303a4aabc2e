// Regression - core/grouper.rs
//
// Reconstructs discrete log records from the raw text of one log file.
// Core layer: accepts text, never touches the filesystem.
//
// A line whose prefix parses as a timestamp opens a new trace group; every
// other line is a continuation (stack trace frame, pretty-printed JSON body,
// blank separator) and is appended to the group that is currently open.

use crate::core::model::TraceGroup;
use crate::core::timestamp::extract_timestamp;
use crate::util::error::ParseError;
use crate::util::logging::preview;
use chrono::NaiveDateTime;

/// Split `text` into trace groups anchored on timestamped lines.
///
/// Line terminators are preserved, so for a file that starts on a record
/// boundary the chunks are contiguous slices of the input and their lengths
/// add up to the input length.
///
/// Blank lines before the first record belong to no group and are dropped.
/// Empty (or blank-only) input yields an empty list.
///
/// # Errors
/// `ParseError::MissingTimestamp` when the first non-blank line carries no
/// recognisable timestamp. Leading lines are never silently discarded: a file
/// that does not start on a record boundary is misconfigured or truncated.
pub fn compose_trace_groups(text: &str) -> Result<Vec<TraceGroup>, ParseError> {
    let mut groups = Vec::new();
    let mut open: Option<(NaiveDateTime, String)> = None;
    let mut skipped_blank = 0usize;

    for (line_idx, line) in text.split_inclusive('\n').enumerate() {
        if let Some(timestamp) = extract_timestamp(line) {
            if let Some((ts, chunk)) = open.take() {
                groups.push(TraceGroup::new(ts, chunk));
            }
            open = Some((timestamp, line.to_string()));
            continue;
        }

        match open.as_mut() {
            Some((_, chunk)) => chunk.push_str(line),
            None if line.trim().is_empty() => skipped_blank += 1,
            None => {
                let line_number = (line_idx as u64) + 1;
                tracing::debug!(
                    line_number,
                    line = %preview(line.trim_end()),
                    "First log line has no timestamp"
                );
                return Err(ParseError::MissingTimestamp {
                    line_number,
                    preview: preview(line.trim_end()),
                });
            }
        }
    }

    if let Some((ts, chunk)) = open {
        groups.push(TraceGroup::new(ts, chunk));
    }

    if skipped_blank > 0 {
        tracing::debug!(lines = skipped_blank, "Dropped blank lines before first record");
    }

    Ok(groups)
}
