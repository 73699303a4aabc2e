// Regression - core/severity.rs
//
// Severity classification of a reconstructed record.

use crate::core::model::{Severity, TraceGroup};
use regex::Regex;
use std::sync::OnceLock;

fn level_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(INFO|DEBUG|ERROR|WARN)\b").expect("severity: invalid regex")
    })
}

/// Find the severity token on the group's first line.
///
/// Only the anchor line is searched, so `ERROR` inside a stack frame never
/// reclassifies an `INFO` record. Matching is case-sensitive and requires a
/// whole token: `WARNING`, `SEVERE` and `info` are not severities.
pub fn extract_log_level(group: &TraceGroup) -> Option<Severity> {
    let line = group.first_line();
    level_token()
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| Severity::from_token(m.as_str()))
}
