// Regression - core/metadata.rs
//
// Regex-driven metadata extraction. Each rule is applied to a record's full
// chunk (stack trace included) and contributes at most one entry.
//
// Rule order is part of the contract: entries for one record are produced in
// table order, built-in rules first, then any rules loaded from config.

use crate::core::model::{LogRecord, MetadataEntry, TraceGroup};
use regex::Regex;
use std::sync::OnceLock;

/// A named, compiled metadata pattern.
#[derive(Debug, Clone)]
pub struct RegexRule {
    /// Stored as `metadata_type` on every entry the rule produces.
    pub name: String,
    regex: Regex,
}

impl RegexRule {
    /// Compile a rule.
    ///
    /// # Errors
    /// The pattern's compile error.
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            regex: Regex::new(pattern)?,
        })
    }

    /// The source pattern text.
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// The extracted value for `text`: capture group 1 when it participated,
    /// otherwise the whole match.
    pub fn capture<'t>(&self, text: &'t str) -> Option<&'t str> {
        let caps = self.regex.captures(text)?;
        caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str())
    }
}

/// Built-in `(name, pattern)` table, in application order.
///
/// Each pattern's first capture group is the stored value.
const BUILTIN_RULES: &[(&str, &str)] = &[
    ("clientIpAddress", r"(\d{1,3}(?:\.\d{1,3}){3})"),
    ("requestLatencyMs", r"time(?:Taken)?[=: ]+(\d+)(ms)?"),
    ("configuredPort", r"\bport\s*=\s*(\d{1,5})"),
    ("tomcatStartupPort", r"Tomcat started on port\(s\): (\d+)"),
    ("sessionId", r"JSESSIONID=([A-Fa-f0-9]+)"),
    // Class and message together, up to end of line.
    ("exceptionClassAndMessage", r"([a-zA-Z0-9_.]+Exception: .+)"),
    ("exceptionClass", r"\b([a-zA-Z0-9_.]+Exception)\b"),
    ("traceIdentifier", r"traceId[=: ]?([a-f0-9\-]+)"),
    ("threadName", r"\[(.*?)\]"),
    ("logSeverityLevel", r"(INFO|DEBUG|ERROR|WARN)"),
    ("sourceLoggerClass", r"(?:INFO|DEBUG|ERROR|WARN)\s+([a-zA-Z0-9_.]+)\s*-"),
    ("processId", r"\bpid[=: ]?(\d+)"),
    ("httpQueryParameters", r"\?([^\s]+)"),
    ("httpHostHeader", r"Host:\s*([^\s]+)"),
    // Stays on one line so the next record's text is never swallowed.
    ("activeProfiles", r"The following profiles are active: ([\w, \t]+)"),
    ("userAgentHeader", r"User-Agent:\s*([^\r\n]+)"),
    (
        "httpRequestMethodAndPath",
        r#""((?:GET|POST|PUT|DELETE|PATCH|OPTIONS|HEAD)\s+[^\s]+)"#,
    ),
    (
        "httpRequestPath",
        r#""(?:GET|POST|PUT|DELETE|PATCH|OPTIONS|HEAD)\s+([^\s?]+)"#,
    ),
    ("httpResponseStatusCode", r#""\s(\d{3})\s"#),
];

/// The shipped rule table, compiled once.
pub fn default_rules() -> &'static [RegexRule] {
    static RULES: OnceLock<Vec<RegexRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        BUILTIN_RULES
            .iter()
            .map(|(name, pattern)| {
                RegexRule::new(*name, pattern).expect("metadata: invalid built-in regex")
            })
            .collect()
    })
}

/// Apply one rule to a group's chunk, producing an entry owned by `record`.
///
/// Returns `None` when the rule does not match.
pub fn extract_metadata_by_regex(
    record: &LogRecord,
    group: &TraceGroup,
    rule: &RegexRule,
) -> Option<MetadataEntry> {
    let value = rule.capture(&group.chunk)?;
    Some(MetadataEntry {
        id: uuid::Uuid::new_v4().to_string(),
        log_id: record.id.clone(),
        metadata_type: rule.name.clone(),
        metadata_value: value.to_string(),
    })
}

/// Apply every rule in order; one entry per matching rule.
pub fn extract_all_metadata(
    record: &LogRecord,
    group: &TraceGroup,
    rules: &[RegexRule],
) -> Vec<MetadataEntry> {
    rules
        .iter()
        .filter_map(|rule| extract_metadata_by_regex(record, group, rule))
        .collect()
}
