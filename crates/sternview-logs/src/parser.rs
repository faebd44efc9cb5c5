use chrono::{DateTime, Local, NaiveDateTime, Utc};
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use sternview_types::{LogEntry, LogLevel};

/// Pod name given to entries synthesized by the client
pub const SYSTEM_POD: &str = "system";

/// Container name for frames that failed to decode
pub const PARSER_CONTAINER: &str = "parser";

/// Container name for error frames reported by the server
pub const SERVER_CONTAINER: &str = "server";

/// Level patterns in precedence order
static LEVEL_PATTERNS: LazyLock<Vec<(LogLevel, Regex)>> = LazyLock::new(|| {
    [
        (LogLevel::Error, r"\b(error|err|fatal|panic|exception)\b"),
        (LogLevel::Warn, r"\b(warn|warning)\b"),
        (LogLevel::Debug, r"\b(debug|trace)\b"),
    ]
    .into_iter()
    .map(|(level, pattern)| {
        let re = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .expect("level pattern is valid");
        (level, re)
    })
    .collect()
});

/// One frame as emitted by the server
#[derive(Deserialize)]
#[serde(untagged)]
enum WireFrame {
    Line(WireLine),
    Error { error: String },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireLine {
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    pod_name: Option<String>,
    #[serde(default)]
    container_name: Option<String>,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    node_name: Option<String>,
    message: String,
    #[serde(default)]
    labels: Option<BTreeMap<String, Value>>,
}

/// Converts raw wire frames into log entries. Never fails: a frame that
/// cannot be decoded becomes a diagnostic entry carrying the raw payload.
pub struct LogParser;

impl LogParser {
    /// Parse one raw frame, using the wall clock for entries without a timestamp
    pub fn parse(raw: &str) -> LogEntry {
        Self::parse_at(raw, Utc::now())
    }

    /// Parse one raw frame with an explicit arrival time
    pub fn parse_at(raw: &str, now: DateTime<Utc>) -> LogEntry {
        match serde_json::from_str::<WireFrame>(raw) {
            Ok(WireFrame::Line(line)) => Self::from_wire(line, now),
            Ok(WireFrame::Error { error }) => {
                tracing::debug!(%error, "server reported stream error");
                let mut entry = LogEntry::new(format_display(now), error, LogLevel::Error);
                entry.pod = Some(SYSTEM_POD.to_string());
                entry.container = Some(SERVER_CONTAINER.to_string());
                entry
            }
            Err(e) => {
                tracing::trace!(error = %e, "undecodable frame");
                let mut entry =
                    LogEntry::new(format_display(now), raw.to_string(), LogLevel::Unknown);
                entry.pod = Some(SYSTEM_POD.to_string());
                entry.container = Some(PARSER_CONTAINER.to_string());
                entry
            }
        }
    }

    fn from_wire(line: WireLine, now: DateTime<Utc>) -> LogEntry {
        let time = line.timestamp.as_deref().and_then(parse_timestamp);
        let timestamp = format_display(time.unwrap_or(now));
        let level = detect_level(&line.message);

        let mut entry = LogEntry::new(timestamp, line.message, level);
        entry.time = time;
        entry.pod = non_empty(line.pod_name);
        entry.container = non_empty(line.container_name);
        entry.namespace = non_empty(line.namespace);
        entry.node = non_empty(line.node_name);
        entry.labels = line.labels.unwrap_or_default();
        entry
    }
}

/// Detect the level of a message: first match among error, warn, debug;
/// otherwise info.
pub fn detect_level(message: &str) -> LogLevel {
    LEVEL_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(message))
        .map(|(level, _)| *level)
        .unwrap_or(LogLevel::Info)
}

/// Parse a wire timestamp (RFC 3339, or a naive ISO-8601 time taken as UTC)
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Format an instant for display in the local timezone
fn format_display(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local).format("%H:%M:%S").to_string()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}
