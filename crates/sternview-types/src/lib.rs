//! Shared types for sternview
//!
//! This crate contains data structures used across multiple sternview crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Log Types
// ============================================================================

/// Maximum number of entries retained in the live collection
pub const MAX_LOGS: usize = 5000;

/// Maximum number of entries held while the stream is paused
pub const MAX_BUFFER: usize = 1000;

/// Log severity level, detected once when an entry is normalized
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Unknown,
}

impl LogLevel {
    pub const ALL: [LogLevel; 5] = [
        Self::Error,
        Self::Warn,
        Self::Info,
        Self::Debug,
        Self::Unknown,
    ];

    /// Parse a level filter value. `"all"` and the empty string mean no filter.
    pub fn from_filter(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Unknown => "unknown",
        }
    }

    /// Short display string (3 chars)
    pub fn short(&self) -> &'static str {
        match self {
            Self::Error => "ERR",
            Self::Warn => "WRN",
            Self::Info => "INF",
            Self::Debug => "DBG",
            Self::Unknown => "???",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single normalized log entry. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LogEntry {
    /// Arrival sequence number within the current connection
    #[serde(skip)]
    pub seq: u64,

    /// Display-formatted timestamp
    pub timestamp: String,

    /// Parsed wire timestamp, if the frame carried a usable one
    #[serde(skip)]
    pub time: Option<DateTime<Utc>>,

    /// Source pod name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,

    pub message: String,

    /// Opaque label set, passed through from the wire
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, serde_json::Value>,

    pub level: LogLevel,
}

impl LogEntry {
    /// Create a new log entry with minimal fields
    pub fn new(timestamp: String, message: String, level: LogLevel) -> Self {
        Self {
            seq: 0,
            timestamp,
            time: None,
            pod: None,
            container: None,
            namespace: None,
            node: None,
            message,
            labels: BTreeMap::new(),
            level,
        }
    }

    /// Pod name, or the empty string when absent
    pub fn pod_name(&self) -> &str {
        self.pod.as_deref().unwrap_or("")
    }

    /// Container name, or the empty string when absent
    pub fn container_name(&self) -> &str {
        self.container.as_deref().unwrap_or("")
    }
}

/// Counts per log level
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LevelCounts {
    pub error: usize,
    pub warn: usize,
    pub info: usize,
    pub debug: usize,
    pub unknown: usize,
}

impl LevelCounts {
    pub fn increment(&mut self, level: LogLevel) {
        *self.slot(level) += 1;
    }

    pub fn decrement(&mut self, level: LogLevel) {
        let slot = self.slot(level);
        *slot = slot.saturating_sub(1);
    }

    pub fn get(&self, level: LogLevel) -> usize {
        match level {
            LogLevel::Error => self.error,
            LogLevel::Warn => self.warn,
            LogLevel::Info => self.info,
            LogLevel::Debug => self.debug,
            LogLevel::Unknown => self.unknown,
        }
    }

    pub fn total(&self) -> usize {
        self.error + self.warn + self.info + self.debug + self.unknown
    }

    fn slot(&mut self, level: LogLevel) -> &mut usize {
        match level {
            LogLevel::Error => &mut self.error,
            LogLevel::Warn => &mut self.warn,
            LogLevel::Info => &mut self.info,
            LogLevel::Debug => &mut self.debug,
            LogLevel::Unknown => &mut self.unknown,
        }
    }
}

impl<'a> FromIterator<&'a LogEntry> for LevelCounts {
    fn from_iter<I: IntoIterator<Item = &'a LogEntry>>(iter: I) -> Self {
        let mut counts = Self::default();
        for entry in iter {
            counts.increment(entry.level);
        }
        counts
    }
}

// ============================================================================
// Filter Configuration
// ============================================================================

/// Time window mode. Relative and absolute windows are mutually exclusive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TimeWindow {
    /// Relative window such as `5m`; empty means no time filtering
    Since { duration: String },
    /// Absolute window; entries after `end` are dropped on arrival
    Absolute {
        start: DateTime<Utc>,
        #[serde(default)]
        end: Option<DateTime<Utc>>,
    },
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self::Since {
            duration: String::new(),
        }
    }
}

impl TimeWindow {
    pub fn since(duration: impl Into<String>) -> Self {
        Self::Since {
            duration: duration.into(),
        }
    }

    /// The relative duration token, if in relative mode
    pub fn since_token(&self) -> Option<&str> {
        match self {
            Self::Since { duration } => Some(duration.as_str()),
            Self::Absolute { .. } => None,
        }
    }

    /// The absolute end cutoff, if in absolute mode with an end set
    pub fn end_cutoff(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Since { .. } => None,
            Self::Absolute { end, .. } => *end,
        }
    }
}

/// Client-side narrowing criteria. Each field is independent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Exact level match (None = all levels)
    pub level: Option<LogLevel>,

    /// Free-text search over message, pod and container
    pub search: String,

    /// Pod name pattern (`.` or empty = all pods)
    pub query: String,

    pub window: TimeWindow,

    /// Comma-separated message patterns, at least one must match
    pub include: String,

    /// Comma-separated message patterns, none may match
    pub exclude: String,

    /// Container name pattern
    pub container: String,

    /// Comma-separated container patterns to drop
    pub exclude_container: String,

    /// Comma-separated pod patterns to drop
    pub exclude_pod: String,
}

// ============================================================================
// Stream Configuration
// ============================================================================

/// Full configuration for one logical stream: the client-side filters plus
/// the fields that only the server can honour.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub filter: FilterConfig,

    pub namespace: String,

    /// Label selector
    pub selector: String,

    pub node: String,

    /// Kubeconfig context
    pub context: String,

    pub all_namespaces: bool,

    /// `all`, `running`, `waiting` or `terminated`
    pub container_state: String,

    pub init_containers: bool,

    pub ephemeral_containers: bool,

    /// Timestamp mode (empty = none, `default`, `short`)
    pub timestamps: String,

    /// Lines of history per container (-1 = all)
    pub tail: i64,

    pub no_follow: bool,

    /// Comma-separated highlight patterns
    pub highlight: String,

    /// Concurrency cap on log requests issued by the server
    pub max_log_requests: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            filter: FilterConfig {
                query: ".".to_string(),
                ..FilterConfig::default()
            },
            namespace: String::new(),
            selector: String::new(),
            node: String::new(),
            context: String::new(),
            all_namespaces: false,
            container_state: "all".to_string(),
            init_containers: true,
            ephemeral_containers: true,
            timestamps: String::new(),
            tail: -1,
            no_follow: false,
            highlight: String::new(),
            max_log_requests: 50,
        }
    }
}

// ============================================================================
// Connection State
// ============================================================================

/// Transport-level connection state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Connection state and pause flag, read together as one value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct StreamStatus {
    pub connection: ConnectionState,
    pub paused: bool,
}

impl StreamStatus {
    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }

    /// Display label; `Paused` only applies on top of `Connected`
    pub fn label(&self) -> &'static str {
        match self.connection {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected if self.paused => "Paused",
            ConnectionState::Connected => "Connected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_filter() {
        assert_eq!(LogLevel::from_filter("error"), Some(LogLevel::Error));
        assert_eq!(LogLevel::from_filter("WARN"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_filter("all"), None);
        assert_eq!(LogLevel::from_filter(""), None);
    }

    #[test]
    fn test_entry_serializes_sparse() {
        let mut entry = LogEntry::new("10:00:00".into(), "hello".into(), LogLevel::Info);
        entry.pod = Some("api-1".into());
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["pod"], "api-1");
        assert_eq!(json["level"], "info");
        assert!(json.get("container").is_none());
        assert!(json.get("labels").is_none());
        assert!(json.get("seq").is_none());
    }

    #[test]
    fn test_level_counts() {
        let mut counts = LevelCounts::default();
        counts.increment(LogLevel::Error);
        counts.increment(LogLevel::Error);
        counts.increment(LogLevel::Debug);
        counts.decrement(LogLevel::Error);
        counts.decrement(LogLevel::Warn);
        assert_eq!(counts.get(LogLevel::Error), 1);
        assert_eq!(counts.warn, 0);
        assert_eq!(counts.total(), 2);
    }

    #[test]
    fn test_status_label() {
        let mut status = StreamStatus {
            connection: ConnectionState::Connected,
            paused: true,
        };
        assert_eq!(status.label(), "Paused");
        status.connection = ConnectionState::Disconnected;
        assert_eq!(status.label(), "Disconnected");
    }

    #[test]
    fn test_time_window_deserialize() {
        let window: TimeWindow =
            serde_json::from_str(r#"{"mode":"since","duration":"5m"}"#).unwrap();
        assert_eq!(window.since_token(), Some("5m"));

        let window: TimeWindow = serde_json::from_str(
            r#"{"mode":"absolute","start":"2024-01-15T10:00:00Z","end":"2024-01-15T11:00:00Z"}"#,
        )
        .unwrap();
        assert!(window.since_token().is_none());
        assert!(window.end_cutoff().is_some());
    }
}
