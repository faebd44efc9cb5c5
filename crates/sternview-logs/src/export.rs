use chrono::{DateTime, Utc};
use std::sync::Arc;

use sternview_types::LogEntry;

/// Format entries as plain text, one `[timestamp] pod/container: message` per line
pub fn format_text(entries: &[Arc<LogEntry>]) -> String {
    entries
        .iter()
        .map(|e| {
            format!(
                "[{}] {}/{}: {}",
                e.timestamp,
                e.pod_name(),
                e.container_name(),
                e.message
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format entries as a pretty-printed JSON array
pub fn format_json(entries: &[Arc<LogEntry>]) -> serde_json::Result<String> {
    let records: Vec<&LogEntry> = entries.iter().map(Arc::as_ref).collect();
    serde_json::to_string_pretty(&records)
}

/// Export file name such as `sternview-logs-2024-01-15T10-30-00.txt`, stamped in UTC
pub fn export_filename(extension: &str, now: DateTime<Utc>) -> String {
    format!(
        "sternview-logs-{}.{}",
        now.format("%Y-%m-%dT%H-%M-%S"),
        extension
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use sternview_types::LogLevel;

    fn sample() -> Vec<Arc<LogEntry>> {
        let mut a = LogEntry::new("10:00:00".into(), "started".into(), LogLevel::Info);
        a.pod = Some("api-1".into());
        a.container = Some("api".into());
        let b = LogEntry::new("10:00:01".into(), "raw frame".into(), LogLevel::Unknown);
        vec![Arc::new(a), Arc::new(b)]
    }

    #[test]
    fn test_format_text() {
        let text = format_text(&sample());
        assert_eq!(text, "[10:00:00] api-1/api: started\n[10:00:01] /: raw frame");
        assert_eq!(format_text(&[]), "");
    }

    #[test]
    fn test_format_json() {
        let json = format_json(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let records = value.as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["pod"], "api-1");
        assert_eq!(records[0]["timestamp"], "10:00:00");
        assert_eq!(records[1]["level"], "unknown");
    }

    #[test]
    fn test_export_filename() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(export_filename("json", now), "sternview-logs-2024-01-15T10-30-00.json");

        // Offset clocks are converted, not used as-is
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let local = offset.with_ymd_and_hms(2024, 1, 15, 12, 30, 0).unwrap();
        assert_eq!(
            export_filename("txt", local.with_timezone(&Utc)),
            "sternview-logs-2024-01-15T10-30-00.txt"
        );
    }
}
