use std::io::{self, Write};

use sternview_client::StreamSummary;
use sternview_logs::{ArcLogEntry, LogEntry, LogLevel, Pattern, color_for, compile_list};

const RESET: &str = "\x1b[0m";
const INVERSE: &str = "\x1b[7m";
const NO_INVERSE: &str = "\x1b[27m";

/// Line-mode renderer for the filtered view.
///
/// Entries are printed once, in arrival order; `render` only writes entries
/// newer than the last one printed.
pub struct Printer<W: Write> {
    out: W,
    last_seq: Option<u64>,
    highlight: Vec<Pattern>,
    color: bool,
}

impl<W: Write> Printer<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self {
            out,
            last_seq: None,
            highlight: Vec::new(),
            color,
        }
    }

    /// Comma-separated highlight patterns
    pub fn set_highlight(&mut self, list: &str) {
        self.highlight = compile_list(list);
    }

    /// Forget what was printed; call after a reconnect
    pub fn reset(&mut self) {
        self.last_seq = None;
    }

    /// Print entries not yet shown. Returns how many lines were written.
    pub fn render(&mut self, entries: &[ArcLogEntry]) -> io::Result<usize> {
        let start = match self.last_seq {
            Some(last) => entries.partition_point(|e| e.seq <= last),
            None => 0,
        };
        self.write_entries(&entries[start..])
    }

    /// Reprint the last `tail` entries after the filter changed
    pub fn redraw(&mut self, entries: &[ArcLogEntry], tail: usize) -> io::Result<usize> {
        writeln!(self.out, "{}", self.dim("-- filter changed --"))?;
        let start = entries.len().saturating_sub(tail);
        self.write_entries(&entries[start..])
    }

    pub fn message(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{}", self.dim(text))?;
        self.out.flush()
    }

    fn write_entries(&mut self, entries: &[ArcLogEntry]) -> io::Result<usize> {
        for entry in entries {
            let line = self.format_line(entry);
            writeln!(self.out, "{line}")?;
            self.last_seq = Some(entry.seq);
        }
        self.out.flush()?;
        Ok(entries.len())
    }

    pub fn format_line(&self, entry: &LogEntry) -> String {
        let pod = entry.pod_name();
        let message = self.highlighted(&entry.message);
        if !self.color {
            return format!(
                "{} {} {} {} {}",
                entry.timestamp,
                entry.level.short(),
                pod,
                entry.container_name(),
                message
            );
        }
        format!(
            "{} {}{}{} {}{}{} {} {}",
            entry.timestamp,
            level_color(entry.level),
            entry.level.short(),
            RESET,
            hex_to_ansi(color_for(pod)),
            pod,
            RESET,
            entry.container_name(),
            message
        )
    }

    fn highlighted(&self, message: &str) -> String {
        if !self.color || self.highlight.is_empty() {
            return message.to_string();
        }
        let mut ranges: Vec<(usize, usize)> = self
            .highlight
            .iter()
            .flat_map(|p| p.find_matches(message))
            .filter(|(s, e)| s < e && message.is_char_boundary(*s) && message.is_char_boundary(*e))
            .collect();
        if ranges.is_empty() {
            return message.to_string();
        }
        ranges.sort_unstable();

        let mut out = String::with_capacity(message.len() + ranges.len() * 10);
        let mut pos = 0;
        for (start, end) in ranges {
            let start = start.max(pos);
            if start >= end {
                continue;
            }
            out.push_str(&message[pos..start]);
            out.push_str(INVERSE);
            out.push_str(&message[start..end]);
            out.push_str(NO_INVERSE);
            pos = end;
        }
        out.push_str(&message[pos..]);
        out
    }

    fn dim(&self, text: &str) -> String {
        if self.color {
            format!("\x1b[2m{text}{RESET}")
        } else {
            text.to_string()
        }
    }
}

/// One-line status summary
pub fn format_summary(summary: &StreamSummary) -> String {
    let counts = &summary.level_counts;
    let mut line = format!(
        "{} | {}/{} shown | {} pods | error {} warn {} info {} debug {} unknown {}",
        summary.status.label(),
        summary.filtered,
        summary.total,
        summary.pods,
        counts.error,
        counts.warn,
        counts.info,
        counts.debug,
        counts.unknown,
    );
    if summary.status.paused {
        line.push_str(&format!(" | {} buffered", summary.buffered));
    }
    line
}

fn level_color(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "\x1b[31m",
        LogLevel::Warn => "\x1b[33m",
        LogLevel::Info => "\x1b[32m",
        LogLevel::Debug => "\x1b[90m",
        LogLevel::Unknown => "\x1b[37m",
    }
}

/// `#rrggbb` to a 24-bit foreground escape
fn hex_to_ansi(hex: &str) -> String {
    let hex = hex.trim_start_matches('#');
    let channel = |i: usize| {
        hex.get(i..i + 2)
            .and_then(|c| u8::from_str_radix(c, 16).ok())
            .unwrap_or(255)
    };
    format!("\x1b[38;2;{};{};{}m", channel(0), channel(2), channel(4))
}
