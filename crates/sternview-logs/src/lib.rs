//! Log processing for sternview
//!
//! This crate provides entry normalization, bounded buffering with pause
//! support, the client-side filter pipeline, pod coloring and export.

mod buffer;
mod color;
mod duration;
mod export;
mod filter;
mod parser;
mod pattern;

pub use buffer::{ArcLogEntry, LogBuffer, LogStore};
pub use color::{POD_COLORS, build_color_map, color_for, hash_name};
pub use duration::{parse_duration, since_cutoff, since_window, window_start};
pub use export::{export_filename, format_json, format_text};
pub use filter::{CompiledFilter, Stage, apply_filters};
pub use parser::{
    LogParser, PARSER_CONTAINER, SERVER_CONTAINER, SYSTEM_POD, detect_level, parse_timestamp,
};
pub use pattern::{Pattern, compile_list, last_segment, matches, split_list};

// Re-export types used in our public API
pub use sternview_types::{FilterConfig, LevelCounts, LogEntry, LogLevel};
