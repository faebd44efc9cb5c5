use chrono::{DateTime, Utc};
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use sternview_types::{LogLevel, MAX_BUFFER, MAX_LOGS, StreamConfig, TimeWindow};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("--end requires --start")]
    EndWithoutStart,
}

/// Sternview - stream, pause and filter Kubernetes logs from a stern server
#[derive(Parser, Debug, Default)]
#[command(name = "sternview")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Pod name query (regex, or plain text)
    #[arg(value_name = "QUERY")]
    pub query: Option<String>,

    /// Server base URL
    #[arg(long, value_name = "URL")]
    pub server: Option<String>,

    /// TOML config file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Stream from all namespaces
    #[arg(short = 'A', long)]
    pub all_namespaces: bool,

    /// Label selector
    #[arg(short = 'l', long)]
    pub selector: Option<String>,

    /// Kubeconfig context
    #[arg(long)]
    pub context: Option<String>,

    #[arg(long)]
    pub node: Option<String>,

    /// Relative window such as 5m, 2h, 1d
    #[arg(short, long, conflicts_with = "start")]
    pub since: Option<String>,

    /// Absolute window start (RFC 3339)
    #[arg(long)]
    pub start: Option<DateTime<Utc>>,

    /// Absolute window end (RFC 3339); later entries are dropped
    #[arg(long)]
    pub end: Option<DateTime<Utc>>,

    /// Container name pattern
    #[arg(short, long)]
    pub container: Option<String>,

    /// Comma-separated container patterns to exclude
    #[arg(short = 'E', long)]
    pub exclude_container: Option<String>,

    /// Comma-separated pod patterns to exclude
    #[arg(long)]
    pub exclude_pod: Option<String>,

    /// Comma-separated message patterns to include
    #[arg(short, long)]
    pub include: Option<String>,

    /// Comma-separated message patterns to exclude
    #[arg(short, long)]
    pub exclude: Option<String>,

    /// Comma-separated patterns to highlight
    #[arg(short = 'H', long)]
    pub highlight: Option<String>,

    /// Container state: all, running, waiting, terminated
    #[arg(long)]
    pub container_state: Option<String>,

    /// Lines of history per container (-1 for all)
    #[arg(long, allow_hyphen_values = true)]
    pub tail: Option<i64>,

    /// Server-side timestamp mode: default or short
    #[arg(long)]
    pub timestamps: Option<String>,

    #[arg(long)]
    pub max_log_requests: Option<u32>,

    #[arg(long)]
    pub no_init_containers: bool,

    #[arg(long)]
    pub no_ephemeral_containers: bool,

    /// Exit once history has been streamed
    #[arg(long)]
    pub no_follow: bool,

    /// Only show entries of this level (error, warn, info, debug, unknown)
    #[arg(long)]
    pub level: Option<String>,

    /// Free-text search over message, pod and container
    #[arg(long)]
    pub search: Option<String>,

    /// Live collection size
    #[arg(long)]
    pub buffer_size: Option<usize>,

    /// Diagnostics level written to stderr (e.g. warn, debug)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// Settings loaded from the config file, before CLI overrides
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: String,

    /// Diagnostics level for the stderr subscriber
    pub log_level: String,

    pub buffer_size: usize,

    pub pause_buffer_size: usize,

    /// Display refresh interval in milliseconds
    pub refresh_ms: u64,

    /// Settle delay before reconnecting after an edit, in milliseconds
    pub reconnect_delay_ms: u64,

    pub stream: StreamConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: "ws://localhost:8080".to_string(),
            log_level: "warn".to_string(),
            buffer_size: MAX_LOGS,
            pause_buffer_size: MAX_BUFFER,
            refresh_ms: 250,
            reconnect_delay_ms: 100,
            stream: StreamConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load a config file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Resolve the final configuration from an optional file and CLI flags
    pub fn resolve(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_args(args)?;
        Ok(config)
    }

    /// CLI flags win over file values
    pub fn apply_args(&mut self, args: &Args) -> Result<(), ConfigError> {
        let stream = &mut self.stream;
        let filter = &mut stream.filter;

        set(&mut self.server, &args.server);
        set(&mut self.log_level, &args.log_level);
        if let Some(size) = args.buffer_size {
            self.buffer_size = size;
        }

        set(&mut filter.query, &args.query);
        set(&mut filter.container, &args.container);
        set(&mut filter.exclude_container, &args.exclude_container);
        set(&mut filter.exclude_pod, &args.exclude_pod);
        set(&mut filter.include, &args.include);
        set(&mut filter.exclude, &args.exclude);
        set(&mut filter.search, &args.search);
        if let Some(level) = &args.level {
            filter.level = LogLevel::from_filter(level);
        }

        match (args.start, args.end) {
            (Some(start), end) => filter.window = TimeWindow::Absolute { start, end },
            (None, Some(_)) => return Err(ConfigError::EndWithoutStart),
            (None, None) => {
                if let Some(since) = &args.since {
                    filter.window = TimeWindow::since(since.clone());
                }
            }
        }

        set(&mut stream.namespace, &args.namespace);
        set(&mut stream.selector, &args.selector);
        set(&mut stream.context, &args.context);
        set(&mut stream.node, &args.node);
        set(&mut stream.highlight, &args.highlight);
        set(&mut stream.container_state, &args.container_state);
        set(&mut stream.timestamps, &args.timestamps);
        if let Some(tail) = args.tail {
            stream.tail = tail;
        }
        if let Some(max) = args.max_log_requests {
            stream.max_log_requests = max;
        }
        if args.all_namespaces {
            stream.all_namespaces = true;
        }
        if args.no_init_containers {
            stream.init_containers = false;
        }
        if args.no_ephemeral_containers {
            stream.ephemeral_containers = false;
        }
        if args.no_follow {
            stream.no_follow = true;
        }
        Ok(())
    }
}

fn set(target: &mut String, value: &Option<String>) {
    if let Some(value) = value {
        *target = value.clone();
    }
}
