use thiserror::Error;

use sternview_types::{LogLevel, StreamConfig, TimeWindow};

/// Export format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Text,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Json => "json",
        }
    }
}

/// Server-side fields that can be edited while streaming
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamField {
    Query,
    Namespace,
    Selector,
    Node,
    Since,
    Include,
    Exclude,
    Container,
    ExcludeContainer,
    ExcludePod,
    Highlight,
}

impl StreamField {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "query" | "q" => Self::Query,
            "namespace" | "ns" => Self::Namespace,
            "selector" | "l" => Self::Selector,
            "node" => Self::Node,
            "since" => Self::Since,
            "include" => Self::Include,
            "exclude" => Self::Exclude,
            "container" => Self::Container,
            "exclude-container" => Self::ExcludeContainer,
            "exclude-pod" => Self::ExcludePod,
            "highlight" => Self::Highlight,
            _ => return None,
        })
    }

    /// Write `value` into the matching field of `config`
    pub fn apply(&self, config: &mut StreamConfig, value: &str) {
        let value = value.to_string();
        let filter = &mut config.filter;
        match self {
            Self::Query => filter.query = value,
            Self::Namespace => config.namespace = value,
            Self::Selector => config.selector = value,
            Self::Node => config.node = value,
            Self::Since => filter.window = TimeWindow::since(value),
            Self::Include => filter.include = value,
            Self::Exclude => filter.exclude = value,
            Self::Container => filter.container = value,
            Self::ExcludeContainer => filter.exclude_container = value,
            Self::ExcludePod => filter.exclude_pod = value,
            Self::Highlight => config.highlight = value,
        }
    }

    /// Whether changing this field needs a new connection
    pub fn needs_reconnect(&self) -> bool {
        !matches!(self, Self::Highlight)
    }
}

/// A line typed on stdin
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    TogglePause,
    /// Empty clears the search
    Search(String),
    Level(Option<LogLevel>),
    Set(StreamField, String),
    Clear,
    Reconnect,
    Disconnect,
    Export(ExportFormat),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command '{0}', type 'help'")]
    Unknown(String),

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("usage: {0}")]
    Usage(&'static str),
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim();
        if let Some(search) = line.strip_prefix('/') {
            return Ok(Self::Search(search.trim().to_string()));
        }

        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word {
            "p" | "pause" | "resume" => Ok(Self::TogglePause),
            "level" => {
                if rest.is_empty() {
                    return Err(CommandError::Usage("level <error|warn|info|debug|unknown|all>"));
                }
                Ok(Self::Level(LogLevel::from_filter(rest)))
            }
            "set" => {
                let (name, value) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                if name.is_empty() {
                    return Err(CommandError::Usage("set <field> [value]"));
                }
                let field = StreamField::from_name(name)
                    .ok_or_else(|| CommandError::UnknownField(name.to_string()))?;
                Ok(Self::Set(field, value.trim().to_string()))
            }
            "c" | "clear" => Ok(Self::Clear),
            "r" | "reconnect" => Ok(Self::Reconnect),
            "d" | "disconnect" => Ok(Self::Disconnect),
            "export" => match rest {
                "" | "text" | "txt" => Ok(Self::Export(ExportFormat::Text)),
                "json" => Ok(Self::Export(ExportFormat::Json)),
                _ => Err(CommandError::Usage("export [text|json]")),
            },
            "s" | "status" => Ok(Self::Status),
            "h" | "help" | "?" => Ok(Self::Help),
            "q" | "quit" | "exit" => Ok(Self::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

pub const HELP: &str = "\
commands:
  p | pause          pause or resume the stream
  /<text>            search message, pod and container (/ alone clears)
  level <lvl|all>    show only one level
  set <field> <v>    edit query, namespace, selector, node, since, include,
                     exclude, container, exclude-container, exclude-pod, highlight
  c | clear          clear collected entries
  r | reconnect      reconnect with the current settings
  d | disconnect     close the stream
  export [text|json] write the filtered view to a file
  s | status         show stream status
  q | quit           exit";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search() {
        assert_eq!(Command::parse("/db timeout"), Ok(Command::Search("db timeout".into())));
        assert_eq!(Command::parse("/"), Ok(Command::Search(String::new())));
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(Command::parse("level error"), Ok(Command::Level(Some(LogLevel::Error))));
        assert_eq!(Command::parse("level all"), Ok(Command::Level(None)));
        assert!(matches!(Command::parse("level"), Err(CommandError::Usage(_))));
    }

    #[test]
    fn test_parse_set() {
        assert_eq!(
            Command::parse("set exclude healthz, metrics"),
            Ok(Command::Set(StreamField::Exclude, "healthz, metrics".into()))
        );
        assert_eq!(
            Command::parse("set since"),
            Ok(Command::Set(StreamField::Since, String::new()))
        );
        assert_eq!(
            Command::parse("set color red"),
            Err(CommandError::UnknownField("color".into()))
        );
    }

    #[test]
    fn test_parse_simple() {
        assert_eq!(Command::parse(" p "), Ok(Command::TogglePause));
        assert_eq!(Command::parse("export json"), Ok(Command::Export(ExportFormat::Json)));
        assert_eq!(Command::parse("export"), Ok(Command::Export(ExportFormat::Text)));
        assert_eq!(Command::parse("q"), Ok(Command::Quit));
        assert_eq!(Command::parse("frobnicate"), Err(CommandError::Unknown("frobnicate".into())));
    }

    #[test]
    fn test_field_apply() {
        let mut config = StreamConfig::default();
        StreamField::Since.apply(&mut config, "10m");
        StreamField::Namespace.apply(&mut config, "prod");
        assert_eq!(config.filter.window.since_token(), Some("10m"));
        assert_eq!(config.namespace, "prod");
        assert!(!StreamField::Highlight.needs_reconnect());
        assert!(StreamField::ExcludePod.needs_reconnect());
    }
}
