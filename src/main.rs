mod command;
mod config;
mod display;

use std::io::{self, ErrorKind, IsTerminal, Stdout};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

use sternview_client::{ConnectionManager, ReconnectDebouncer, StreamView, WebSocketTransport};
use sternview_logs::{
    ArcLogEntry, CompiledFilter, LogStore, export_filename, format_json, format_text,
};
use sternview_types::ConnectionState;

use crate::command::{Command, ExportFormat, HELP};
use crate::config::{AppConfig, Args};
use crate::display::{Printer, format_summary};

/// Entries reprinted after a client-side filter change
const REDRAW_TAIL: usize = 50;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = AppConfig::resolve(&args)?;

    // Diagnostics go to stderr so they never mix with log lines
    let directive: Directive = config
        .log_level
        .parse()
        .with_context(|| format!("invalid log level '{}'", config.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive))
        .with_writer(std::io::stderr)
        .init();

    let result = run(config).await;

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

struct App {
    config: AppConfig,
    manager: ConnectionManager<WebSocketTransport>,
    view: StreamView,
    debouncer: ReconnectDebouncer,
    printer: Printer<Stdout>,
    filter: CompiledFilter,
}

/// What the main loop should do after a command
enum Flow {
    Continue,
    Quit,
}

/// One read from stdin
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Line(String),
    Skip,
    Closed,
}

impl Input {
    fn from_read(read: io::Result<Option<String>>) -> Self {
        match read {
            Ok(Some(line)) if line.trim().is_empty() => Self::Skip,
            Ok(Some(line)) => Self::Line(line),
            Ok(None) => Self::Closed,
            // The bad line is consumed; the next read starts after it
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                tracing::warn!(error = %e, "ignoring unreadable input line");
                Self::Skip
            }
            Err(e) => {
                tracing::warn!(error = %e, "stdin read failed, commands disabled");
                Self::Closed
            }
        }
    }
}

async fn run(config: AppConfig) -> Result<()> {
    let store = LogStore::with_capacity(config.buffer_size, config.pause_buffer_size);
    let manager = ConnectionManager::with_store(WebSocketTransport, config.server.clone(), store)
        .with_span(tracing::info_span!("stream", server = %config.server));

    let stdout = std::io::stdout();
    let color = stdout.is_terminal();
    let mut printer = Printer::new(stdout, color);
    printer.set_highlight(&config.stream.highlight);

    let mut app = App {
        view: manager.view(),
        filter: CompiledFilter::new(&config.stream.filter, Utc::now()),
        debouncer: ReconnectDebouncer::new(Duration::from_millis(config.reconnect_delay_ms)),
        manager,
        printer,
        config,
    };

    app.connect();

    let mut ticker = tokio::time::interval(Duration::from_millis(app.config.refresh_ms.max(10)));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                app.render()?;
                if app.finished() {
                    tracing::debug!("stream finished");
                    break;
                }
            }
            line = lines.next_line(), if stdin_open => {
                match Input::from_read(line) {
                    Input::Line(line) => {
                        if let Flow::Quit = app.handle_line(&line)? {
                            break;
                        }
                    }
                    Input::Skip => {}
                    Input::Closed => stdin_open = false,
                }
            }
            config = app.debouncer.ready() => {
                app.config.stream = config;
                app.connect();
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    app.manager.disconnect();
    Ok(())
}

impl App {
    fn connect(&mut self) {
        self.debouncer.cancel();
        self.filter = CompiledFilter::new(&self.config.stream.filter, Utc::now());
        self.manager.connect(&self.config.stream);
        self.printer.reset();
    }

    /// The filtered view, with the since window ending now
    fn filtered(&mut self) -> Vec<ArcLogEntry> {
        self.filter.reanchor(Utc::now());
        self.view.filtered(&self.filter)
    }

    fn render(&mut self) -> Result<()> {
        let entries = self.filtered();
        self.printer
            .render(&entries)
            .context("failed to write to stdout")?;
        Ok(())
    }

    /// A `--no-follow` stream is done once the server closed it
    fn finished(&self) -> bool {
        self.config.stream.no_follow
            && !self.manager.is_running()
            && !self.debouncer.is_pending()
    }

    fn refilter(&mut self) -> Result<()> {
        self.filter = CompiledFilter::new(&self.config.stream.filter, Utc::now());
        let entries = self.filtered();
        self.printer
            .redraw(&entries, REDRAW_TAIL)
            .context("failed to write to stdout")?;
        Ok(())
    }

    fn handle_line(&mut self, line: &str) -> Result<Flow> {
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => {
                self.printer.message(&e.to_string())?;
                return Ok(Flow::Continue);
            }
        };
        tracing::debug!(?command, "command");

        match command {
            Command::TogglePause => {
                let paused = self.view.toggle_pause();
                self.printer
                    .message(if paused { "paused" } else { "resumed" })?;
            }
            Command::Search(search) => {
                self.config.stream.filter.search = search;
                self.refilter()?;
            }
            Command::Level(level) => {
                self.config.stream.filter.level = level;
                self.refilter()?;
            }
            Command::Set(field, value) => {
                field.apply(&mut self.config.stream, &value);
                if !field.needs_reconnect() {
                    self.printer.set_highlight(&self.config.stream.highlight);
                } else if self.view.status().connection != ConnectionState::Disconnected {
                    self.debouncer.schedule(self.config.stream.clone());
                } else {
                    self.refilter()?;
                    self.printer
                        .message("applied; 'reconnect' to restart the stream")?;
                }
            }
            Command::Clear => {
                self.view.clear();
                self.printer.message("cleared")?;
            }
            Command::Reconnect => self.connect(),
            Command::Disconnect => {
                self.debouncer.cancel();
                self.manager.disconnect();
                self.printer.message("disconnected")?;
            }
            Command::Export(format) => match self.export(format) {
                Ok(filename) => self.printer.message(&format!("exported to {filename}"))?,
                Err(e) => {
                    tracing::warn!(error = %e, "export failed");
                    self.printer.message(&format!("export failed: {e:#}"))?;
                }
            },
            Command::Status => {
                self.filter.reanchor(Utc::now());
                let summary = self.view.summary(&self.filter);
                self.printer.message(&format_summary(&summary))?;
            }
            Command::Help => self.printer.message(HELP)?,
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    /// Write the filtered view to a timestamped file in the working directory
    fn export(&mut self, format: ExportFormat) -> Result<String> {
        let entries = self.filtered();
        let content = match format {
            ExportFormat::Text => format_text(&entries),
            ExportFormat::Json => format_json(&entries).context("failed to encode entries")?,
        };
        let filename = export_filename(format.extension(), Utc::now());
        std::fs::write(&filename, content)
            .with_context(|| format!("failed to write {filename}"))?;
        tracing::info!(%filename, count = entries.len(), "exported");
        Ok(filename)
    }
}
