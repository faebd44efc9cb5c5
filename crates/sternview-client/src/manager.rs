use chrono::{DateTime, Utc};
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};

use sternview_logs::{ArcLogEntry, CompiledFilter, LogParser, LogStore, build_color_map};
use sternview_types::{ConnectionState, LevelCounts, StreamConfig, StreamStatus};

use crate::query::StreamQuery;
use crate::transport::Transport;

/// State shared between the manager and its stream task
#[derive(Debug, Default)]
struct Session {
    store: LogStore,

    /// Bumped on every teardown; frames from older streams are rejected
    generation: u64,

    /// Entries stamped after this instant are dropped on arrival
    end_cutoff: Option<DateTime<Utc>>,
}

impl Session {
    /// Normalize and absorb one frame. Returns false if the stream is stale.
    fn deliver(&mut self, generation: u64, raw: &str) -> bool {
        if self.generation != generation {
            return false;
        }
        let entry = LogParser::parse(raw);
        if let (Some(cutoff), Some(time)) = (self.end_cutoff, entry.time) {
            if time > cutoff {
                tracing::trace!(%time, "entry after window end, dropped");
                return true;
            }
        }
        self.store.ingest(entry);
        true
    }

    fn finish(&mut self, generation: u64) {
        if self.generation == generation {
            self.store.set_connection(ConnectionState::Disconnected);
        }
    }
}

/// Snapshot of a stream for status displays
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub status: StreamStatus,
    pub total: usize,
    pub filtered: usize,
    pub pods: usize,
    pub buffered: usize,
    pub level_counts: LevelCounts,
}

/// Cloneable handle to a stream's entries and pause state, for the display
/// layer. Readers only ever get copies of the live collection.
#[derive(Clone, Debug)]
pub struct StreamView {
    session: Arc<Mutex<Session>>,
}

impl StreamView {
    pub fn status(&self) -> StreamStatus {
        self.session.lock().store.status()
    }

    /// Snapshot of the live collection
    pub fn entries(&self) -> Vec<ArcLogEntry> {
        self.session.lock().store.entries()
    }

    /// Entries of the live collection that pass `filter`
    pub fn filtered(&self, filter: &CompiledFilter) -> Vec<ArcLogEntry> {
        filter.apply(self.session.lock().store.live().iter())
    }

    pub fn level_counts(&self) -> LevelCounts {
        self.session.lock().store.level_counts()
    }

    /// Color for every pod currently in the live collection
    pub fn color_map(&self) -> BTreeMap<String, &'static str> {
        build_color_map(self.session.lock().store.live().iter())
    }

    pub fn len(&self) -> usize {
        self.session.lock().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.session.lock().store.is_empty()
    }

    pub fn buffered_count(&self) -> usize {
        self.session.lock().store.buffered_count()
    }

    pub fn pause(&self) {
        self.session.lock().store.pause();
    }

    pub fn resume(&self) {
        self.session.lock().store.resume();
    }

    /// Returns the new pause flag
    pub fn toggle_pause(&self) -> bool {
        self.session.lock().store.toggle_pause()
    }

    /// Empty the live collection without touching the connection
    pub fn clear(&self) {
        self.session.lock().store.clear();
    }

    pub fn summary(&self, filter: &CompiledFilter) -> StreamSummary {
        let session = self.session.lock();
        let live = session.store.live();
        StreamSummary {
            status: session.store.status(),
            total: live.len(),
            filtered: live.iter().filter(|e| filter.matches(e)).count(),
            pods: build_color_map(live.iter()).len(),
            buffered: session.store.buffered_count(),
            level_counts: live.level_counts(),
        }
    }
}

struct ActiveStream {
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

/// Owns the single live connection of one logical stream.
///
/// `connect` always tears down the previous connection before opening a new
/// one, so at most one stream task ever writes to the shared log store.
/// There is no automatic retry: after a transport failure the stream stays
/// `Disconnected` until the caller connects again.
pub struct ConnectionManager<T: Transport> {
    transport: Arc<T>,

    /// Server base URL, e.g. `ws://localhost:8080`
    endpoint: String,

    session: Arc<Mutex<Session>>,

    active: Option<ActiveStream>,

    span: Span,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T, endpoint: impl Into<String>) -> Self {
        Self::with_store(transport, endpoint, LogStore::new())
    }

    /// Use a store with custom capacities
    pub fn with_store(transport: T, endpoint: impl Into<String>, store: LogStore) -> Self {
        Self {
            transport: Arc::new(transport),
            endpoint: endpoint.into(),
            session: Arc::new(Mutex::new(Session {
                store,
                ..Session::default()
            })),
            active: None,
            span: tracing::info_span!("stream"),
        }
    }

    /// Instrument stream tasks with `span` instead of the default
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn view(&self) -> StreamView {
        StreamView {
            session: Arc::clone(&self.session),
        }
    }

    pub fn status(&self) -> StreamStatus {
        self.session.lock().store.status()
    }

    /// Open a stream for `config`, replacing any existing one.
    ///
    /// Clears the live collection and the pause buffer, and leaves the
    /// paused state. Must be called within a tokio runtime.
    pub fn connect(&mut self, config: &StreamConfig) {
        self.teardown();

        let url = StreamQuery::from_config(config).url(&self.endpoint);
        let generation = {
            let mut session = self.session.lock();
            session.store.reset();
            session.store.set_connection(ConnectionState::Connecting);
            session.end_cutoff = config.filter.window.end_cutoff();
            session.generation
        };

        let _enter = self.span.enter();
        tracing::debug!(%url, generation, "connecting");

        let cancel = CancellationToken::new();
        let task = tokio::spawn(
            run_stream(
                Arc::clone(&self.transport),
                url,
                Arc::clone(&self.session),
                generation,
                cancel.clone(),
            )
            .instrument(self.span.clone()),
        );
        self.active = Some(ActiveStream { cancel, task });
    }

    /// Close the current stream, if any. Idempotent.
    pub fn disconnect(&mut self) {
        self.teardown();
        self.session
            .lock()
            .store
            .set_connection(ConnectionState::Disconnected);
    }

    /// Whether a stream task is still running
    pub fn is_running(&self) -> bool {
        self.active.as_ref().is_some_and(|a| !a.task.is_finished())
    }

    fn teardown(&mut self) {
        // Bump first so a frame racing the abort is rejected
        self.session.lock().generation += 1;
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
            active.task.abort();
            let _enter = self.span.enter();
            tracing::debug!("closed previous stream");
        }
    }
}

impl<T: Transport> Drop for ConnectionManager<T> {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn run_stream<T: Transport>(
    transport: Arc<T>,
    url: String,
    session: Arc<Mutex<Session>>,
    generation: u64,
    cancel: CancellationToken,
) {
    let opened = tokio::select! {
        _ = cancel.cancelled() => return,
        result = transport.open(&url) => result,
    };

    let mut frames = match opened {
        Ok(frames) => frames,
        Err(e) => {
            tracing::warn!(error = %e, "failed to open log stream");
            session.lock().finish(generation);
            return;
        }
    };

    {
        let mut session = session.lock();
        if session.generation != generation {
            return;
        }
        session.store.set_connection(ConnectionState::Connected);
    }
    tracing::debug!("log stream connected");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,

            frame = frames.next() => match frame {
                Some(Ok(raw)) => {
                    tracing::trace!(bytes = raw.len(), "frame");
                    if !session.lock().deliver(generation, &raw) {
                        return;
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "log stream failed");
                    break;
                }
                None => {
                    tracing::debug!("log stream closed by server");
                    break;
                }
            }
        }
    }

    session.lock().finish(generation);
}
