use std::collections::VecDeque;
use std::sync::Arc;

use sternview_types::{
    ConnectionState, LevelCounts, LogEntry, MAX_BUFFER, MAX_LOGS, StreamStatus,
};

/// Shared, immutable log entry
pub type ArcLogEntry = Arc<LogEntry>;

/// Bounded ring of log entries in arrival order. The oldest entry is evicted
/// when a push would exceed capacity.
#[derive(Clone, Debug)]
pub struct LogBuffer {
    entries: VecDeque<ArcLogEntry>,

    /// Maximum capacity
    capacity: usize,

    /// Level counts, maintained on insert and eviction
    level_counts: LevelCounts,
}

impl LogBuffer {
    /// Create a new log buffer with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(MAX_LOGS)),
            capacity,
            level_counts: LevelCounts::default(),
        }
    }

    /// Push a new entry, evicting and returning the oldest if at capacity
    pub fn push(&mut self, entry: ArcLogEntry) -> Option<ArcLogEntry> {
        if self.capacity == 0 {
            return Some(entry);
        }
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        if let Some(old) = &evicted {
            self.level_counts.decrement(old.level);
        }
        self.level_counts.increment(entry.level);
        self.entries.push_back(entry);
        evicted
    }

    pub fn extend<I: IntoIterator<Item = ArcLogEntry>>(&mut self, entries: I) {
        for entry in entries {
            self.push(entry);
        }
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &ArcLogEntry> + ExactSizeIterator {
        self.entries.iter()
    }

    /// Get all entries (Arc clones are cheap)
    pub fn all(&self) -> Vec<ArcLogEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Get the last N entries
    pub fn tail(&self, n: usize) -> Vec<ArcLogEntry> {
        let start = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(start).cloned().collect()
    }

    /// Entry count per log level
    pub fn level_counts(&self) -> LevelCounts {
        self.level_counts
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.level_counts = LevelCounts::default();
    }

    /// Remove and return every entry in arrival order
    pub fn drain(&mut self) -> impl Iterator<Item = ArcLogEntry> + '_ {
        self.level_counts = LevelCounts::default();
        self.entries.drain(..)
    }
}

/// The live collection and pause buffer of one logical stream, together with
/// its connection state and pause flag.
///
/// Every inbound entry is routed by reading [`StreamStatus`] once: while
/// paused it goes to the pause buffer, otherwise to the live collection. The
/// pause buffer is empty whenever the store is not paused.
#[derive(Clone, Debug)]
pub struct LogStore {
    live: LogBuffer,
    paused_entries: LogBuffer,
    status: StreamStatus,
    next_seq: u64,
}

impl Default for LogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LogStore {
    pub fn new() -> Self {
        Self::with_capacity(MAX_LOGS, MAX_BUFFER)
    }

    pub fn with_capacity(live_capacity: usize, pause_capacity: usize) -> Self {
        Self {
            live: LogBuffer::new(live_capacity),
            paused_entries: LogBuffer::new(pause_capacity),
            status: StreamStatus::default(),
            next_seq: 0,
        }
    }

    /// Absorb one entry, assigning it the next arrival sequence number
    pub fn ingest(&mut self, mut entry: LogEntry) {
        entry.seq = self.next_seq;
        self.next_seq += 1;
        let entry = Arc::new(entry);

        if self.status.paused {
            if self.paused_entries.push(entry).is_some() {
                tracing::trace!("pause buffer full, dropped oldest buffered entry");
            }
        } else {
            self.live.push(entry);
        }
    }

    /// Route new entries to the pause buffer. Entries already live are untouched.
    pub fn pause(&mut self) {
        self.status.paused = true;
    }

    /// Append buffered entries to the live collection in arrival order and
    /// empty the buffer.
    pub fn resume(&mut self) {
        let buffered = self.paused_entries.len();
        self.live.extend(self.paused_entries.drain());
        self.status.paused = false;
        tracing::debug!(buffered, "resumed stream");
    }

    /// Pause if running, resume if paused. Returns the new pause flag.
    pub fn toggle_pause(&mut self) -> bool {
        if self.status.paused {
            self.resume();
        } else {
            self.pause();
        }
        self.status.paused
    }

    pub fn is_paused(&self) -> bool {
        self.status.paused
    }

    /// Number of entries waiting in the pause buffer
    pub fn buffered_count(&self) -> usize {
        self.paused_entries.len()
    }

    pub fn status(&self) -> StreamStatus {
        self.status
    }

    pub fn set_connection(&mut self, connection: ConnectionState) {
        self.status.connection = connection;
    }

    /// Empty the live collection only
    pub fn clear(&mut self) {
        self.live.clear();
    }

    /// Drop all entries and leave the paused state, as on a fresh connection
    pub fn reset(&mut self) {
        self.live.clear();
        self.paused_entries.clear();
        self.status.paused = false;
        self.next_seq = 0;
    }

    pub fn live(&self) -> &LogBuffer {
        &self.live
    }

    /// Snapshot of the live collection
    pub fn entries(&self) -> Vec<ArcLogEntry> {
        self.live.all()
    }

    pub fn level_counts(&self) -> LevelCounts {
        self.live.level_counts()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sternview_types::LogLevel;

    fn entry(message: &str) -> LogEntry {
        LogEntry::new(String::new(), message.to_string(), LogLevel::Info)
    }

    fn messages(store: &LogStore) -> Vec<String> {
        store.live().iter().map(|e| e.message.clone()).collect()
    }

    #[test]
    fn test_buffer_evicts_oldest() {
        let mut buffer = LogBuffer::new(2);
        assert!(buffer.push(Arc::new(entry("a"))).is_none());
        assert!(buffer.push(Arc::new(entry("b"))).is_none());
        let evicted = buffer.push(Arc::new(entry("c"))).unwrap();
        assert_eq!(evicted.message, "a");
        let kept: Vec<_> = buffer.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(kept, vec!["b", "c"]);
    }

    #[test]
    fn test_level_counts_track_eviction() {
        let mut buffer = LogBuffer::new(2);
        buffer.push(Arc::new(LogEntry::new(String::new(), "x".into(), LogLevel::Error)));
        buffer.push(Arc::new(LogEntry::new(String::new(), "y".into(), LogLevel::Warn)));
        buffer.push(Arc::new(LogEntry::new(String::new(), "z".into(), LogLevel::Warn)));
        let counts = buffer.level_counts();
        assert_eq!(counts.error, 0);
        assert_eq!(counts.warn, 2);
        assert_eq!(counts.total(), buffer.len());
    }

    #[test]
    fn test_tail() {
        let mut buffer = LogBuffer::new(10);
        buffer.extend((0..5).map(|i| Arc::new(entry(&i.to_string()))));
        let tail: Vec<_> = buffer.tail(2).iter().map(|e| e.message.clone()).collect();
        assert_eq!(tail, vec!["3", "4"]);
        assert_eq!(buffer.tail(50).len(), 5);
    }

    #[test]
    fn test_pause_routes_to_buffer() {
        let mut store = LogStore::new();
        store.ingest(entry("before"));
        store.pause();
        store.ingest(entry("during"));
        assert_eq!(messages(&store), vec!["before"]);
        assert_eq!(store.buffered_count(), 1);

        store.resume();
        assert_eq!(store.buffered_count(), 0);
        store.ingest(entry("after"));
        assert_eq!(messages(&store), vec!["before", "during", "after"]);
    }

    #[test]
    fn test_pause_buffer_is_bounded() {
        let mut store = LogStore::with_capacity(10, 3);
        store.pause();
        for i in 0..5 {
            store.ingest(entry(&i.to_string()));
        }
        assert_eq!(store.buffered_count(), 3);
        store.resume();
        assert_eq!(messages(&store), vec!["2", "3", "4"]);
    }

    #[test]
    fn test_resume_respects_live_bound() {
        let mut store = LogStore::with_capacity(3, 10);
        store.ingest(entry("a"));
        store.ingest(entry("b"));
        store.pause();
        store.ingest(entry("c"));
        store.ingest(entry("d"));
        store.resume();
        assert_eq!(messages(&store), vec!["b", "c", "d"]);
    }

    #[test]
    fn test_toggle_and_reset() {
        let mut store = LogStore::new();
        assert!(store.toggle_pause());
        store.ingest(entry("held"));
        store.reset();
        assert!(!store.is_paused());
        assert_eq!(store.buffered_count(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_clear_keeps_pause_buffer() {
        let mut store = LogStore::new();
        store.ingest(entry("a"));
        store.pause();
        store.ingest(entry("b"));
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.buffered_count(), 1);
    }

    #[test]
    fn test_sequence_numbers_follow_arrival() {
        let mut store = LogStore::new();
        store.ingest(entry("a"));
        store.pause();
        store.ingest(entry("b"));
        store.resume();
        store.ingest(entry("c"));
        let seqs: Vec<_> = store.live().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    proptest! {
        #[test]
        fn ring_keeps_last_capacity_entries(capacity in 1usize..64, n in 0usize..256) {
            let mut buffer = LogBuffer::new(capacity);
            for i in 0..n {
                buffer.push(Arc::new(entry(&i.to_string())));
            }
            let kept: Vec<usize> = buffer.iter().map(|e| e.message.parse().unwrap()).collect();
            let expected: Vec<usize> = (n.saturating_sub(capacity)..n).collect();
            prop_assert_eq!(kept, expected);
        }

        #[test]
        fn pause_resume_preserves_arrival_order(
            before in 0usize..20,
            during in 0usize..20,
            after in 0usize..20,
        ) {
            let mut store = LogStore::with_capacity(100, 100);
            let mut next = 0usize;
            for _ in 0..before {
                store.ingest(entry(&next.to_string()));
                next += 1;
            }
            store.pause();
            for _ in 0..during {
                store.ingest(entry(&next.to_string()));
                next += 1;
            }
            store.resume();
            for _ in 0..after {
                store.ingest(entry(&next.to_string()));
                next += 1;
            }
            let kept: Vec<usize> = store.live().iter().map(|e| e.message.parse().unwrap()).collect();
            prop_assert_eq!(kept, (0..next).collect::<Vec<_>>());
        }
    }
}
