//! Stream connection management for sternview
//!
//! This crate owns the single live connection of a log stream: it encodes a
//! stream configuration into the server's query parameters, runs the
//! transport, normalizes every frame into the shared log store and debounces
//! caller-driven reconnects.

mod debounce;
mod manager;
mod query;
mod transport;

pub use debounce::{DEFAULT_SETTLE_DELAY, ReconnectDebouncer};
pub use manager::{ConnectionManager, StreamSummary, StreamView};
pub use query::{
    DEFAULT_MAX_LOG_REQUESTS, ELEVATED_MAX_LOG_REQUESTS, STREAM_PATH, StreamQuery,
    effective_max_log_requests,
};
pub use transport::{FrameStream, Transport, TransportError, WebSocketTransport};

// Re-export types used in our public API
pub use sternview_types::{ConnectionState, StreamConfig, StreamStatus};
