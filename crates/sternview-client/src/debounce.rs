use std::time::Duration;
use tokio::time::{Instant, sleep_until};

use sternview_types::StreamConfig;

/// Default settle delay before a reconnect is issued
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Absorbs bursts of configuration edits into a single reconnect.
///
/// Each `schedule` replaces the pending configuration and restarts the settle
/// delay. [`ReconnectDebouncer::ready`] resolves once the delay has elapsed
/// without a newer edit, and is cancel-safe for use in `tokio::select!`.
#[derive(Debug)]
pub struct ReconnectDebouncer {
    delay: Duration,
    pending: Option<(Instant, StreamConfig)>,
}

impl Default for ReconnectDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLE_DELAY)
    }
}

impl ReconnectDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn schedule(&mut self, config: StreamConfig) {
        self.pending = Some((Instant::now() + self.delay, config));
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Wait for the pending configuration to settle. Never resolves while
    /// nothing is scheduled.
    pub async fn ready(&mut self) -> StreamConfig {
        loop {
            let Some((deadline, _)) = &self.pending else {
                return std::future::pending().await;
            };
            sleep_until(*deadline).await;
            // A schedule may have moved the deadline while we slept
            if let Some((deadline, _)) = &self.pending {
                if *deadline <= Instant::now() {
                    if let Some((_, config)) = self.pending.take() {
                        return config;
                    }
                }
            }
        }
    }
}
