//! Tuning knobs for preview runs.

use std::time::Duration;

/// How often the scheduler polls dispatched jobs when nothing else says.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct PreviewConfig {
    /// Delay between two polling cycles.
    pub poll_interval: Duration,
    /// Give up on the run after this long. `None` waits for cancellation.
    pub timeout: Option<Duration>,
    /// Drop `Load` operators before running.
    pub skip_load_operators: bool,
    /// Delete the run's metadata and artifact blobs once results are read.
    pub cleanup_storage: bool,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
            skip_load_operators: true,
            cleanup_storage: true,
        }
    }
}

impl PreviewConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
