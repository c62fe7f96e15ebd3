use std::time::Duration;

/// Exponential backoff parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    pub initial: Duration,
    pub factor: f64,
    pub max: Duration,
}

impl BackoffConfig {
    pub const fn new(initial: Duration, factor: f64, max: Duration) -> Self {
        BackoffConfig {
            initial,
            factor,
            max,
        }
    }

    /// Schedule of the account-existence wait: 2.5 s, x1.05, 8 s ceiling
    pub const fn existence() -> Self {
        Self::new(Duration::from_millis(2500), 1.05, Duration::from_millis(8000))
    }

    /// Schedule of push stream reconnects: 1 s, x2, 60 s ceiling
    pub const fn reconnect() -> Self {
        Self::new(Duration::from_secs(1), 2.0, Duration::from_secs(60))
    }
}

/// Configuration for the sync engine
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Ceiling of governed fetches in flight process-wide
    pub max_concurrent_fetches: usize,
    /// Fallback poll after this long without an accepted update.
    /// `None` disables polling for every feed.
    pub poll_interval: Option<Duration>,
    pub existence_backoff: BackoffConfig,
    pub reconnect_backoff: BackoffConfig,
    /// Capacity of each subscription's broadcast and input channels
    pub channel_capacity: usize,
    pub transactions_page_size: u32,
    /// Give up on a push stream after this many failed connects in a row
    pub max_consecutive_stream_failures: Option<u32>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            max_concurrent_fetches: 8,
            poll_interval: Some(Duration::from_secs(10)),
            existence_backoff: BackoffConfig::existence(),
            reconnect_backoff: BackoffConfig::reconnect(),
            channel_capacity: 256,
            transactions_page_size: 15,
            max_consecutive_stream_failures: None,
        }
    }
}

impl SyncConfig {
    pub fn with_max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = max.max(1);
        self
    }

    pub fn with_poll_interval(mut self, interval: Option<Duration>) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_existence_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.existence_backoff = backoff;
        self
    }

    pub fn with_reconnect_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.reconnect_backoff = backoff;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn with_transactions_page_size(mut self, size: u32) -> Self {
        self.transactions_page_size = size;
        self
    }

    pub fn with_max_consecutive_stream_failures(mut self, max: Option<u32>) -> Self {
        self.max_consecutive_stream_failures = max;
        self
    }
}
