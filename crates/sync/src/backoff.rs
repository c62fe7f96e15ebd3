use std::time::Duration;

use crate::config::BackoffConfig;

/// Backoff state of one retry loop
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    current: Duration,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Backoff {
            current: config.initial,
            config,
        }
    }

    /// Delay to wait now; grows the next one by the factor, up to the ceiling
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.mul_f64(self.config.factor).min(self.config.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.config.initial;
    }
}
