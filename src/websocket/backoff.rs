use std::time::Duration;

/// Configuration for reconnection behavior
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt
    pub initial_delay: Duration,
    /// Maximum delay between reconnection attempts
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
    /// Reconnection attempts allowed after an unclean close before giving up
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_attempts: 5,
        }
    }
}

/// Exponential backoff calculator
///
/// Tracks the number of reconnect attempts made since the last successful
/// open. The delay before attempt `k` (1-based) is
/// `min(initial_delay * multiplier^(k-1), max_delay)`.
#[derive(Debug, Clone)]
pub(crate) struct ExponentialBackoff {
    config: ReconnectConfig,
    attempt: u32,
}

impl ExponentialBackoff {
    pub(crate) fn new(config: ReconnectConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Attempts scheduled since the last reset
    pub(crate) fn attempt(&self) -> u32 {
        self.attempt
    }

    pub(crate) fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.attempt >= self.config.max_attempts
    }

    /// Get the delay before the next attempt and count that attempt
    ///
    /// Returns `None` once `max_attempts` have been scheduled.
    pub(crate) fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        let factor = self.config.multiplier.powi(self.attempt as i32);
        let secs = (self.config.initial_delay.as_secs_f64() * factor)
            .min(self.config.max_delay.as_secs_f64());
        self.attempt += 1;
        Some(Duration::from_secs_f64(secs))
    }

    /// Reset after a successful open
    pub(crate) fn reset(&mut self) {
        self.attempt = 0;
    }
}
