//! Coordinator configuration.

use std::time::Duration;

/// Default wall-clock budget for a single stream attempt.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(90);
/// Default number of retries after the first failed attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default backoff delay before the first retry.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);
/// Ceiling on any single backoff delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

/// Configuration for the stream coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Wall-clock timeout for one stream attempt, connect included.
    pub timeout: Duration,
    /// Retries allowed after the initial attempt fails.
    pub max_retries: u32,
    /// Backoff delay before the first retry; doubles per attempt.
    pub initial_delay: Duration,
    /// Upper bound on any computed backoff delay.
    pub max_delay: Duration,
    /// When true, a submission identical to the one already in flight for
    /// the session is merged into it instead of being rejected.
    pub enable_deduplication: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            enable_deduplication: false,
        }
    }
}

impl CoordinatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_deduplication(mut self, enabled: bool) -> Self {
        self.enable_deduplication = enabled;
        self
    }
}
