use std::time::Duration;

/// Wait between two resolution attempts of the same unit.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(2000);

/// Settings shared by every loader a [`Registry`](crate::Registry) creates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Constant delay after a failed attempt. There is no backoff growth and no cap
    /// on the number of attempts.
    pub retry_delay: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl LoaderConfig {
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }
}
