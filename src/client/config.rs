//! Publisher configuration

use std::time::Duration;

/// Publisher configuration options
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Producer channel URL, e.g. `ws://127.0.0.1:8000/ws/producer`
    pub url: String,

    /// Delay before the first retry
    pub initial_backoff: Duration,

    /// Upper bound on any retry delay
    pub max_backoff: Duration,

    /// Stop retrying once this much time has passed since `run` started or
    /// the last accepted session began (`None` retries forever)
    pub reconnect_deadline: Option<Duration>,
}

impl ClientConfig {
    /// Create a config for the given producer URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(30),
            reconnect_deadline: Some(Duration::from_secs(600)),
        }
    }

    /// Set initial and maximum backoff
    pub fn backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max.max(initial);
        self
    }

    /// Set the overall reconnect deadline
    pub fn reconnect_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.reconnect_deadline = deadline;
        self
    }

    /// Delay before retry number `attempt` (starting at 1)
    ///
    /// Doubles from `initial_backoff` for the first five attempts, then holds,
    /// never exceeding `max_backoff`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(4);
        self.initial_backoff
            .saturating_mul(1 << exponent)
            .min(self.max_backoff)
    }
}
