//! Stream configuration

use std::time::Duration;

/// Configuration shared by a stream and the consumers it creates
#[derive(Debug, Clone, Default)]
pub struct StreamConfig {
    /// Timeout applied to consumers created without an explicit one
    /// (None = wait forever)
    pub default_timeout: Option<Duration>,

    /// Log a warning when a consumer's backpressure reaches this value
    /// (0 = disabled)
    pub backpressure_warning: usize,
}

impl StreamConfig {
    /// Set the default consumer timeout
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Set the backpressure warning threshold
    pub fn backpressure_warning(mut self, threshold: usize) -> Self {
        self.backpressure_warning = threshold;
        self
    }
}
