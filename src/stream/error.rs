//! Stream error types
//!
//! Writes, closes and stat queries cannot fail. The only failure a consumer
//! can observe is its wait running out of time.

use std::time::Duration;

use super::packet::ConsumerId;

/// A consumer's `next()` waited longer than its configured timeout
///
/// The consumer that raised it has already been deregistered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutError {
    /// Consumer whose wait expired
    pub consumer_id: ConsumerId,
    /// The timeout that elapsed
    pub timeout: Duration,
}

impl TimeoutError {
    pub(crate) fn new(consumer_id: ConsumerId, timeout: Duration) -> Self {
        Self {
            consumer_id,
            timeout,
        }
    }
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Stream consumer {} iteration timed out after {:?}",
            self.consumer_id, self.timeout
        )
    }
}

impl std::error::Error for TimeoutError {}
