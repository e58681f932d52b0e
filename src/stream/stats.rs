//! Consumer statistics

use std::sync::Arc;
use std::time::Duration;

use super::packet::ConsumerId;

/// Snapshot of one registered consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Consumer id
    pub id: ConsumerId,
    /// Nodes appended but not yet traversed by this consumer
    pub backpressure: usize,
    /// Timeout bounding each wait, if any
    pub timeout: Option<Duration>,
    /// Channel the consumer is bound to (demultiplexed consumers only)
    pub channel: Option<Arc<str>>,
}
