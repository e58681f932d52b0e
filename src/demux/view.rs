//! Named view over a demultiplexer
//!
//! A [`DemuxedStream`] is a name plus a handle to the shared
//! [`StreamDemux`]. It owns no state of its own, so creating any number of
//! views is free and they all share one chain.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::stream::{Consumer, ConsumerId, ConsumerStats, TimeoutError};

use super::store::StreamDemux;

/// One logical channel of a [`StreamDemux`]
pub struct DemuxedStream<T> {
    demux: StreamDemux<T>,
    name: Arc<str>,
}

impl<T> Clone for DemuxedStream<T> {
    fn clone(&self) -> Self {
        Self {
            demux: self.demux.clone(),
            name: Arc::clone(&self.name),
        }
    }
}

impl<T> DemuxedStream<T> {
    pub(crate) fn new(demux: StreamDemux<T>, name: Arc<str>) -> Self {
        Self { demux, name }
    }

    /// Channel name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create a consumer bound to this channel
    pub fn create_consumer(&self, timeout: Option<Duration>) -> Consumer<T> {
        self.demux.create_consumer(Arc::clone(&self.name), timeout)
    }

    /// Create a consumer bound to this channel with the default timeout
    pub fn consumer(&self) -> Consumer<T> {
        self.create_consumer(None)
    }

    /// Wait for the next value on this channel
    ///
    /// The consumer is registered when this is called. Returns `Ok(None)` if
    /// the channel (or the whole demultiplexer) closes first.
    pub fn once(
        &self,
        timeout: Option<Duration>,
    ) -> impl Future<Output = Result<Option<T>, TimeoutError>>
    where
        T: Clone,
    {
        self.create_consumer(timeout).once()
    }

    /// Check if a consumer is registered and bound to this channel
    pub fn has_consumer(&self, consumer_id: ConsumerId) -> bool {
        self.demux.has_consumer(&self.name, consumer_id)
    }

    /// Stats for a consumer bound to this channel
    pub fn consumer_stats(&self, consumer_id: ConsumerId) -> Option<ConsumerStats> {
        self.demux
            .consumer_stats(consumer_id)
            .filter(|stats| stats.channel.as_deref() == Some(&*self.name))
    }

    pub fn consumer_stats_list(&self) -> Vec<ConsumerStats> {
        self.demux.consumer_stats_list(&self.name)
    }

    /// Highest backpressure among consumers bound to this channel
    pub fn backpressure(&self) -> usize {
        self.demux.backpressure(&self.name)
    }

    /// Backpressure of a consumer bound to this channel (0 otherwise)
    pub fn consumer_backpressure(&self, consumer_id: ConsumerId) -> usize {
        self.consumer_stats(consumer_id)
            .map_or(0, |stats| stats.backpressure)
    }

    pub fn consumer_count(&self) -> usize {
        self.demux.consumer_count(&self.name)
    }

    /// Terminate every consumer bound to this channel
    pub fn kill(&self, value: Option<T>)
    where
        T: Clone,
    {
        self.demux.kill(&self.name, value);
    }
}

impl<T> std::fmt::Debug for DemuxedStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DemuxedStream")
            .field("name", &self.name)
            .finish()
    }
}
