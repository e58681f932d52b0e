//! Event-emitter façade
//!
//! Maps named events onto one [`StreamDemux`]: `emit` writes to the event's
//! channel and `listener` hands out that channel's view.

use crate::demux::{DemuxedStream, StreamDemux};
use crate::stream::{ConsumerStats, StreamConfig};

/// Emits named events to async listeners
pub struct StreamEmitter<T> {
    demux: StreamDemux<T>,
}

impl<T> Clone for StreamEmitter<T> {
    fn clone(&self) -> Self {
        Self {
            demux: self.demux.clone(),
        }
    }
}

impl<T> StreamEmitter<T> {
    pub fn new() -> Self {
        Self::with_config(StreamConfig::default())
    }

    pub fn with_config(config: StreamConfig) -> Self {
        Self {
            demux: StreamDemux::with_config(config),
        }
    }

    /// Emit an event to every listener consumer of `event`
    pub fn emit(&self, event: &str, value: T) {
        self.demux.write(event, value);
    }

    /// View of one event's listener stream
    pub fn listener(&self, event: &str) -> DemuxedStream<T> {
        self.demux.stream(event)
    }

    /// End the listener stream of one event
    pub fn close_listener(&self, event: &str, value: Option<T>) {
        self.demux.close(event, value);
    }

    /// End every listener stream
    pub fn close_all_listeners(&self, value: Option<T>) {
        self.demux.close_all(value);
    }

    /// Terminate listener consumers of one event without waiting for queued events
    pub fn kill_listener(&self, event: &str, value: Option<T>)
    where
        T: Clone,
    {
        self.demux.kill(event, value);
    }

    pub fn kill_all_listeners(&self, value: Option<T>)
    where
        T: Clone,
    {
        self.demux.kill_all(value);
    }

    pub fn listener_backpressure(&self, event: &str) -> usize {
        self.demux.backpressure(event)
    }

    pub fn listener_consumer_stats_list(&self, event: &str) -> Vec<ConsumerStats> {
        self.demux.consumer_stats_list(event)
    }
}

impl<T> Default for StreamEmitter<T> {
    fn default() -> Self {
        Self::new()
    }
}
