//! Broadcast stream implementation
//!
//! The writable side of the chain: owns the tail, the consumer registry and
//! the id generator, and appends and wakes on every write.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::config::StreamConfig;
use super::consumer::Consumer;
use super::error::TimeoutError;
use super::node::Node;
use super::packet::{ConsumerId, Packet, Route};
use super::slot::ConsumerSlot;
use super::stats::ConsumerStats;

struct State<T> {
    /// Most recently appended node (the sentinel while empty)
    tail: Arc<Node<T>>,

    /// Registered consumers
    consumers: HashMap<ConsumerId, Arc<ConsumerSlot<T>>>,

    /// Next id to hand out
    next_id: ConsumerId,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    config: StreamConfig,
}

/// A writable stream read independently by any number of consumers
///
/// Cloning is cheap and every clone writes to the same chain. Appends,
/// registration and deregistration are serialized behind one lock, so all
/// consumers registered at the time of a write observe nodes in append order.
pub struct BroadcastStream<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for BroadcastStream<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> BroadcastStream<T> {
    /// Create a new stream with default configuration
    pub fn new() -> Self {
        Self::with_config(StreamConfig::default())
    }

    /// Create a new stream with custom configuration
    pub fn with_config(config: StreamConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    tail: Arc::new(Node::sentinel()),
                    consumers: HashMap::new(),
                    next_id: 1,
                }),
                config,
            }),
        }
    }

    /// Get the stream configuration
    pub fn config(&self) -> &StreamConfig {
        &self.shared.config
    }

    /// Append a value visible to every consumer
    pub fn write(&self, value: T) {
        self.append(Packet::Value(value), Route::Broadcast);
    }

    /// Append an end-of-stream marker visible to every consumer
    pub fn close(&self, value: Option<T>) {
        self.append(Packet::Done(value), Route::Broadcast);
    }

    /// Append a value only the given consumer will surface
    pub fn write_to_consumer(&self, consumer_id: ConsumerId, value: T) {
        self.append(Packet::Value(value), Route::Consumer(consumer_id));
    }

    /// Append an end-of-stream marker only the given consumer will stop at
    pub fn close_consumer(&self, consumer_id: ConsumerId, value: Option<T>) {
        self.append(Packet::Done(value), Route::Consumer(consumer_id));
    }

    /// Link a node after the tail and notify consumers
    ///
    /// Every registered consumer gains one unit of backpressure, including
    /// those that will skip the node. Directed nodes wake only their target.
    pub(crate) fn append(&self, packet: Packet<T>, route: Route) {
        let mut state = self.shared.state.lock();

        let done = packet.is_done();
        let target = match &route {
            Route::Consumer(id) => Some(*id),
            Route::Broadcast | Route::Channel(_) => None,
        };

        let node = Arc::new(Node::new(packet, route));
        let linked = state.tail.link(Arc::clone(&node));
        debug_assert!(linked, "tail node already had a successor");
        state.tail = node;

        let threshold = self.shared.config.backpressure_warning;
        for slot in state.consumers.values() {
            let backpressure = slot.apply_backpressure();
            if threshold > 0 && backpressure == threshold {
                tracing::warn!(
                    consumer_id = slot.id,
                    backpressure = backpressure,
                    "Consumer backpressure reached warning threshold"
                );
            }

            if target.map_or(true, |id| id == slot.id) {
                slot.wake();
            }
        }

        tracing::trace!(
            done = done,
            directed_to = ?target,
            consumers = state.consumers.len(),
            "Node appended"
        );
    }

    /// Create a consumer that observes writes made from now on
    ///
    /// `timeout` bounds every wait inside `next()`; `None` falls back to the
    /// configured default.
    pub fn create_consumer(&self, timeout: Option<Duration>) -> Consumer<T> {
        self.create_bound_consumer(None, timeout)
    }

    /// Create a consumer using the configured default timeout
    pub fn consumer(&self) -> Consumer<T> {
        self.create_consumer(None)
    }

    pub(crate) fn create_bound_consumer(
        &self,
        channel: Option<Arc<str>>,
        timeout: Option<Duration>,
    ) -> Consumer<T> {
        let timeout = timeout.or(self.shared.config.default_timeout);

        let (slot, cursor) = {
            let mut state = self.shared.state.lock();
            let id = state.next_id;
            state.next_id += 1;

            let slot = Arc::new(ConsumerSlot::new(id, channel, timeout));
            state.consumers.insert(id, Arc::clone(&slot));
            (slot, Arc::clone(&state.tail))
        };

        tracing::debug!(
            consumer_id = slot.id,
            channel = ?slot.channel,
            timeout = ?slot.timeout,
            "Consumer registered"
        );

        Consumer::new(self.clone(), slot, cursor)
    }

    /// Put a consumer back in the registry if it is not there
    pub(crate) fn register(&self, slot: &Arc<ConsumerSlot<T>>) {
        let mut state = self.shared.state.lock();
        state
            .consumers
            .entry(slot.id)
            .or_insert_with(|| Arc::clone(slot));
    }

    /// Remove a consumer from the registry
    ///
    /// Idempotent. Returns true if the consumer was registered.
    pub fn remove_consumer(&self, consumer_id: ConsumerId) -> bool {
        let removed = self
            .shared
            .state
            .lock()
            .consumers
            .remove(&consumer_id)
            .is_some();

        if removed {
            tracing::debug!(consumer_id = consumer_id, "Consumer removed");
        }
        removed
    }

    /// Terminate every registered consumer without touching the chain
    ///
    /// Suspended consumers wake up and return `Done(value)`; idle ones are
    /// deregistered now and return it from their next `next()`.
    pub fn kill(&self, value: Option<T>)
    where
        T: Clone,
    {
        self.kill_where(value, |_| true);
    }

    /// Terminate a single consumer without touching the chain
    pub fn kill_consumer(&self, consumer_id: ConsumerId, value: Option<T>) {
        let mut state = self.shared.state.lock();
        if let Some(slot) = state.consumers.get(&consumer_id).cloned() {
            Self::kill_slot(&mut state, &slot, value);
        }
    }

    pub(crate) fn kill_where<F>(&self, value: Option<T>, filter: F)
    where
        T: Clone,
        F: Fn(&ConsumerSlot<T>) -> bool,
    {
        let mut state = self.shared.state.lock();
        let targets: Vec<_> = state
            .consumers
            .values()
            .filter(|slot| filter(slot))
            .cloned()
            .collect();

        for slot in targets {
            Self::kill_slot(&mut state, &slot, value.clone());
        }
    }

    fn kill_slot(state: &mut State<T>, slot: &ConsumerSlot<T>, value: Option<T>) {
        let iterating = slot.kill(value);
        if !iterating {
            state.consumers.remove(&slot.id);
        }

        tracing::debug!(
            consumer_id = slot.id,
            queued = iterating,
            "Consumer killed"
        );
    }

    /// Check if a consumer is registered
    pub fn has_consumer(&self, consumer_id: ConsumerId) -> bool {
        self.shared.state.lock().consumers.contains_key(&consumer_id)
    }

    /// Get stats for a registered consumer
    pub fn consumer_stats(&self, consumer_id: ConsumerId) -> Option<ConsumerStats> {
        self.shared
            .state
            .lock()
            .consumers
            .get(&consumer_id)
            .map(|slot| slot.stats())
    }

    /// Get stats for every registered consumer, ordered by id
    pub fn all_consumer_stats(&self) -> Vec<ConsumerStats> {
        self.stats_where(|_| true)
    }

    pub(crate) fn stats_where<F>(&self, filter: F) -> Vec<ConsumerStats>
    where
        F: Fn(&ConsumerSlot<T>) -> bool,
    {
        let mut stats: Vec<_> = self
            .shared
            .state
            .lock()
            .consumers
            .values()
            .filter(|slot| filter(slot))
            .map(|slot| slot.stats())
            .collect();
        stats.sort_by_key(|s| s.id);
        stats
    }

    /// Highest backpressure among registered consumers (0 if none)
    pub fn backpressure(&self) -> usize {
        self.backpressure_where(|_| true)
    }

    pub(crate) fn backpressure_where<F>(&self, filter: F) -> usize
    where
        F: Fn(&ConsumerSlot<T>) -> bool,
    {
        self.shared
            .state
            .lock()
            .consumers
            .values()
            .filter(|slot| filter(slot))
            .map(|slot| slot.backpressure())
            .max()
            .unwrap_or(0)
    }

    /// Backpressure of a registered consumer (0 if unknown)
    pub fn consumer_backpressure(&self, consumer_id: ConsumerId) -> usize {
        self.shared
            .state
            .lock()
            .consumers
            .get(&consumer_id)
            .map_or(0, |slot| slot.backpressure())
    }

    /// Number of registered consumers
    pub fn consumer_count(&self) -> usize {
        self.shared.state.lock().consumers.len()
    }

    pub(crate) fn count_where<F>(&self, filter: F) -> usize
    where
        F: Fn(&ConsumerSlot<T>) -> bool,
    {
        self.shared
            .state
            .lock()
            .consumers
            .values()
            .filter(|slot| filter(slot))
            .count()
    }

    /// Ids of registered consumers, ascending
    pub fn consumer_ids(&self) -> Vec<ConsumerId> {
        let mut ids: Vec<_> = self.shared.state.lock().consumers.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Wait for the next value written to the stream
    ///
    /// The consumer is registered when this is called, not when the future is
    /// first polled. Returns `Ok(None)` if the stream closes first.
    pub fn once(
        &self,
        timeout: Option<Duration>,
    ) -> impl Future<Output = Result<Option<T>, TimeoutError>>
    where
        T: Clone,
    {
        self.create_consumer(timeout).once()
    }
}

impl<T> Default for BroadcastStream<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for BroadcastStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastStream")
            .field("consumers", &self.consumer_count())
            .field("config", &self.shared.config)
            .finish()
    }
}
