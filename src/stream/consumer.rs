//! Stream consumer
//!
//! A [`Consumer`] is a read cursor into a stream's chain. Each `next()` call
//! walks forward one admitted node at a time, suspending when it reaches the
//! tail:
//!
//! ```text
//!   next() ──► kill queued? ──yes──► Done(kill value), deregister
//!     │             │no
//!     │             ▼
//!     │     successor linked? ──no──► wait (write | kill | timeout)
//!     │             │yes                         │timeout ──► Err, deregister
//!     │             ▼
//!     │     advance, release backpressure
//!     │             │
//!     │     route admits us? ──no──► loop
//!     │             │yes
//!     │             ▼
//!     └───── Value(v) │ Done(v) ──► deregister
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, Stream};

use super::broadcast::BroadcastStream;
use super::error::TimeoutError;
use super::node::Node;
use super::packet::{ConsumerId, Packet};
use super::slot::{ConsumerSlot, Iterating};
use super::stats::ConsumerStats;

/// Independent reader of a [`BroadcastStream`]
///
/// Starts at the stream's tail at creation time, so it only observes writes
/// made after it was created. Dropping the consumer deregisters it.
pub struct Consumer<T> {
    stream: BroadcastStream<T>,
    slot: Arc<ConsumerSlot<T>>,
    /// Last node returned or skipped; None once the consumer has finished
    cursor: Option<Arc<Node<T>>>,
}

impl<T> Consumer<T> {
    pub(crate) fn new(
        stream: BroadcastStream<T>,
        slot: Arc<ConsumerSlot<T>>,
        cursor: Arc<Node<T>>,
    ) -> Self {
        Self {
            stream,
            slot,
            cursor: Some(cursor),
        }
    }

    /// Consumer id, unique within its stream
    pub fn id(&self) -> ConsumerId {
        self.slot.id
    }

    /// Timeout bounding each wait, if any
    pub fn timeout(&self) -> Option<Duration> {
        self.slot.timeout
    }

    /// Channel this consumer is bound to (demultiplexed consumers only)
    pub fn channel(&self) -> Option<&str> {
        self.slot.channel.as_deref()
    }

    /// Check if the consumer has reached a terminal result
    pub fn is_finished(&self) -> bool {
        self.cursor.is_none()
    }

    pub fn stats(&self) -> ConsumerStats {
        self.slot.stats()
    }

    pub fn backpressure(&self) -> usize {
        self.slot.backpressure()
    }

    pub fn apply_backpressure(&self) {
        self.slot.apply_backpressure();
    }

    pub fn release_backpressure(&self) {
        self.slot.release_backpressure();
    }

    pub fn reset_backpressure(&self) {
        self.slot.reset_backpressure();
    }

    /// Abandon iteration
    ///
    /// Deregisters, releases the cursor and clears backpressure. Further
    /// `next()` calls return `Done(None)` immediately.
    pub fn stop(&mut self) {
        if self.cursor.take().is_some() {
            tracing::debug!(consumer_id = self.slot.id, "Consumer stopped");
        }
        self.stream.remove_consumer(self.slot.id);
        self.slot.reset_backpressure();
    }

    fn finish(&mut self) {
        self.cursor = None;
        self.stream.remove_consumer(self.slot.id);
    }

    fn has_successor(&self) -> bool {
        self.cursor
            .as_ref()
            .is_some_and(|cursor| cursor.next().is_some())
    }

    /// Suspend until woken by a write or kill, or until the timeout elapses
    async fn wait(&self) -> Result<(), TimeoutError> {
        let woken = self.slot.woken();
        match self.slot.timeout {
            Some(timeout) => tokio::time::timeout(timeout, woken)
                .await
                .map_err(|_| TimeoutError::new(self.slot.id, timeout)),
            None => {
                woken.await;
                Ok(())
            }
        }
    }

    fn deliver_kill(&mut self, value: Option<T>) -> Packet<T> {
        self.finish();
        self.slot.reset_backpressure();
        tracing::debug!(consumer_id = self.slot.id, "Consumer kill delivered");
        Packet::Done(value)
    }
}

impl<T: Clone> Consumer<T> {
    /// Wait for the next node addressed to this consumer
    ///
    /// Returns `Packet::Value` for ordinary data and `Packet::Done` for the
    /// terminal result, after which the consumer is deregistered and every
    /// further call returns `Done(None)` at once. A timeout also deregisters.
    pub async fn next(&mut self) -> Result<Packet<T>, TimeoutError> {
        if self.cursor.is_none() {
            return Ok(Packet::Done(None));
        }

        let _iterating = Iterating::enter(Arc::clone(&self.slot));
        if let Some(value) = self.slot.take_kill() {
            return Ok(self.deliver_kill(value));
        }
        self.stream.register(&self.slot);

        loop {
            if !self.has_successor() {
                if let Err(err) = self.wait().await {
                    tracing::debug!(
                        consumer_id = self.slot.id,
                        timeout = ?err.timeout,
                        "Consumer timed out"
                    );
                    self.finish();
                    return Err(err);
                }
            }

            if let Some(value) = self.slot.take_kill() {
                return Ok(self.deliver_kill(value));
            }

            // A stale wake-up can arrive with nothing new linked
            let Some(node) = self
                .cursor
                .as_ref()
                .and_then(|cursor| cursor.next())
                .cloned()
            else {
                continue;
            };

            self.slot.release_backpressure();
            let admitted = node
                .route
                .admits(self.slot.id, self.slot.channel.as_deref());
            let packet = admitted.then(|| node.packet.clone());
            self.cursor = Some(node);

            match packet {
                None => continue,
                Some(Packet::Done(value)) => {
                    self.finish();
                    return Ok(Packet::Done(value));
                }
                Some(packet) => return Ok(packet),
            }
        }
    }

    /// Wait for a single value, then deregister
    ///
    /// Returns `Ok(None)` if the consumer reaches its end marker first.
    pub async fn once(mut self) -> Result<Option<T>, TimeoutError> {
        match self.next().await? {
            Packet::Value(value) => Ok(Some(value)),
            Packet::Done(_) => Ok(None),
        }
    }

    /// Turn the consumer into a [`Stream`] of values
    ///
    /// The stream ends at the terminal node; a timeout is yielded as the
    /// last item.
    pub fn into_stream(self) -> impl Stream<Item = Result<T, TimeoutError>> {
        stream::unfold(Some(self), |consumer| async move {
            let mut consumer = consumer?;
            match consumer.next().await {
                Ok(Packet::Value(value)) => Some((Ok(value), Some(consumer))),
                Ok(Packet::Done(_)) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }
}

impl<T> Drop for Consumer<T> {
    fn drop(&mut self) {
        self.stream.remove_consumer(self.slot.id);
    }
}

impl<T> std::fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("id", &self.slot.id)
            .field("channel", &self.slot.channel)
            .field("timeout", &self.slot.timeout)
            .field("backpressure", &self.slot.backpressure())
            .field("finished", &self.is_finished())
            .finish()
    }
}
