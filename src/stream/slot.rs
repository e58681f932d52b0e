//! Per-consumer control block
//!
//! The stream's registry and the consumer handle share one [`ConsumerSlot`].
//! The stream bumps backpressure and wakes through it; the consumer drains
//! backpressure, waits on it and picks up queued kills from it.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::futures::Notified;
use tokio::sync::Notify;

use super::packet::ConsumerId;
use super::stats::ConsumerStats;

#[derive(Debug)]
struct Control<T> {
    backpressure: usize,
    iterating: bool,
    pending_kill: Option<Option<T>>,
}

#[derive(Debug)]
pub(crate) struct ConsumerSlot<T> {
    pub(crate) id: ConsumerId,
    pub(crate) channel: Option<Arc<str>>,
    pub(crate) timeout: Option<Duration>,
    control: Mutex<Control<T>>,
    wake: Notify,
}

impl<T> ConsumerSlot<T> {
    pub(crate) fn new(id: ConsumerId, channel: Option<Arc<str>>, timeout: Option<Duration>) -> Self {
        Self {
            id,
            channel,
            timeout,
            control: Mutex::new(Control {
                backpressure: 0,
                iterating: false,
                pending_kill: None,
            }),
            wake: Notify::new(),
        }
    }

    pub(crate) fn stats(&self) -> ConsumerStats {
        ConsumerStats {
            id: self.id,
            backpressure: self.backpressure(),
            timeout: self.timeout,
            channel: self.channel.clone(),
        }
    }

    pub(crate) fn is_bound_to(&self, channel: &str) -> bool {
        self.channel.as_deref() == Some(channel)
    }

    pub(crate) fn backpressure(&self) -> usize {
        self.control.lock().backpressure
    }

    /// Count one more untraversed node, returning the new backpressure
    pub(crate) fn apply_backpressure(&self) -> usize {
        let mut control = self.control.lock();
        control.backpressure += 1;
        control.backpressure
    }

    pub(crate) fn release_backpressure(&self) {
        let mut control = self.control.lock();
        control.backpressure = control.backpressure.saturating_sub(1);
    }

    pub(crate) fn reset_backpressure(&self) {
        self.control.lock().backpressure = 0;
    }

    /// Queue a directed termination and wake the consumer
    ///
    /// Returns true if a `next()` call is in flight. An idle consumer has its
    /// backpressure cleared and must be deregistered by the caller; the kill
    /// is still delivered by its next `next()`.
    pub(crate) fn kill(&self, value: Option<T>) -> bool {
        let iterating = {
            let mut control = self.control.lock();
            control.pending_kill = Some(value);
            if control.iterating {
                control.backpressure += 1;
            } else {
                control.backpressure = 0;
            }
            control.iterating
        };
        self.wake();
        iterating
    }

    pub(crate) fn take_kill(&self) -> Option<Option<T>> {
        self.control.lock().pending_kill.take()
    }

    /// Wake a suspended `next()`, or let the next suspension pass straight through
    pub(crate) fn wake(&self) {
        self.wake.notify_one();
    }

    pub(crate) fn woken(&self) -> Notified<'_> {
        self.wake.notified()
    }

    fn set_iterating(&self, iterating: bool) {
        self.control.lock().iterating = iterating;
    }
}

/// Marks a consumer as iterating for as long as a `next()` call is alive,
/// including when its future is dropped mid-wait
pub(crate) struct Iterating<T> {
    slot: Arc<ConsumerSlot<T>>,
}

impl<T> Iterating<T> {
    pub(crate) fn enter(slot: Arc<ConsumerSlot<T>>) -> Self {
        slot.set_iterating(true);
        Self { slot }
    }
}

impl<T> Drop for Iterating<T> {
    fn drop(&mut self) {
        self.slot.set_iterating(false);
    }
}
