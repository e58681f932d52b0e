//! Append-only node chain
//!
//! Every write appends one [`Node`] after the current tail. Consumers hold an
//! `Arc` to the node they last visited, so a node is freed as soon as the last
//! cursor moves past it.

use std::sync::{Arc, OnceLock};

use super::packet::{Packet, Route};

/// One link of the chain
#[derive(Debug)]
pub(crate) struct Node<T> {
    pub(crate) packet: Packet<T>,
    pub(crate) route: Route,
    next: OnceLock<Arc<Node<T>>>,
}

impl<T> Node<T> {
    pub(crate) fn new(packet: Packet<T>, route: Route) -> Self {
        Self {
            packet,
            route,
            next: OnceLock::new(),
        }
    }

    /// Starting tail of an empty stream
    ///
    /// Cursors only ever inspect the successor of the node they sit on, so
    /// the sentinel's own packet is never observed.
    pub(crate) fn sentinel() -> Self {
        Self::new(Packet::Done(None), Route::Broadcast)
    }

    /// Successor of this node, if one has been linked
    pub(crate) fn next(&self) -> Option<&Arc<Node<T>>> {
        self.next.get()
    }

    /// Link the successor. Returns false if a successor was already set.
    pub(crate) fn link(&self, next: Arc<Node<T>>) -> bool {
        self.next.set(next).is_ok()
    }
}

impl<T> Drop for Node<T> {
    fn drop(&mut self) {
        // Unlink iteratively so a long unread suffix cannot overflow the stack
        let mut next = self.next.take();
        while let Some(node) = next {
            match Arc::try_unwrap(node) {
                Ok(mut node) => next = node.next.take(),
                Err(_) => break,
            }
        }
    }
}
