//! Packet and routing types carried by chain nodes
//!
//! A [`Packet`] is both what gets appended to the chain and what a consumer's
//! `next()` hands back. A [`Route`] decides which consumers treat a node as
//! meaningful.

use std::sync::Arc;

/// Identifier of a consumer, unique within its owning stream
pub type ConsumerId = u64;

/// A value written to a stream, or the end-of-stream marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet<T> {
    /// Ordinary value
    Value(T),
    /// End of stream, optionally carrying a final value
    Done(Option<T>),
}

impl<T> Packet<T> {
    /// Check if this is the end-of-stream marker
    pub fn is_done(&self) -> bool {
        matches!(self, Packet::Done(_))
    }

    /// Borrow the carried value, if any
    pub fn value(&self) -> Option<&T> {
        match self {
            Packet::Value(value) => Some(value),
            Packet::Done(value) => value.as_ref(),
        }
    }

    /// Take the carried value, if any
    pub fn into_value(self) -> Option<T> {
        match self {
            Packet::Value(value) => Some(value),
            Packet::Done(value) => value,
        }
    }
}

/// Visibility of a node
///
/// Consumers match on this exhaustively to decide whether a node is surfaced
/// or skipped. `Broadcast` combined with [`Packet::Done`] is the global
/// terminator: every consumer, whatever channel it is bound to, stops there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Visible to every consumer
    Broadcast,
    /// Visible only to the consumer with this id
    Consumer(ConsumerId),
    /// Visible only to consumers bound to this channel name
    Channel(Arc<str>),
}

impl Route {
    /// Decide whether a consumer sees a node carrying this route
    pub fn admits(&self, id: ConsumerId, channel: Option<&str>) -> bool {
        match self {
            Route::Broadcast => true,
            Route::Consumer(target) => *target == id,
            Route::Channel(name) => channel == Some(&**name),
        }
    }
}
