//! Broadcast stream with independent consumers
//!
//! A [`BroadcastStream`] is an append-only chain of nodes. Each write links
//! one node after the tail and wakes the registered consumers; every
//! [`Consumer`] walks the chain at its own pace from the point where it was
//! created.
//!
//! # Architecture
//!
//! ```text
//!                       BroadcastStream<T>
//!              ┌──────────────────────────────────┐
//!              │ Mutex<State {                    │
//!              │   tail ─────────────────────┐    │
//!              │   consumers: id ─► Slot     │    │
//!              │ }>                          │    │
//!              └─────────────────────────────┼────┘
//!                                            ▼
//!   [sentinel] ──► [v0] ──► [v1] ──► [v2] ──► [Done]
//!                    ▲               ▲
//!                    │               │
//!               Consumer 1      Consumer 2
//!                (cursor)        (cursor)
//! ```
//!
//! # Memory
//!
//! Nodes are `Arc`-shared and only reachable from cursors and the tail, so a
//! node is freed once the slowest consumer has moved past it. Nothing before
//! the oldest cursor is retained.
//!
//! # Routing
//!
//! Every node carries a [`Route`]. Broadcast nodes reach every consumer,
//! directed nodes reach one consumer id, and channel nodes reach consumers
//! bound to one name (see [`crate::demux`]). Skipped nodes still cost one
//! unit of backpressure.

pub mod broadcast;
pub mod config;
pub mod consumer;
pub mod error;
pub(crate) mod node;
pub mod packet;
pub(crate) mod slot;
pub mod stats;

pub use broadcast::BroadcastStream;
pub use config::StreamConfig;
pub use consumer::Consumer;
pub use error::TimeoutError;
pub use packet::{ConsumerId, Packet, Route};
pub use stats::ConsumerStats;
