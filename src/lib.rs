//! In-process broadcast streams
//!
//! A written sequence of values that any number of async consumers read
//! independently, each at its own pace, with per-consumer backpressure
//! accounting, timeout-bounded waits and directed termination. Many named
//! channels can share one stream through [`StreamDemux`].
//!
//! ```no_run
//! use consumable_stream::{BroadcastStream, Packet};
//!
//! # async fn example() {
//! let stream = BroadcastStream::new();
//! let mut consumer = stream.consumer();
//!
//! stream.write("hello");
//! stream.close(None);
//!
//! while let Ok(Packet::Value(value)) = consumer.next().await {
//!     println!("{}", value);
//! }
//! # }
//! ```

pub mod demux;
pub mod emitter;
pub mod stream;

pub use demux::{DemuxedStream, StreamDemux};
pub use emitter::StreamEmitter;
pub use stream::{
    BroadcastStream, Consumer, ConsumerId, ConsumerStats, Packet, StreamConfig, TimeoutError,
};
