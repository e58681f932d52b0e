//! Named-channel demultiplexing
//!
//! A [`StreamDemux`] carries any number of logical channels over a single
//! [`BroadcastStream`](crate::stream::BroadcastStream). Each node is routed to
//! a channel name; consumers bound to a name skip everything else.
//!
//! ```text
//!   write("a", x) ──┐
//!   write("b", y) ──┼──► [a:x] ──► [b:y] ──► [a:Done] ──► [Done]
//!   close("a")    ──┤        ▲                     ▲          ▲
//!   close_all()   ──┘        │                     │          │
//!                     consumer("a") surfaces x, stops at a:Done
//!                     consumer("b") surfaces y, skips a:Done, stops at Done
//! ```
//!
//! Three termination paths coexist: `close(name)` ends one channel,
//! `close_all` ends every channel, and `kill*` ends consumers directly
//! without appending to the chain.

pub mod store;
pub mod view;

pub use store::StreamDemux;
pub use view::DemuxedStream;
