//! Stream demultiplexer implementation
//!
//! Many named channels projected over one [`BroadcastStream`]. Every write is
//! tagged with its channel name; consumers bound to other names skip it.

use std::sync::Arc;
use std::time::Duration;

use crate::stream::{
    BroadcastStream, Consumer, ConsumerId, ConsumerStats, Packet, Route, StreamConfig,
};

use super::view::DemuxedStream;

/// Multiplexes named channels onto one shared chain
///
/// Channels are not objects: a name with no consumers costs nothing, and a
/// consumer only sees writes made to its name after it was created.
///
/// Backpressure is counted the same way as on a plain stream: every node a
/// consumer's cursor passes costs one unit, including nodes written to other
/// channels. A consumer's backpressure therefore measures how far it is
/// behind the shared chain, not just its own channel's backlog.
pub struct StreamDemux<T> {
    stream: BroadcastStream<T>,
}

impl<T> Clone for StreamDemux<T> {
    fn clone(&self) -> Self {
        Self {
            stream: self.stream.clone(),
        }
    }
}

impl<T> StreamDemux<T> {
    /// Create a new demultiplexer with default configuration
    pub fn new() -> Self {
        Self::with_config(StreamConfig::default())
    }

    /// Create a new demultiplexer with custom configuration
    pub fn with_config(config: StreamConfig) -> Self {
        Self {
            stream: BroadcastStream::with_config(config),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &StreamConfig {
        self.stream.config()
    }

    /// Write a value to one channel
    pub fn write(&self, name: impl Into<Arc<str>>, value: T) {
        self.stream
            .append(Packet::Value(value), Route::Channel(name.into()));
    }

    /// Close one channel
    ///
    /// Consumers bound to other channels skip the end marker.
    pub fn close(&self, name: impl Into<Arc<str>>, value: Option<T>) {
        self.stream
            .append(Packet::Done(value), Route::Channel(name.into()));
    }

    /// Close every channel at once
    pub fn close_all(&self, value: Option<T>) {
        self.stream.close(value);
    }

    /// Write a value only one consumer will surface, whatever its channel
    pub fn write_to_consumer(&self, consumer_id: ConsumerId, value: T) {
        self.stream.write_to_consumer(consumer_id, value);
    }

    /// Close a single consumer through the chain
    pub fn close_consumer(&self, consumer_id: ConsumerId, value: Option<T>) {
        self.stream.close_consumer(consumer_id, value);
    }

    /// Terminate every consumer bound to `name` without touching the chain
    pub fn kill(&self, name: &str, value: Option<T>)
    where
        T: Clone,
    {
        self.stream
            .kill_where(value, |slot| slot.is_bound_to(name));
    }

    /// Terminate every consumer without touching the chain
    pub fn kill_all(&self, value: Option<T>)
    where
        T: Clone,
    {
        self.stream.kill(value);
    }

    /// Terminate one consumer without touching the chain
    pub fn kill_consumer(&self, consumer_id: ConsumerId, value: Option<T>) {
        self.stream.kill_consumer(consumer_id, value);
    }

    /// Create a consumer bound to `name`
    ///
    /// It surfaces writes to `name` and stops at `close(name)`, `close_all`
    /// or a directed close.
    pub fn create_consumer(
        &self,
        name: impl Into<Arc<str>>,
        timeout: Option<Duration>,
    ) -> Consumer<T> {
        self.stream.create_bound_consumer(Some(name.into()), timeout)
    }

    /// Get a named view of one channel
    pub fn stream(&self, name: impl Into<Arc<str>>) -> DemuxedStream<T> {
        DemuxedStream::new(self.clone(), name.into())
    }

    /// Check if a consumer is registered and bound to `name`
    pub fn has_consumer(&self, name: &str, consumer_id: ConsumerId) -> bool {
        self.stream
            .consumer_stats(consumer_id)
            .is_some_and(|stats| stats.channel.as_deref() == Some(name))
    }

    /// Check if a consumer is registered on any channel
    pub fn has_consumer_all(&self, consumer_id: ConsumerId) -> bool {
        self.stream.has_consumer(consumer_id)
    }

    pub fn consumer_stats(&self, consumer_id: ConsumerId) -> Option<ConsumerStats> {
        self.stream.consumer_stats(consumer_id)
    }

    /// Stats for consumers bound to `name`, ordered by id
    pub fn consumer_stats_list(&self, name: &str) -> Vec<ConsumerStats> {
        self.stream.stats_where(|slot| slot.is_bound_to(name))
    }

    pub fn all_consumer_stats(&self) -> Vec<ConsumerStats> {
        self.stream.all_consumer_stats()
    }

    /// Highest backpressure among consumers bound to `name` (0 if none)
    pub fn backpressure(&self, name: &str) -> usize {
        self.stream
            .backpressure_where(|slot| slot.is_bound_to(name))
    }

    /// Highest backpressure among all consumers
    pub fn backpressure_all(&self) -> usize {
        self.stream.backpressure()
    }

    pub fn consumer_backpressure(&self, consumer_id: ConsumerId) -> usize {
        self.stream.consumer_backpressure(consumer_id)
    }

    /// Number of consumers bound to `name`
    pub fn consumer_count(&self, name: &str) -> usize {
        self.stream.count_where(|slot| slot.is_bound_to(name))
    }
}

impl<T> Default for StreamDemux<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for StreamDemux<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDemux")
            .field("stream", &self.stream)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::sleep;
    use tokio_test::{assert_pending, assert_ready};

    use super::*;

    async fn drain<T: Clone>(mut consumer: Consumer<T>) -> Vec<T> {
        let mut received = Vec::new();
        while let Packet::Value(value) = consumer.next().await.unwrap() {
            received.push(value);
        }
        received
    }

    #[tokio::test(start_paused = true)]
    async fn test_demultiplex_substreams() {
        let demux: StreamDemux<String> = StreamDemux::new();
        let hello = tokio::spawn(drain(demux.create_consumer("hello", None)));
        let abc = tokio::spawn(drain(demux.create_consumer("abc", None)));

        let writer = demux.clone();
        tokio::spawn(async move {
            for i in 0..10 {
                sleep(Duration::from_millis(10)).await;
                writer.write("hello", format!("world{}", i));
                writer.write("abc", format!("def{}", i));
            }
            writer.close("hello", None);
            writer.close("abc", None);
        });

        let hello = hello.await.unwrap();
        let abc = abc.await.unwrap();

        assert_eq!(hello.len(), 10);
        assert_eq!(hello[0], "world0");
        assert_eq!(hello[1], "world1");
        assert_eq!(hello[9], "world9");

        assert_eq!(abc.len(), 10);
        assert_eq!(abc[0], "def0");
        assert_eq!(abc[9], "def9");
    }

    #[tokio::test(start_paused = true)]
    async fn test_multiple_consumers_on_one_substream() {
        let demux: StreamDemux<u32> = StreamDemux::new();
        let substream = demux.stream("hello");
        let readers: Vec<_> = (0..3)
            .map(|_| tokio::spawn(drain(substream.consumer())))
            .collect();

        let writer = demux.clone();
        tokio::spawn(async move {
            for i in 0..10 {
                sleep(Duration::from_millis(10)).await;
                writer.write("hello", i);
            }
            writer.close("hello", None);
        });

        for reader in readers {
            assert_eq!(reader.await.unwrap(), (0..10).collect::<Vec<_>>());
        }
    }

    #[tokio::test]
    async fn test_interleaved_writes_keep_order() {
        let demux = StreamDemux::new();
        let mut consumer = demux.stream("hello").consumer();

        for i in 0..10 {
            demux.write("hello", format!("world{}", i));
            demux.write("hello", format!("foo{}", i));
        }
        demux.close("hello", None);

        let mut received = Vec::new();
        loop {
            match consumer.next().await.unwrap() {
                Packet::Value(value) => received.push(value),
                Packet::Done(_) => break,
            }
        }

        assert_eq!(received.len(), 20);
        assert_eq!(received[0], "world0");
        assert_eq!(received[1], "foo0");
        assert_eq!(received[2], "world1");
        assert_eq!(received[3], "foo1");
    }

    #[tokio::test]
    async fn test_close_isolated_per_name() {
        let demux = StreamDemux::new();
        let mut a = demux.create_consumer("A", None);
        let mut b = demux.create_consumer("B", None);

        demux.write("A", 1);
        demux.close("A", Some(2));
        demux.write("B", 3);

        assert_eq!(a.next().await.unwrap(), Packet::Value(1));
        assert_eq!(a.next().await.unwrap(), Packet::Done(Some(2)));
        assert!(!demux.has_consumer_all(a.id()));

        assert_eq!(b.next().await.unwrap(), Packet::Value(3));
        assert!(demux.has_consumer("B", b.id()));

        demux.write("B", 4);
        assert_eq!(b.next().await.unwrap(), Packet::Value(4));
    }

    #[tokio::test]
    async fn test_close_all_terminates_every_name() {
        let demux = StreamDemux::new();
        let mut consumers = vec![
            demux.create_consumer("hello", None),
            demux.create_consumer("abc", None),
            demux.create_consumer("xyz", None),
        ];

        demux.write("hello", "world");
        demux.write("abc", "def");
        demux.close_all(Some("bye"));

        assert_eq!(consumers[0].next().await.unwrap(), Packet::Value("world"));
        assert_eq!(consumers[1].next().await.unwrap(), Packet::Value("def"));
        for consumer in consumers.iter_mut() {
            assert_eq!(consumer.next().await.unwrap(), Packet::Done(Some("bye")));
        }
        assert_eq!(demux.all_consumer_stats().len(), 0);
    }

    #[tokio::test]
    async fn test_close_all_wakes_suspended_consumers() {
        let demux: StreamDemux<&str> = StreamDemux::new();
        let mut hello = demux.create_consumer("hello", None);
        let mut abc = demux.create_consumer("abc", None);

        let mut next_hello = tokio_test::task::spawn(hello.next());
        let mut next_abc = tokio_test::task::spawn(abc.next());
        assert_pending!(next_hello.poll());
        assert_pending!(next_abc.poll());

        demux.close_all(None);
        assert!(next_hello.is_woken());
        assert!(next_abc.is_woken());
        assert_eq!(assert_ready!(next_hello.poll()).unwrap(), Packet::Done(None));
        assert_eq!(assert_ready!(next_abc.poll()).unwrap(), Packet::Done(None));
    }

    #[tokio::test]
    async fn test_resume_after_close_all() {
        let demux = StreamDemux::new();

        let first = demux.create_consumer("hello", None);
        for i in 0..10 {
            demux.write("hello", format!("a{}", i));
        }
        demux.close_all(None);
        let first = drain(first).await;
        assert_eq!(first.len(), 10);

        let second = demux.create_consumer("hello", None);
        for i in 0..10 {
            demux.write("hello", format!("b{}", i));
        }
        demux.close_all(None);
        let second = drain(second).await;
        assert_eq!(second.len(), 10);
        assert_eq!(second[0], "b0");
    }

    #[tokio::test]
    async fn test_reuse_after_named_close() {
        let demux = StreamDemux::new();

        let first = demux.create_consumer("hello", None);
        demux.write("hello", 1);
        demux.close("hello", None);
        assert_eq!(drain(first).await, vec![1]);

        let second = demux.create_consumer("hello", None);
        demux.write("hello", 2);
        demux.close("hello", None);
        assert_eq!(drain(second).await, vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_once() {
        let demux: StreamDemux<String> = StreamDemux::new();
        let substream = demux.stream("hello");

        let writer = demux.clone();
        tokio::spawn(async move {
            for i in 0..10 {
                sleep(Duration::from_millis(10)).await;
                writer.write("hello", format!("world{}", i));
            }
            writer.close("hello", None);
        });

        assert_eq!(substream.once(None).await.unwrap().as_deref(), Some("world0"));
        assert_eq!(substream.once(None).await.unwrap().as_deref(), Some("world1"));
        assert_eq!(substream.once(None).await.unwrap().as_deref(), Some("world2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_once_on_closed_channel() {
        let demux: StreamDemux<String> = StreamDemux::new();
        let substream = demux.stream("hello");

        let writer = demux.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(10)).await;
            writer.close("hello", None);
        });

        assert_eq!(substream.once(None).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_once_with_timeout() {
        let demux: StreamDemux<String> = StreamDemux::new();
        let substream = demux.stream("hello");

        let writer = demux.clone();
        tokio::spawn(async move {
            for i in 0..3 {
                sleep(Duration::from_millis(20)).await;
                writer.write("hello", format!("world{}", i));
            }
            writer.close("hello", None);
        });

        let packet = substream.once(Some(Duration::from_millis(30))).await;
        assert_eq!(packet.unwrap().as_deref(), Some("world0"));

        let err = substream
            .once(Some(Duration::from_millis(10)))
            .await
            .unwrap_err();
        assert_eq!(err.timeout, Duration::from_millis(10));
        assert_eq!(substream.consumer_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_with_close() {
        let demux: StreamDemux<String> = StreamDemux::new();
        let mut consumer = demux.stream("hello").consumer();

        let writer = demux.clone();
        tokio::spawn(async move {
            for i in 0..3 {
                sleep(Duration::from_millis(10)).await;
                writer.write("hello", format!("world{}", i));
            }
            sleep(Duration::from_millis(10)).await;
            writer.close("hello", None);
        });

        for i in 0..3 {
            assert_eq!(
                consumer.next().await.unwrap(),
                Packet::Value(format!("world{}", i))
            );
        }
        assert_eq!(consumer.next().await.unwrap(), Packet::Done(None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_with_close_all() {
        let demux: StreamDemux<&str> = StreamDemux::new();
        let mut consumer = demux.stream("hello").consumer();

        let writer = demux.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(10)).await;
            writer.write("hello", "world");
            sleep(Duration::from_millis(10)).await;
            writer.close_all(None);
        });

        assert_eq!(consumer.next().await.unwrap(), Packet::Value("world"));
        assert_eq!(consumer.next().await.unwrap(), Packet::Done(None));
    }

    #[tokio::test]
    async fn test_backpressure_counts_other_channels() {
        let demux = StreamDemux::new();
        let mut hello = demux.create_consumer("hello", None);
        let abc = demux.create_consumer("abc", None);

        demux.write("abc", 1);
        demux.write("abc", 2);
        demux.write("hello", 3);

        assert_eq!(demux.consumer_backpressure(hello.id()), 3);
        assert_eq!(demux.backpressure("hello"), 3);
        assert_eq!(demux.backpressure("nobody"), 0);

        // Skipping the two "abc" nodes releases them too
        assert_eq!(hello.next().await.unwrap(), Packet::Value(3));
        assert_eq!(hello.backpressure(), 0);
        assert_eq!(demux.backpressure("abc"), 3);
        assert_eq!(demux.backpressure_all(), 3);
        assert_eq!(abc.backpressure(), 3);
    }

    #[tokio::test]
    async fn test_directed_write_crosses_channels() {
        let demux = StreamDemux::new();
        let mut hello = demux.create_consumer("hello", None);
        let mut abc = demux.create_consumer("abc", None);

        demux.write_to_consumer(abc.id(), "direct");
        demux.close_consumer(abc.id(), None);
        demux.write("hello", "broadcast");

        assert_eq!(abc.next().await.unwrap(), Packet::Value("direct"));
        assert_eq!(abc.next().await.unwrap(), Packet::Done(None));
        assert_eq!(hello.next().await.unwrap(), Packet::Value("broadcast"));
    }

    #[tokio::test]
    async fn test_kill_by_name() {
        let demux: StreamDemux<u32> = StreamDemux::new();
        let mut a1 = demux.create_consumer("A", None);
        let mut a2 = demux.create_consumer("A", None);
        let mut b = demux.create_consumer("B", None);

        let mut next_b = tokio_test::task::spawn(b.next());
        assert_pending!(next_b.poll());

        demux.kill("A", Some(0));
        assert_eq!(demux.consumer_count("A"), 0);
        assert_eq!(demux.consumer_count("B"), 1);
        assert!(!next_b.is_woken());

        assert_eq!(a1.next().await.unwrap(), Packet::Done(Some(0)));
        assert_eq!(a2.next().await.unwrap(), Packet::Done(Some(0)));

        demux.write("B", 5);
        assert_eq!(assert_ready!(next_b.poll()).unwrap(), Packet::Value(5));
    }

    #[tokio::test]
    async fn test_kill_all_and_kill_consumer() {
        let demux: StreamDemux<u32> = StreamDemux::new();
        let mut a = demux.create_consumer("A", None);
        let mut b = demux.create_consumer("B", None);
        let mut c = demux.create_consumer("C", None);

        demux.kill_consumer(a.id(), Some(1));
        assert!(!demux.has_consumer_all(a.id()));
        assert!(demux.has_consumer_all(b.id()));

        demux.kill_all(Some(2));
        assert!(demux.all_consumer_stats().is_empty());

        assert_eq!(a.next().await.unwrap(), Packet::Done(Some(1)));
        assert_eq!(b.next().await.unwrap(), Packet::Done(Some(2)));
        assert_eq!(c.next().await.unwrap(), Packet::Done(Some(2)));
    }

    #[tokio::test]
    async fn test_consumer_stats_carry_channel() {
        let demux: StreamDemux<u32> = StreamDemux::new();
        let a = demux.create_consumer("A", Some(Duration::from_secs(1)));
        let _b = demux.create_consumer("B", None);

        let stats = demux.consumer_stats(a.id()).unwrap();
        assert_eq!(stats.channel.as_deref(), Some("A"));
        assert_eq!(stats.timeout, Some(Duration::from_secs(1)));

        let listed = demux.consumer_stats_list("A");
        assert_eq!(listed, vec![stats]);
        assert_eq!(demux.all_consumer_stats().len(), 2);

        assert!(!demux.has_consumer("B", a.id()));
        assert!(demux.consumer_stats(999).is_none());
        assert_eq!(demux.consumer_backpressure(999), 0);
    }

    #[tokio::test]
    async fn test_write_before_consumer_is_not_seen() {
        let demux = StreamDemux::new();
        demux.write("hello", 1);
        demux.close("hello", None);

        let mut consumer = demux.create_consumer("hello", None);
        let mut next = tokio_test::task::spawn(consumer.next());
        assert_pending!(next.poll());

        demux.write("hello", 2);
        assert_eq!(assert_ready!(next.poll()).unwrap(), Packet::Value(2));
    }
}
