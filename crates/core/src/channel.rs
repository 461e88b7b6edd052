//! Multi-producer, single-consumer channel with batch draining.
//!
//! Producers never block. The consumer either takes items one at a time or
//! drains everything buffered in one go, which lets a slow consumer collapse
//! a burst of producer calls into "only the latest matters".
//!
//! Items always go through the buffer and a waiting consumer is woken
//! immediately, so dropping a `consume`/`consume_batch` future never loses an
//! item.

use crate::error::ChannelError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Notify;

struct Inner<T> {
    buffer: VecDeque<T>,
    closed: bool,
}

struct Shared<T> {
    inner: Mutex<Inner<T>>,
    notify: Notify,
}

/// Multi-producer, single-consumer queue. Cloning yields another handle to the
/// same channel.
pub struct Channel<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Channel<T> {
    /// Create an open, empty channel.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    buffer: VecDeque::new(),
                    closed: false,
                }),
                notify: Notify::new(),
            }),
        }
    }

    /// Enqueue an item, waking the consumer if it is waiting.
    pub fn produce(&self, item: T) -> Result<(), ChannelError> {
        {
            let mut inner = self.shared.inner.lock();
            if inner.closed {
                return Err(ChannelError::Closed);
            }
            inner.buffer.push_back(item);
        }
        self.shared.notify.notify_one();
        Ok(())
    }

    /// Take the oldest item, waiting for one if the buffer is empty.
    ///
    /// Fails once the channel is closed and the buffer is drained.
    pub async fn consume(&self) -> Result<T, ChannelError> {
        loop {
            let notified = self.shared.notify.notified();
            {
                let mut inner = self.shared.inner.lock();
                if let Some(item) = inner.buffer.pop_front() {
                    return Ok(item);
                }
                if inner.closed {
                    return Err(ChannelError::Closed);
                }
            }
            notified.await;
        }
    }

    /// Wait until at least one item is buffered, then drain and return all of
    /// them in production order.
    ///
    /// Fails once the channel is closed and the buffer is drained.
    pub async fn consume_batch(&self) -> Result<Vec<T>, ChannelError> {
        loop {
            let notified = self.shared.notify.notified();
            {
                let mut inner = self.shared.inner.lock();
                if !inner.buffer.is_empty() {
                    return Ok(inner.buffer.drain(..).collect());
                }
                if inner.closed {
                    return Err(ChannelError::Closed);
                }
            }
            notified.await;
        }
    }

    /// Close the channel. Buffered items can still be consumed.
    pub fn close(&self) {
        self.shared.inner.lock().closed = true;
        self.shared.notify.notify_waiters();
        self.shared.notify.notify_one();
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.shared.inner.lock().closed
    }

    /// Number of buffered items.
    pub fn len(&self) -> usize {
        self.shared.inner.lock().buffer.len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Feed every item to `action`, one at a time, until the channel closes.
    pub async fn run_consume_forever<F, Fut>(&self, mut action: F)
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = ()>,
    {
        while let Ok(item) = self.consume().await {
            action(item).await;
        }
    }

    /// Feed every drained batch to `action` until the channel closes.
    pub async fn run_consume_batch_forever<F, Fut>(&self, mut action: F)
    where
        F: FnMut(Vec<T>) -> Fut,
        Fut: Future<Output = ()>,
    {
        while let Ok(batch) = self.consume_batch().await {
            action(batch).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_consume_returns_buffered_items_in_order() {
        let channel = Channel::new();
        channel.produce(1).unwrap();
        channel.produce(2).unwrap();

        assert_eq!(channel.consume().await.unwrap(), 1);
        assert_eq!(channel.consume().await.unwrap(), 2);
        assert!(channel.is_empty());
    }

    #[tokio::test]
    async fn test_consume_waits_for_producer() {
        let channel = Channel::new();
        let consumer = {
            let channel = channel.clone();
            tokio::spawn(async move { channel.consume().await })
        };

        tokio::task::yield_now().await;
        channel.produce("hello").unwrap();

        assert_eq!(consumer.await.unwrap().unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_consume_batch_drains_everything_since_last_drain() {
        let channel = Channel::new();
        for i in 0..5 {
            channel.produce(i).unwrap();
        }
        assert_eq!(channel.consume_batch().await.unwrap(), vec![0, 1, 2, 3, 4]);

        channel.produce(5).unwrap();
        channel.produce(6).unwrap();
        assert_eq!(channel.consume_batch().await.unwrap(), vec![5, 6]);
    }

    #[tokio::test]
    async fn test_consume_batch_interleaved_with_producers() {
        let channel = Channel::new();
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let channel = channel.clone();
                tokio::spawn(async move {
                    for i in 0..25 {
                        channel.produce((p, i)).unwrap();
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.await.unwrap();
        }

        let mut seen = Vec::new();
        while !channel.is_empty() {
            seen.extend(channel.consume_batch().await.unwrap());
        }
        assert_eq!(seen.len(), 100);
        // Per-producer order is preserved.
        for p in 0..4 {
            let from_p: Vec<_> = seen.iter().filter(|(q, _)| *q == p).map(|(_, i)| *i).collect();
            assert_eq!(from_p, (0..25).collect::<Vec<_>>());
        }
    }

    #[tokio::test]
    async fn test_consume_on_closed_empty_channel_fails() {
        let channel: Channel<u32> = Channel::new();
        channel.close();
        assert_eq!(channel.consume().await, Err(ChannelError::Closed));
        assert_eq!(channel.consume_batch().await, Err(ChannelError::Closed));
    }

    #[tokio::test]
    async fn test_produce_after_close_fails() {
        let channel = Channel::new();
        channel.close();
        assert_eq!(channel.produce(7), Err(ChannelError::Closed));
    }

    #[tokio::test]
    async fn test_buffered_items_survive_close() {
        let channel = Channel::new();
        channel.produce(1).unwrap();
        channel.close();
        assert_eq!(channel.consume().await, Ok(1));
        assert_eq!(channel.consume().await, Err(ChannelError::Closed));
    }

    #[tokio::test]
    async fn test_close_wakes_waiting_consumer() {
        let channel: Channel<u32> = Channel::new();
        let consumer = {
            let channel = channel.clone();
            tokio::spawn(async move { channel.consume_batch().await })
        };

        tokio::task::yield_now().await;
        channel.close();

        assert_eq!(consumer.await.unwrap(), Err(ChannelError::Closed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_consume_keeps_item() {
        let channel = Channel::new();
        let timed_out =
            tokio::time::timeout(Duration::from_millis(10), channel.consume_batch()).await;
        assert!(timed_out.is_err());

        channel.produce(42).unwrap();
        assert_eq!(channel.consume_batch().await.unwrap(), vec![42]);
    }

    #[tokio::test]
    async fn test_run_consume_batch_forever_stops_on_close() {
        let channel = Channel::new();
        channel.produce("a").unwrap();
        channel.produce("b").unwrap();

        let collected = Arc::new(Mutex::new(Vec::new()));
        let runner = {
            let channel = channel.clone();
            let collected = Arc::clone(&collected);
            tokio::spawn(async move {
                channel
                    .run_consume_batch_forever(|batch| {
                        let collected = Arc::clone(&collected);
                        async move { collected.lock().push(batch.concat()) }
                    })
                    .await
            })
        };

        tokio::task::yield_now().await;
        channel.close();
        runner.await.unwrap();

        assert_eq!(collected.lock().concat(), "ab");
    }

    #[tokio::test]
    async fn test_run_consume_forever_sees_each_item() {
        let channel = Channel::new();
        for i in 1..=3 {
            channel.produce(i).unwrap();
        }
        channel.close();

        let mut total = 0;
        channel
            .run_consume_forever(|i| {
                total += i;
                async {}
            })
            .await;
        assert_eq!(total, 6);
    }
}
