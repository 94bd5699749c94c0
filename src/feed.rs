use crate::deque::BlockingDeque;

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// The error handed to a producer whose [`Feed`] was aborted. The
/// producer should stop yielding and return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aborted;

impl fmt::Display for Aborted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("feed was aborted")
    }
}

impl Error for Aborted {}

/// Closes the buffer if the producer thread unwinds, so a blocked
/// consumer is woken instead of waiting for a sentinel that never comes.
struct CloseOnPanic<T>(Arc<BlockingDeque<Option<T>>>);

impl<T> Drop for CloseOnPanic<T> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.close();
        }
    }
}

/// The producer's handle for yielding items into a [`Feed`].
pub struct Yielder<T> {
    buffer: Arc<BlockingDeque<Option<T>>>,
}

impl<T> Yielder<T> {
    /// Yields one item to the consumer, blocking while the read-ahead
    /// buffer is full. Fails once the feed has been aborted; a producer
    /// written with `?` stops on its own:
    ///
    /// ```
    /// use tandem::Feed;
    ///
    /// let feed = Feed::spawn(4, |out| {
    ///     for n in 0.. {
    ///         out.give(n)?;
    ///     }
    ///     Ok(())
    /// });
    ///
    /// let first: Vec<u64> = feed.take(3).collect();
    /// assert_eq!(first, [0, 1, 2]);
    /// ```
    pub fn give(&self, item: T) -> Result<(), Aborted> {
        self.buffer.put_last(Some(item)).map_err(|_| Aborted)
    }
}

/// A pull iterator fed by a producer running on its own thread.
///
/// The producer yields through a [`Yielder`] into a bounded buffer; once
/// `read_ahead` items are waiting, [`Yielder::give`] blocks until the
/// consumer catches up. Dropping the feed aborts the producer and joins
/// its thread.
pub struct Feed<T> {
    buffer: Arc<BlockingDeque<Option<T>>>,
    producer: Option<JoinHandle<()>>,
    done: bool,
}

impl<T: Send + 'static> Feed<T> {
    /// Spawns `produce` on a new thread with a buffer of `read_ahead`
    /// items.
    ///
    /// # Panics
    ///
    /// Panics if `read_ahead` is zero.
    pub fn spawn<F>(read_ahead: usize, produce: F) -> Feed<T>
    where
        F: FnOnce(Yielder<T>) -> Result<(), Aborted> + Send + 'static,
    {
        assert!(read_ahead > 0, "read-ahead must be positive");

        let buffer = Arc::new(BlockingDeque::with_capacity(read_ahead));
        let yielder = Yielder {
            buffer: buffer.clone(),
        };

        let producer = thread::spawn({
            let buffer = buffer.clone();
            move || {
                let guard = CloseOnPanic(buffer);
                let _ = produce(yielder);
                // End-of-stream marker; ignored if the feed was aborted.
                let _ = guard.0.put_last(None);
            }
        });

        Feed {
            buffer,
            producer: Some(producer),
            done: false,
        }
    }
}

impl<T> Feed<T> {
    /// Aborts the producer: wakes it if blocked and makes every further
    /// [`Yielder::give`] fail. Returns whether the producer had already
    /// finished on its own.
    pub fn abort(&mut self) -> bool {
        let finished = self
            .producer
            .as_ref()
            .map(|handle| handle.is_finished())
            .unwrap_or(true);

        self.buffer.close();
        self.join_producer();
        self.done = true;
        finished
    }

    fn join_producer(&mut self) {
        if let Some(handle) = self.producer.take() {
            let _ = handle.join();
        }
    }
}

impl<T> Iterator for Feed<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.done {
            return None;
        }

        match self.buffer.take_first() {
            Ok(Some(item)) => Some(item),
            // End-of-stream marker, or the feed was closed under us.
            Ok(None) | Err(_) => {
                self.done = true;
                self.join_producer();
                None
            }
        }
    }
}

impl<T> Drop for Feed<T> {
    fn drop(&mut self) {
        self.buffer.close();
        self.join_producer();
    }
}
