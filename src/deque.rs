use crate::sync::{Acquire, Semaphore};

use std::collections::VecDeque;
use std::error::Error;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Mutex;
use std::time::Duration;

/// A double-ended container a [`BlockingDeque`] can be built over.
///
/// The adapter owns the backing container exclusively and serializes all
/// access to it, so implementations do not need any internal
/// synchronization. The backing's own ordering decides which element a
/// successful removal returns; the adapter only gates whether an
/// operation may proceed.
pub trait Backing<T> {
    /// Inserts at the front, giving the item back if the container
    /// rejects it.
    fn push_front(&mut self, item: T) -> Result<(), T>;

    /// Inserts at the back, giving the item back if the container
    /// rejects it.
    fn push_back(&mut self, item: T) -> Result<(), T>;

    fn pop_front(&mut self) -> Option<T>;

    fn pop_back(&mut self) -> Option<T>;

    fn front(&self) -> Option<&T>;

    fn back(&self) -> Option<&T>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes the first element equal to `value`, scanning front to back.
    fn remove_first_occurrence(&mut self, value: &T) -> bool
    where
        T: PartialEq;

    /// Removes the last element equal to `value`, scanning back to front.
    fn remove_last_occurrence(&mut self, value: &T) -> bool
    where
        T: PartialEq;

    /// The current contents in front-to-back order.
    fn snapshot(&self) -> Vec<T>
    where
        T: Clone;
}

impl<T> Backing<T> for VecDeque<T> {
    fn push_front(&mut self, item: T) -> Result<(), T> {
        VecDeque::push_front(self, item);
        Ok(())
    }

    fn push_back(&mut self, item: T) -> Result<(), T> {
        VecDeque::push_back(self, item);
        Ok(())
    }

    fn pop_front(&mut self) -> Option<T> {
        VecDeque::pop_front(self)
    }

    fn pop_back(&mut self) -> Option<T> {
        VecDeque::pop_back(self)
    }

    fn front(&self) -> Option<&T> {
        VecDeque::front(self)
    }

    fn back(&self) -> Option<&T> {
        VecDeque::back(self)
    }

    fn len(&self) -> usize {
        VecDeque::len(self)
    }

    fn remove_first_occurrence(&mut self, value: &T) -> bool
    where
        T: PartialEq,
    {
        match self.iter().position(|x| x == value) {
            Some(i) => {
                self.remove(i);
                true
            }
            None => false,
        }
    }

    fn remove_last_occurrence(&mut self, value: &T) -> bool
    where
        T: PartialEq,
    {
        match self.iter().rposition(|x| x == value) {
            Some(i) => {
                self.remove(i);
                true
            }
            None => false,
        }
    }

    fn snapshot(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.iter().cloned().collect()
    }
}

/// The error returned by a non-blocking insertion into a full deque.
/// Carries the rejected item back to the caller.
pub struct Full<T>(pub T);

impl<T> Full<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for Full<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Full(..)")
    }
}

impl<T> fmt::Display for Full<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("deque is full")
    }
}

impl<T> Error for Full<T> {}

/// The error returned by a blocking or timed insertion. Carries the
/// rejected item back to the caller.
pub enum PushError<T> {
    /// The timed wait for capacity expired.
    TimedOut(T),

    /// The backing container refused the insertion. The capacity permit
    /// was returned before this error was produced.
    Rejected(T),

    /// The deque was closed while waiting.
    Interrupted(T),
}

impl<T> PushError<T> {
    pub fn into_inner(self) -> T {
        match self {
            PushError::TimedOut(item) => item,
            PushError::Rejected(item) => item,
            PushError::Interrupted(item) => item,
        }
    }
}

impl<T> fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushError::TimedOut(_) => f.write_str("TimedOut(..)"),
            PushError::Rejected(_) => f.write_str("Rejected(..)"),
            PushError::Interrupted(_) => f.write_str("Interrupted(..)"),
        }
    }
}

impl<T> fmt::Display for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushError::TimedOut(_) => f.write_str("timed out waiting for capacity"),
            PushError::Rejected(_) => f.write_str("backing deque rejected the insertion"),
            PushError::Interrupted(_) => f.write_str("deque was closed while waiting"),
        }
    }
}

impl<T> Error for PushError<T> {}

/// The error returned by a non-blocking removal or peek on an empty deque.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Empty;

impl fmt::Display for Empty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("deque is empty")
    }
}

impl Error for Empty {}

/// The error returned when a blocking wait was cancelled by
/// [`BlockingDeque::close`]. Distinct from timeout expiry, which yields an
/// explicit "no result" instead of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupted;

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("blocking operation was interrupted")
    }
}

impl Error for Interrupted {}

#[derive(Clone, Copy)]
enum End {
    Front,
    Back,
}

/// A blocking deque built from two counting semaphores over a [`Backing`]
/// double-ended container.
///
/// `avail` holds one permit per enqueued element; the bounded variant adds
/// a `free` semaphore holding one permit per remaining slot. Producers
/// take `free` and release `avail`, consumers take `avail` and release
/// `free`; at every quiescent point `avail + free == capacity`. This is
/// classic producer/consumer backpressure: producers block on a full
/// deque, consumers block on an empty one, and neither semaphore has any
/// say in which element an operation touches. That is entirely the
/// backing container's ordering.
///
/// Every permit acquisition that does not end in a successful backing
/// mutation is returned before the operation returns, so the permit
/// counts and the backing contents never drift apart.
///
/// ```
/// use std::collections::VecDeque;
/// use tandem::BlockingDeque;
///
/// let deque = BlockingDeque::bounded(VecDeque::new(), 2);
/// assert!(deque.offer_last(1).is_ok());
/// assert!(deque.offer_last(2).is_ok());
/// assert!(deque.offer_last(3).is_err()); // full
///
/// assert_eq!(deque.take_first().unwrap(), 1);
/// assert!(deque.offer_last(3).is_ok());
/// ```
pub struct BlockingDeque<T, B = VecDeque<T>> {
    backing: Mutex<B>,

    /// One permit per enqueued element.
    avail: Semaphore,

    /// One permit per free slot; `None` for the unbounded variant.
    free: Option<Semaphore>,

    /// `fn() -> T` so the marker does not impose `T: Sync` on the deque.
    _items: PhantomData<fn() -> T>,
}

impl<T, B: Backing<T>> BlockingDeque<T, B> {
    /// Wraps `backing` with a capacity bound.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or the backing container already
    /// holds more than `capacity` elements.
    pub fn bounded(backing: B, capacity: usize) -> BlockingDeque<T, B> {
        assert!(capacity > 0, "capacity must be positive");
        let held = backing.len();
        assert!(
            held <= capacity,
            "backing deque holds {held} elements, more than the bound of {capacity}"
        );

        BlockingDeque {
            backing: Mutex::new(backing),
            avail: Semaphore::new(held),
            free: Some(Semaphore::new(capacity - held)),
            _items: PhantomData,
        }
    }

    /// Wraps `backing` without a capacity bound: insertions never block
    /// and never report the deque as full.
    pub fn unbounded(backing: B) -> BlockingDeque<T, B> {
        let held = backing.len();

        BlockingDeque {
            backing: Mutex::new(backing),
            avail: Semaphore::new(held),
            free: None,
            _items: PhantomData,
        }
    }

    /// The number of enqueued elements, as counted by the `avail`
    /// semaphore.
    pub fn len(&self) -> usize {
        self.avail.permits()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of free slots, or `None` for the unbounded variant.
    pub fn remaining_capacity(&self) -> Option<usize> {
        self.free.as_ref().map(Semaphore::permits)
    }

    /// Cancels every blocked producer and consumer. Blocked and
    /// subsequent blocking calls fail with [`Interrupted`]; non-blocking
    /// operations keep working.
    pub fn close(&self) {
        self.avail.close();
        if let Some(free) = &self.free {
            free.close();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.avail.is_closed()
    }

    // Insertion.

    /// Inserts at the front without blocking, failing if no capacity is
    /// free.
    pub fn offer_first(&self, item: T) -> Result<(), Full<T>> {
        self.offer_at(item, End::Front)
    }

    /// Inserts at the back without blocking, failing if no capacity is
    /// free.
    pub fn offer_last(&self, item: T) -> Result<(), Full<T>> {
        self.offer_at(item, End::Back)
    }

    /// Inserts at the front, waiting up to `timeout` for capacity.
    pub fn offer_first_timeout(&self, item: T, timeout: Duration) -> Result<(), PushError<T>> {
        self.offer_timeout(item, End::Front, timeout)
    }

    /// Inserts at the back, waiting up to `timeout` for capacity.
    pub fn offer_last_timeout(&self, item: T, timeout: Duration) -> Result<(), PushError<T>> {
        self.offer_timeout(item, End::Back, timeout)
    }

    /// Inserts at the front, blocking until capacity is free.
    pub fn put_first(&self, item: T) -> Result<(), PushError<T>> {
        self.put_at(item, End::Front)
    }

    /// Inserts at the back, blocking until capacity is free.
    pub fn put_last(&self, item: T) -> Result<(), PushError<T>> {
        self.put_at(item, End::Back)
    }

    fn offer_at(&self, item: T, end: End) -> Result<(), Full<T>> {
        if !self.reserve() {
            return Err(Full(item));
        }
        self.finish_push(item, end).map_err(Full)
    }

    fn offer_timeout(&self, item: T, end: End, timeout: Duration) -> Result<(), PushError<T>> {
        if let Some(free) = &self.free {
            match free.acquire_timeout(timeout) {
                Acquire::Acquired => {}
                Acquire::TimedOut => return Err(PushError::TimedOut(item)),
                Acquire::Cancelled => return Err(PushError::Interrupted(item)),
            }
        }
        self.finish_push(item, end).map_err(PushError::Rejected)
    }

    fn put_at(&self, item: T, end: End) -> Result<(), PushError<T>> {
        if let Some(free) = &self.free {
            match free.acquire() {
                Acquire::Acquired => {}
                _ => return Err(PushError::Interrupted(item)),
            }
        }
        self.finish_push(item, end).map_err(PushError::Rejected)
    }

    /// Inserts into the backing deque with a capacity permit in hand (or
    /// no bound at all). Exactly one of two things happens: the insertion
    /// succeeds and an `avail` permit is released, or the item comes back
    /// and the capacity permit is returned to `free`.
    fn finish_push(&self, item: T, end: End) -> Result<(), T> {
        let mut backing = self.backing.lock().unwrap();
        let pushed = match end {
            End::Front => backing.push_front(item),
            End::Back => backing.push_back(item),
        };
        drop(backing);

        match pushed {
            Ok(()) => {
                self.avail.release(1);
                Ok(())
            }
            Err(item) => {
                if let Some(free) = &self.free {
                    free.release(1);
                }
                Err(item)
            }
        }
    }

    fn reserve(&self) -> bool {
        match &self.free {
            Some(free) => free.try_acquire(),
            None => true,
        }
    }

    // Removal.

    /// Removes the front element without blocking, failing if the deque
    /// is empty.
    pub fn remove_first(&self) -> Result<T, Empty> {
        self.poll_first().ok_or(Empty)
    }

    /// Removes the back element without blocking, failing if the deque
    /// is empty.
    pub fn remove_last(&self) -> Result<T, Empty> {
        self.poll_last().ok_or(Empty)
    }

    /// Removes the front element without blocking.
    pub fn poll_first(&self) -> Option<T> {
        if !self.avail.try_acquire() {
            return None;
        }
        self.finish_pop(End::Front)
    }

    /// Removes the back element without blocking.
    pub fn poll_last(&self) -> Option<T> {
        if !self.avail.try_acquire() {
            return None;
        }
        self.finish_pop(End::Back)
    }

    /// Removes the front element, waiting up to `timeout` for one to
    /// arrive. `Ok(None)` means the wait timed out.
    pub fn poll_first_timeout(&self, timeout: Duration) -> Result<Option<T>, Interrupted> {
        self.poll_timeout(End::Front, timeout)
    }

    /// Removes the back element, waiting up to `timeout` for one to
    /// arrive. `Ok(None)` means the wait timed out.
    pub fn poll_last_timeout(&self, timeout: Duration) -> Result<Option<T>, Interrupted> {
        self.poll_timeout(End::Back, timeout)
    }

    /// Removes the front element, blocking until one is available.
    pub fn take_first(&self) -> Result<T, Interrupted> {
        self.take_at(End::Front)
    }

    /// Removes the back element, blocking until one is available.
    pub fn take_last(&self) -> Result<T, Interrupted> {
        self.take_at(End::Back)
    }

    fn poll_timeout(&self, end: End, timeout: Duration) -> Result<Option<T>, Interrupted> {
        match self.avail.acquire_timeout(timeout) {
            Acquire::Acquired => Ok(self.finish_pop(end)),
            Acquire::TimedOut => Ok(None),
            Acquire::Cancelled => Err(Interrupted),
        }
    }

    fn take_at(&self, end: End) -> Result<T, Interrupted> {
        loop {
            match self.avail.acquire() {
                Acquire::Acquired => {}
                _ => return Err(Interrupted),
            }
            // An element is guaranteed by the permit; the retry only
            // matters for a backing that misbehaves.
            if let Some(item) = self.finish_pop(end) {
                return Ok(item);
            }
        }
    }

    /// Removes from the backing deque with an `avail` permit in hand.
    /// A successful removal releases one `free` permit; a failed one
    /// returns the `avail` permit instead.
    fn finish_pop(&self, end: End) -> Option<T> {
        let mut backing = self.backing.lock().unwrap();
        let item = match end {
            End::Front => backing.pop_front(),
            End::Back => backing.pop_back(),
        };
        drop(backing);

        match item {
            Some(item) => {
                if let Some(free) = &self.free {
                    free.release(1);
                }
                Some(item)
            }
            None => {
                self.avail.release(1);
                None
            }
        }
    }

    // Inspection.

    /// Reads the front element without removing it, bracketing the read
    /// with an acquire-and-release of one `avail` permit.
    pub fn peek_first(&self) -> Option<T>
    where
        T: Clone,
    {
        self.peek_at(End::Front)
    }

    /// Reads the back element without removing it.
    pub fn peek_last(&self) -> Option<T>
    where
        T: Clone,
    {
        self.peek_at(End::Back)
    }

    /// Like [`peek_first`](BlockingDeque::peek_first), but fails on an
    /// empty deque instead of returning `None`.
    pub fn get_first(&self) -> Result<T, Empty>
    where
        T: Clone,
    {
        self.peek_at(End::Front).ok_or(Empty)
    }

    /// Like [`peek_last`](BlockingDeque::peek_last), but fails on an
    /// empty deque instead of returning `None`.
    pub fn get_last(&self) -> Result<T, Empty>
    where
        T: Clone,
    {
        self.peek_at(End::Back).ok_or(Empty)
    }

    fn peek_at(&self, end: End) -> Option<T>
    where
        T: Clone,
    {
        if !self.avail.try_acquire() {
            return None;
        }
        let backing = self.backing.lock().unwrap();
        let item = match end {
            End::Front => backing.front().cloned(),
            End::Back => backing.back().cloned(),
        };
        drop(backing);

        // Nothing was removed; the permit goes straight back.
        self.avail.release(1);
        item
    }

    // Bulk transfer.

    /// Moves every element into `dest`, front first, returning the count
    /// moved. Permit accounting is atomic: the `avail` permits are
    /// drained up front and exactly the moved count is released to
    /// `free`.
    pub fn drain_to(&self, dest: &mut Vec<T>) -> usize {
        let claimed = self.avail.drain();
        let mut backing = self.backing.lock().unwrap();

        let mut moved = 0;
        while moved < claimed {
            match backing.pop_front() {
                Some(item) => {
                    dest.push(item);
                    moved += 1;
                }
                None => break,
            }
        }
        drop(backing);

        // Permits claimed beyond what the backing held go back.
        self.avail.release(claimed - moved);
        if let Some(free) = &self.free {
            free.release(moved);
        }
        moved
    }

    /// Moves up to `max` elements into `dest`, front first, returning the
    /// count moved.
    pub fn drain_to_limit(&self, dest: &mut Vec<T>, max: usize) -> usize {
        let mut backing = self.backing.lock().unwrap();

        let mut moved = 0;
        while moved < max && self.avail.try_acquire() {
            match backing.pop_front() {
                Some(item) => {
                    dest.push(item);
                    moved += 1;
                }
                None => {
                    self.avail.release(1);
                    break;
                }
            }
        }
        drop(backing);

        if let Some(free) = &self.free {
            free.release(moved);
        }
        moved
    }

    // Value removal.

    /// Removes the first element equal to `value`, scanning front to
    /// back. The speculatively acquired `avail` permit is given back if
    /// nothing was removed.
    pub fn remove_first_occurrence(&self, value: &T) -> bool
    where
        T: PartialEq,
    {
        self.remove_occurrence(value, End::Front)
    }

    /// Removes the last element equal to `value`, scanning back to front.
    pub fn remove_last_occurrence(&self, value: &T) -> bool
    where
        T: PartialEq,
    {
        self.remove_occurrence(value, End::Back)
    }

    fn remove_occurrence(&self, value: &T, end: End) -> bool
    where
        T: PartialEq,
    {
        if !self.avail.try_acquire() {
            return false;
        }
        let mut backing = self.backing.lock().unwrap();
        let changed = match end {
            End::Front => backing.remove_first_occurrence(value),
            End::Back => backing.remove_last_occurrence(value),
        };
        drop(backing);

        if changed {
            if let Some(free) = &self.free {
                free.release(1);
            }
        } else {
            self.avail.release(1);
        }
        changed
    }

    // Iteration.

    /// A point-in-time snapshot of the contents in the backing deque's
    /// order, front to back.
    pub fn iter(&self) -> std::vec::IntoIter<T>
    where
        T: Clone,
    {
        self.snapshot().into_iter()
    }

    /// A point-in-time snapshot of the contents, back to front.
    pub fn iter_descending(&self) -> std::iter::Rev<std::vec::IntoIter<T>>
    where
        T: Clone,
    {
        self.snapshot().into_iter().rev()
    }

    /// The current contents in front-to-back order.
    pub fn snapshot(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.backing.lock().unwrap().snapshot()
    }

    // Single-ended queue view: insert at the back, remove from the front.

    /// FIFO insert; equivalent to [`offer_last`](BlockingDeque::offer_last).
    pub fn offer(&self, item: T) -> Result<(), Full<T>> {
        self.offer_last(item)
    }

    /// FIFO insert; equivalent to [`offer_last`](BlockingDeque::offer_last).
    pub fn add(&self, item: T) -> Result<(), Full<T>> {
        self.offer_last(item)
    }

    /// FIFO timed insert.
    pub fn offer_timed(&self, item: T, timeout: Duration) -> Result<(), PushError<T>> {
        self.offer_last_timeout(item, timeout)
    }

    /// FIFO blocking insert.
    pub fn put(&self, item: T) -> Result<(), PushError<T>> {
        self.put_last(item)
    }

    /// FIFO remove; equivalent to [`poll_first`](BlockingDeque::poll_first).
    pub fn poll(&self) -> Option<T> {
        self.poll_first()
    }

    /// FIFO timed remove.
    pub fn poll_timed(&self, timeout: Duration) -> Result<Option<T>, Interrupted> {
        self.poll_first_timeout(timeout)
    }

    /// FIFO blocking remove.
    pub fn take(&self) -> Result<T, Interrupted> {
        self.take_first()
    }

    /// FIFO remove; equivalent to [`remove_first`](BlockingDeque::remove_first).
    pub fn remove(&self) -> Result<T, Empty> {
        self.remove_first()
    }

    /// FIFO peek; equivalent to [`peek_first`](BlockingDeque::peek_first).
    pub fn peek(&self) -> Option<T>
    where
        T: Clone,
    {
        self.peek_first()
    }

    /// FIFO peek; equivalent to [`get_first`](BlockingDeque::get_first).
    pub fn element(&self) -> Result<T, Empty>
    where
        T: Clone,
    {
        self.get_first()
    }

    // Stack view: both operations work on the front.

    /// LIFO insert; equivalent to [`offer_first`](BlockingDeque::offer_first).
    pub fn push(&self, item: T) -> Result<(), Full<T>> {
        self.offer_first(item)
    }

    /// LIFO remove; equivalent to [`remove_first`](BlockingDeque::remove_first).
    pub fn pop(&self) -> Result<T, Empty> {
        self.remove_first()
    }
}

impl<T> BlockingDeque<T, VecDeque<T>> {
    /// A bounded deque over a fresh [`VecDeque`].
    pub fn with_capacity(capacity: usize) -> BlockingDeque<T, VecDeque<T>> {
        BlockingDeque::bounded(VecDeque::new(), capacity)
    }
}

impl<T, B> fmt::Debug for BlockingDeque<T, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingDeque")
            .field("len", &self.avail.permits())
            .field(
                "remaining_capacity",
                &self.free.as_ref().map(Semaphore::permits),
            )
            .finish()
    }
}
