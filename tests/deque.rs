mod common;

use tandem::{Backing, BlockingDeque, Interrupted, PriorityDeque, PushError};

use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

const SHORT: Duration = Duration::from_millis(50);

#[test]
fn offer_and_poll_fifo() {
    let deque: BlockingDeque<i32> = BlockingDeque::with_capacity(8);
    for n in 1..=3 {
        deque.offer(n).unwrap();
    }

    assert_eq!(deque.len(), 3);
    assert_eq!(deque.poll(), Some(1));
    assert_eq!(deque.poll(), Some(2));
    assert_eq!(deque.poll(), Some(3));
    assert_eq!(deque.poll(), None);
}

#[test]
fn offer_on_full_rejects_and_returns_item() {
    let deque: BlockingDeque<i32> = BlockingDeque::with_capacity(2);
    deque.offer_last(1).unwrap();
    deque.offer_last(2).unwrap();

    let rejected = deque.offer_last(3).unwrap_err();
    assert_eq!(rejected.into_inner(), 3);
    assert_eq!(deque.len(), 2);
    assert_eq!(deque.remaining_capacity(), Some(0));
    assert_eq!(deque.snapshot(), [1, 2]);
}

#[test]
fn both_ends() {
    let deque: BlockingDeque<i32> = BlockingDeque::with_capacity(8);
    deque.offer_last(2).unwrap();
    deque.offer_first(1).unwrap();
    deque.offer_last(3).unwrap();

    assert_eq!(deque.snapshot(), [1, 2, 3]);
    assert_eq!(deque.poll_last(), Some(3));
    assert_eq!(deque.poll_first(), Some(1));
    assert_eq!(deque.poll_first(), Some(2));
}

// The end-to-end scenario: capacity two, the third insert fails, then a
// removal frees a slot and the insert goes through.
#[test]
fn capacity_two_scenario() {
    let deque: BlockingDeque<i32> = BlockingDeque::with_capacity(2);
    deque.offer_last(1).unwrap();
    deque.offer_last(2).unwrap();
    assert!(deque.offer_last(3).is_err());

    assert_eq!(deque.take_first().unwrap(), 1);
    deque.offer_last(3).unwrap();
    assert_eq!(deque.snapshot(), [2, 3]);
}

#[test]
fn put_blocks_until_removal() {
    let deque: BlockingDeque<i32> = BlockingDeque::with_capacity(1);
    deque.offer(1).unwrap();
    let barrier = Barrier::new(2);

    thread::scope(|s| {
        s.spawn(|| {
            barrier.wait();
            // Blocks until the consumer below frees the slot.
            deque.put(2).unwrap();
        });

        barrier.wait();
        thread::sleep(SHORT);
        assert_eq!(deque.take().unwrap(), 1);
    });

    assert_eq!(deque.poll(), Some(2));
    assert_eq!(deque.remaining_capacity(), Some(1));
}

#[test]
fn take_blocks_until_insertion() {
    let deque: BlockingDeque<i32> = BlockingDeque::with_capacity(1);
    let barrier = Barrier::new(2);

    thread::scope(|s| {
        let consumer = s.spawn(|| {
            barrier.wait();
            deque.take()
        });

        barrier.wait();
        thread::sleep(SHORT);
        deque.put(7).unwrap();
        assert_eq!(consumer.join().unwrap().unwrap(), 7);
    });
}

#[test]
fn poll_timeout_expires() {
    let deque: BlockingDeque<i32> = BlockingDeque::with_capacity(1);

    let start = Instant::now();
    assert_eq!(deque.poll_timed(SHORT).unwrap(), None);
    assert!(start.elapsed() >= SHORT);
}

#[test]
fn offer_timeout_expires_and_returns_item() {
    let deque: BlockingDeque<i32> = BlockingDeque::with_capacity(1);
    deque.offer(1).unwrap();

    match deque.offer_timed(2, SHORT).unwrap_err() {
        PushError::TimedOut(item) => assert_eq!(item, 2),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(deque.len(), 1);
    assert_eq!(deque.remaining_capacity(), Some(0));
}

#[test]
fn close_interrupts_blocked_consumer() {
    let deque: BlockingDeque<i32> = BlockingDeque::with_capacity(1);
    let barrier = Barrier::new(2);

    thread::scope(|s| {
        let consumer = s.spawn(|| {
            barrier.wait();
            deque.take()
        });

        barrier.wait();
        thread::sleep(SHORT);
        deque.close();
        assert_eq!(consumer.join().unwrap(), Err(Interrupted));
    });

    // Closure is an error, distinct from timeout expiry.
    assert_eq!(deque.poll_timed(SHORT), Err(Interrupted));
    assert!(deque.is_closed());
}

#[test]
fn close_interrupts_blocked_producer() {
    let deque: BlockingDeque<i32> = BlockingDeque::with_capacity(1);
    deque.offer(1).unwrap();
    let barrier = Barrier::new(2);

    thread::scope(|s| {
        let producer = s.spawn(|| {
            barrier.wait();
            deque.put(2)
        });

        barrier.wait();
        thread::sleep(SHORT);
        deque.close();
        match producer.join().unwrap().unwrap_err() {
            PushError::Interrupted(item) => assert_eq!(item, 2),
            other => panic!("expected interruption, got {other:?}"),
        }
    });

    // Non-blocking operations keep working on a closed deque.
    assert_eq!(deque.poll(), Some(1));
}

#[test]
fn drain_moves_everything() {
    let deque: BlockingDeque<i32> = BlockingDeque::with_capacity(8);
    for n in 1..=5 {
        deque.offer(n).unwrap();
    }

    let mut dest = Vec::new();
    assert_eq!(deque.drain_to(&mut dest), 5);
    assert_eq!(dest, [1, 2, 3, 4, 5]);
    assert!(deque.is_empty());
    assert_eq!(deque.remaining_capacity(), Some(8));
}

#[test]
fn drain_with_limit() {
    let deque: BlockingDeque<i32> = BlockingDeque::with_capacity(8);
    for n in 1..=5 {
        deque.offer(n).unwrap();
    }

    let mut dest = Vec::new();
    assert_eq!(deque.drain_to_limit(&mut dest, 3), 3);
    assert_eq!(dest, [1, 2, 3]);
    assert_eq!(deque.len(), 2);
    assert_eq!(deque.remaining_capacity(), Some(6));

    // A limit beyond the contents moves what is there.
    assert_eq!(deque.drain_to_limit(&mut dest, 10), 2);
    assert_eq!(dest, [1, 2, 3, 4, 5]);
}

#[test]
fn peek_does_not_consume() {
    let deque: BlockingDeque<i32> = BlockingDeque::with_capacity(4);
    deque.offer(1).unwrap();
    deque.offer(2).unwrap();

    assert_eq!(deque.peek_first(), Some(1));
    assert_eq!(deque.peek_last(), Some(2));
    assert_eq!(deque.len(), 2);
    assert_eq!(deque.element().unwrap(), 1);

    deque.poll().unwrap();
    deque.poll().unwrap();
    assert_eq!(deque.peek(), None);
    assert!(deque.get_first().is_err());
}

#[test]
fn occurrence_removal_keeps_permits_balanced() {
    let deque: BlockingDeque<i32> = BlockingDeque::with_capacity(4);
    for n in [1, 2, 1, 3] {
        deque.offer(n).unwrap();
    }

    assert!(deque.remove_first_occurrence(&1));
    assert_eq!(deque.snapshot(), [2, 1, 3]);
    assert!(deque.remove_last_occurrence(&1));
    assert_eq!(deque.snapshot(), [2, 3]);

    // A miss must hand its speculative permit back.
    assert!(!deque.remove_first_occurrence(&9));
    assert_eq!(deque.len(), 2);
    assert_eq!(deque.remaining_capacity(), Some(2));
}

#[test]
fn permits_match_contents_after_mixed_operations() {
    let deque: BlockingDeque<i32> = BlockingDeque::with_capacity(4);

    deque.offer(1).unwrap();
    deque.offer_first(0).unwrap();
    assert!(deque.offer_timed(2, SHORT).is_ok());
    deque.poll_last();
    deque.peek();
    assert!(!deque.remove_first_occurrence(&99));
    deque.offer(5).unwrap();

    let len = deque.len();
    let free = deque.remaining_capacity().unwrap();
    assert_eq!(len + free, 4);
    assert_eq!(len, deque.snapshot().len());
}

#[test]
fn stack_view() {
    let deque: BlockingDeque<i32> = BlockingDeque::with_capacity(4);
    deque.push(1).unwrap();
    deque.push(2).unwrap();
    deque.push(3).unwrap();

    assert_eq!(deque.pop().unwrap(), 3);
    assert_eq!(deque.pop().unwrap(), 2);
    assert_eq!(deque.pop().unwrap(), 1);
    assert!(deque.pop().is_err());
}

#[test]
fn iteration_is_a_snapshot() {
    let deque: BlockingDeque<i32> = BlockingDeque::with_capacity(8);
    for n in 1..=3 {
        deque.offer(n).unwrap();
    }

    let forward: Vec<i32> = deque.iter().collect();
    let backward: Vec<i32> = deque.iter_descending().collect();
    assert_eq!(forward, [1, 2, 3]);
    assert_eq!(backward, [3, 2, 1]);

    // Iterating does not consume.
    assert_eq!(deque.len(), 3);
}

// Items only need to be Send to cross threads through the deque.
#[test]
fn shares_across_threads_without_sync_items() {
    let deque: Arc<BlockingDeque<Cell<i32>>> = Arc::new(BlockingDeque::with_capacity(2));

    let producer = thread::spawn({
        let deque = deque.clone();
        move || deque.put(Cell::new(7)).unwrap()
    });
    producer.join().unwrap();

    assert_eq!(deque.take().unwrap().get(), 7);
}

#[test]
fn unbounded_never_fills() {
    let deque: BlockingDeque<i32> = BlockingDeque::unbounded(VecDeque::new());
    for n in 0..1000 {
        deque.offer(n).unwrap();
    }

    assert_eq!(deque.len(), 1000);
    assert_eq!(deque.remaining_capacity(), None);
    assert!(deque.offer_timed(1000, SHORT).is_ok());
}

#[test]
fn wraps_a_preloaded_backing() {
    let backing: VecDeque<i32> = [1, 2, 3].into_iter().collect();
    let deque = BlockingDeque::bounded(backing, 5);

    assert_eq!(deque.len(), 3);
    assert_eq!(deque.remaining_capacity(), Some(2));
    assert_eq!(deque.poll(), Some(1));
}

#[test]
#[should_panic(expected = "capacity must be positive")]
fn zero_capacity_panics() {
    let _ = BlockingDeque::<i32>::with_capacity(0);
}

#[test]
#[should_panic(expected = "more than the bound")]
fn overfull_backing_panics() {
    let backing: VecDeque<i32> = (0..10).collect();
    let _ = BlockingDeque::bounded(backing, 5);
}

#[test]
fn priority_backing_orders_removal() {
    let deque = BlockingDeque::bounded(PriorityDeque::new(), 8);
    for n in [5, 1, 4, 2, 3] {
        deque.offer(n).unwrap();
    }

    // The blocking adapter gates capacity; the backing decides order.
    assert_eq!(deque.poll_first(), Some(1));
    assert_eq!(deque.poll_last(), Some(5));
    assert_eq!(deque.snapshot(), [2, 3, 4]);
}

#[test]
fn priority_backing_with_custom_ordering() {
    let deque = BlockingDeque::bounded(
        PriorityDeque::ordered_by(|a: &(i32, &str), b: &(i32, &str)| a.0.cmp(&b.0)),
        4,
    );
    deque.offer((2, "b")).unwrap();
    deque.offer((1, "a")).unwrap();
    deque.offer((3, "c")).unwrap();

    assert_eq!(deque.take_first().unwrap(), (1, "a"));
    assert_eq!(deque.take_first().unwrap(), (2, "b"));
    assert_eq!(deque.take_first().unwrap(), (3, "c"));
}

// A backing that refuses every insertion beyond its own limit, tighter
// than the adapter's bound.
struct Choosy {
    items: VecDeque<i32>,
    limit: usize,
}

impl Backing<i32> for Choosy {
    fn push_front(&mut self, item: i32) -> Result<(), i32> {
        if self.items.len() >= self.limit {
            return Err(item);
        }
        self.items.push_front(item);
        Ok(())
    }

    fn push_back(&mut self, item: i32) -> Result<(), i32> {
        if self.items.len() >= self.limit {
            return Err(item);
        }
        self.items.push_back(item);
        Ok(())
    }

    fn pop_front(&mut self) -> Option<i32> {
        self.items.pop_front()
    }

    fn pop_back(&mut self) -> Option<i32> {
        self.items.pop_back()
    }

    fn front(&self) -> Option<&i32> {
        self.items.front()
    }

    fn back(&self) -> Option<&i32> {
        self.items.back()
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn remove_first_occurrence(&mut self, value: &i32) -> bool {
        Backing::remove_first_occurrence(&mut self.items, value)
    }

    fn remove_last_occurrence(&mut self, value: &i32) -> bool {
        Backing::remove_last_occurrence(&mut self.items, value)
    }

    fn snapshot(&self) -> Vec<i32> {
        self.items.iter().copied().collect()
    }
}

#[test]
fn rejected_insertion_returns_the_permit() {
    let deque = BlockingDeque::bounded(
        Choosy {
            items: VecDeque::new(),
            limit: 1,
        },
        4,
    );
    deque.offer(1).unwrap();

    // The bound still has capacity; the backing itself rejects. The
    // permit taken for the insertion must come back with the item.
    let rejected = deque.offer(2).unwrap_err();
    assert_eq!(rejected.into_inner(), 2);
    assert_eq!(deque.len(), 1);
    assert_eq!(deque.remaining_capacity(), Some(3));

    match deque.put(3).unwrap_err() {
        PushError::Rejected(item) => assert_eq!(item, 3),
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(deque.remaining_capacity(), Some(3));

    match deque.offer_timed(4, SHORT).unwrap_err() {
        PushError::Rejected(item) => assert_eq!(item, 4),
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(deque.len(), 1);
    assert_eq!(deque.remaining_capacity(), Some(3));

    // The accepted element is untouched by the failed attempts.
    assert_eq!(deque.snapshot(), [1]);
}

#[test]
fn priority_backpressure() {
    let deque = BlockingDeque::bounded(PriorityDeque::new(), 2);
    deque.offer(2).unwrap();
    deque.offer(1).unwrap();

    let rejected = deque.offer(0).unwrap_err();
    assert_eq!(rejected.into_inner(), 0);
    assert_eq!(deque.poll_first(), Some(1));
}
