use crate::deque::Backing;

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt;

/// An ordering over elements of type `T`.
pub trait Comparator<T> {
    fn compare(&self, a: &T, b: &T) -> Ordering;
}

/// The natural [`Ord`]-derived ordering.
#[derive(Clone, Copy, Debug, Default)]
pub struct Natural;

impl<T: Ord> Comparator<T> for Natural {
    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }
}

/// Adapts a closure into a [`Comparator`].
#[derive(Clone, Copy, Debug)]
pub struct FnComparator<F>(pub F);

impl<T, F> Comparator<T> for FnComparator<F>
where
    F: Fn(&T, &T) -> Ordering,
{
    fn compare(&self, a: &T, b: &T) -> Ordering {
        (self.0)(a, b)
    }
}

/// A comparator-ordered double-ended container.
///
/// The minimum sits at the front and the maximum at the back; equal
/// elements keep their insertion order. Both ends are reachable, which is
/// what lets this plug into a [`BlockingDeque`](crate::BlockingDeque) as
/// the backing container:
///
/// ```
/// use tandem::{BlockingDeque, PriorityDeque};
///
/// let deque = BlockingDeque::bounded(PriorityDeque::new(), 8);
/// deque.offer_last(3).unwrap();
/// deque.offer_last(1).unwrap();
/// deque.offer_last(2).unwrap();
///
/// // Removal order follows the comparator, not arrival.
/// assert_eq!(deque.poll_first(), Some(1));
/// assert_eq!(deque.poll_last(), Some(3));
/// ```
pub struct PriorityDeque<T, C = Natural> {
    items: VecDeque<T>,
    cmp: C,
}

impl<T: Ord> PriorityDeque<T> {
    /// An empty deque with the natural ordering.
    pub fn new() -> PriorityDeque<T> {
        PriorityDeque::with_comparator(Natural)
    }
}

impl<T> PriorityDeque<T, Natural> {
    /// An empty deque ordered by the given closure.
    pub fn ordered_by<F>(cmp: F) -> PriorityDeque<T, FnComparator<F>>
    where
        F: Fn(&T, &T) -> Ordering,
    {
        PriorityDeque::with_comparator(FnComparator(cmp))
    }
}

impl<T, C: Comparator<T>> PriorityDeque<T, C> {
    /// An empty deque ordered by the given [`Comparator`].
    pub fn with_comparator(cmp: C) -> PriorityDeque<T, C> {
        PriorityDeque {
            items: VecDeque::new(),
            cmp,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Inserts in comparator order, after any equal elements.
    pub fn insert(&mut self, item: T) {
        let at = self
            .items
            .partition_point(|x| self.cmp.compare(x, &item) != Ordering::Greater);
        self.items.insert(at, item);
    }

    /// Removes the minimum element.
    pub fn pop_min(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Removes the maximum element.
    pub fn pop_max(&mut self) -> Option<T> {
        self.items.pop_back()
    }

    pub fn peek_min(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn peek_max(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T: Ord> Default for PriorityDeque<T> {
    fn default() -> Self {
        PriorityDeque::new()
    }
}

impl<T: fmt::Debug, C> fmt::Debug for PriorityDeque<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

impl<T: Ord> FromIterator<T> for PriorityDeque<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut deque = PriorityDeque::new();
        for item in iter {
            deque.insert(item);
        }
        deque
    }
}

/// Insertion at either end places the element by comparator order, like
/// the Deque face of a priority queue: the position an element lands in
/// is decided by the ordering, never by which end it was offered to.
impl<T, C: Comparator<T>> Backing<T> for PriorityDeque<T, C> {
    fn push_front(&mut self, item: T) -> Result<(), T> {
        self.insert(item);
        Ok(())
    }

    fn push_back(&mut self, item: T) -> Result<(), T> {
        self.insert(item);
        Ok(())
    }

    fn pop_front(&mut self) -> Option<T> {
        self.pop_min()
    }

    fn pop_back(&mut self) -> Option<T> {
        self.pop_max()
    }

    fn front(&self) -> Option<&T> {
        self.peek_min()
    }

    fn back(&self) -> Option<&T> {
        self.peek_max()
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn remove_first_occurrence(&mut self, value: &T) -> bool
    where
        T: PartialEq,
    {
        match self.items.iter().position(|x| x == value) {
            Some(i) => {
                self.items.remove(i);
                true
            }
            None => false,
        }
    }

    fn remove_last_occurrence(&mut self, value: &T) -> bool
    where
        T: PartialEq,
    {
        match self.items.iter().rposition(|x| x == value) {
            Some(i) => {
                self.items.remove(i);
                true
            }
            None => false,
        }
    }

    fn snapshot(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.items.iter().cloned().collect()
    }
}
