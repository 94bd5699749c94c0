#![doc = include_str!("../README.md")]

mod deque;
mod feed;
mod map;
mod parallel;
mod priority;
mod raw;
mod sync;

#[cfg(feature = "serde")]
mod serde_impls;

pub use deque::{Backing, BlockingDeque, Empty, Full, Interrupted, PushError};
pub use feed::{Aborted, Feed, Yielder};
pub use map::{ConcurrentModified, CowHashMap, CowHashMapBuilder, Iter, Keys, Pinned, Values};
pub use parallel::ParallelFor;
pub use priority::{Comparator, FnComparator, Natural, PriorityDeque};
