mod semaphore;

pub(crate) use semaphore::{Acquire, Semaphore};
