use crate::deque::BlockingDeque;

use std::collections::VecDeque;
use std::panic;
use std::sync::Mutex;
use std::thread;

/// A parallel for-each runner.
///
/// Executes one step per element across a pool of worker threads and
/// waits for all of them. If steps fail, the failure of the earliest
/// element in iteration order is reported and the rest are dropped; a
/// panicking step propagates its panic after every worker has finished.
///
/// ```
/// use tandem::ParallelFor;
///
/// let doubled: std::sync::Mutex<Vec<i32>> = Default::default();
/// ParallelFor::new()
///     .run(1..=100, |n| {
///         doubled.lock().unwrap().push(n * 2);
///         Ok::<(), ()>(())
///     })
///     .unwrap();
/// assert_eq!(doubled.lock().unwrap().len(), 100);
/// ```
pub struct ParallelFor {
    /// Worker count; `None` runs one worker per element.
    threads: Option<usize>,
}

impl ParallelFor {
    /// One worker per available CPU core.
    pub fn new() -> ParallelFor {
        let cores = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        ParallelFor {
            threads: Some(cores),
        }
    }

    /// One worker per element, all running at once.
    pub fn unlimited() -> ParallelFor {
        ParallelFor { threads: None }
    }

    /// A fixed number of workers.
    ///
    /// # Panics
    ///
    /// Panics if `threads` is zero.
    pub fn with_threads(threads: usize) -> ParallelFor {
        assert!(threads > 0, "must use at least one thread");
        ParallelFor {
            threads: Some(threads),
        }
    }

    /// Runs `step` on every element, returning the first failure in
    /// iteration order.
    pub fn run<T, E, F>(&self, items: impl IntoIterator<Item = T>, step: F) -> Result<(), E>
    where
        T: Send,
        E: Send,
        F: Fn(T) -> Result<(), E> + Sync,
    {
        let items: Vec<T> = items.into_iter().collect();
        if items.is_empty() {
            return Ok(());
        }

        match self.threads {
            None => run_unlimited(items, &step),
            Some(threads) => run_pooled(items, threads, &step),
        }
    }
}

impl Default for ParallelFor {
    fn default() -> Self {
        ParallelFor::new()
    }
}

fn run_unlimited<T, E, F>(items: Vec<T>, step: &F) -> Result<(), E>
where
    T: Send,
    E: Send,
    F: Fn(T) -> Result<(), E> + Sync,
{
    thread::scope(|scope| {
        let workers: Vec<_> = items
            .into_iter()
            .map(|item| scope.spawn(move || step(item)))
            .collect();

        let mut first = Ok(());
        for worker in workers {
            match worker.join() {
                Err(payload) => panic::resume_unwind(payload),
                Ok(Err(e)) if first.is_ok() => first = Err(e),
                Ok(_) => {}
            }
        }
        first
    })
}

fn run_pooled<T, E, F>(items: Vec<T>, threads: usize, step: &F) -> Result<(), E>
where
    T: Send,
    E: Send,
    F: Fn(T) -> Result<(), E> + Sync,
{
    let workers = threads.min(items.len());

    // Elements are tagged with their position so the earliest failure can
    // be picked out after the pool drains the queue.
    let work: BlockingDeque<(usize, T)> = BlockingDeque::unbounded(VecDeque::new());
    for tagged in items.into_iter().enumerate() {
        // Unbounded insertion cannot be rejected.
        let _ = work.offer_last(tagged);
    }

    let failures: Mutex<Vec<(usize, E)>> = Mutex::new(Vec::new());
    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| {
                while let Some((at, item)) = work.poll_first() {
                    if let Err(e) = step(item) {
                        failures.lock().unwrap().push((at, e));
                    }
                }
            });
        }
    });

    let mut failures = failures.into_inner().unwrap();
    failures.sort_unstable_by_key(|&(at, _)| at);
    match failures.into_iter().next() {
        Some((_, e)) => Err(e),
        None => Ok(()),
    }
}
