use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// The outcome of a blocking or timed permit acquisition.
///
/// Timeout expiry and cancellation are distinct outcomes: a caller that
/// timed out may retry, while a cancelled wait means the semaphore was
/// closed and will never hand out permits to a blocking acquire again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Acquire {
    Acquired,
    TimedOut,
    Cancelled,
}

/// A counting semaphore.
///
/// Holds a non-negative permit count. Acquiring takes a permit, blocking
/// or failing when none are available; releasing adds permits and wakes
/// waiters. `close` permanently cancels all current and future blocking
/// acquires while leaving the non-blocking operations functional.
pub(crate) struct Semaphore {
    state: Mutex<State>,
    available: Condvar,
}

struct State {
    permits: usize,
    closed: bool,
}

impl Semaphore {
    pub(crate) fn new(permits: usize) -> Semaphore {
        Semaphore {
            state: Mutex::new(State {
                permits,
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Takes a permit if one is immediately available.
    pub(crate) fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.permits > 0 {
            state.permits -= 1;
            true
        } else {
            false
        }
    }

    /// Blocks until a permit is available. Returns `Cancelled` if the
    /// semaphore is, or becomes, closed.
    pub(crate) fn acquire(&self) -> Acquire {
        let mut state = self.state.lock().unwrap();
        loop {
            if state.closed {
                return Acquire::Cancelled;
            }
            if state.permits > 0 {
                state.permits -= 1;
                return Acquire::Acquired;
            }
            state = self.available.wait(state).unwrap();
        }
    }

    /// Blocks until a permit is available or the deadline passes.
    ///
    /// The deadline is computed up front, so spurious wakeups never extend
    /// the wait.
    pub(crate) fn acquire_timeout(&self, timeout: Duration) -> Acquire {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().unwrap();
        loop {
            if state.closed {
                return Acquire::Cancelled;
            }
            if state.permits > 0 {
                state.permits -= 1;
                return Acquire::Acquired;
            }

            let now = Instant::now();
            if now >= deadline {
                return Acquire::TimedOut;
            }
            (state, _) = self.available.wait_timeout(state, deadline - now).unwrap();
        }
    }

    pub(crate) fn release(&self, permits: usize) {
        if permits == 0 {
            return;
        }
        let mut state = self.state.lock().unwrap();
        state.permits += permits;
        drop(state);
        self.available.notify_all();
    }

    pub(crate) fn permits(&self) -> usize {
        self.state.lock().unwrap().permits
    }

    /// Takes all currently available permits.
    pub(crate) fn drain(&self) -> usize {
        let mut state = self.state.lock().unwrap();
        std::mem::take(&mut state.permits)
    }

    /// Cancels all blocked and future blocking acquires.
    pub(crate) fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        drop(state);
        self.available.notify_all();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }
}
