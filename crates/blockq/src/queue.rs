use std::ptr;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crossbeam_utils::CachePadded;

use crate::{PopError, PushError};

/// One queued entry: an owned value plus the link to its successor.
struct Node<T> {
    value: T,
    next: *mut Node<T>,
}

/// Mutable queue state. Every field is read and written only while the
/// owning [`BlockingQueue`] holds its mutex.
struct State<T> {
    /// First node in the chain, null when empty.
    head: *mut Node<T>,
    /// Last node in the chain, null when empty.
    tail: *mut Node<T>,
    /// Number of queued nodes. `len == 0` iff `head` and `tail` are null.
    len: usize,
    /// Consumers currently parked in a blocking pop.
    waiters: usize,
    /// Outstanding explicit-wakeup grants not yet consumed by a waiter.
    wake_tokens: usize,
    /// Set once by `close`, never cleared.
    closed: bool,
}

impl<T> State<T> {
    fn push_back(&mut self, value: T) {
        let node = Box::into_raw(Box::new(Node {
            value,
            next: ptr::null_mut(),
        }));
        if self.tail.is_null() {
            self.head = node;
        } else {
            unsafe { (*self.tail).next = node };
        }
        self.tail = node;
        self.len += 1;
    }

    fn pop_front(&mut self) -> Option<T> {
        if self.head.is_null() {
            return None;
        }
        // The head pointer came from Box::into_raw in push_back and no other
        // reference to the node exists once it is unlinked.
        let node = unsafe { Box::from_raw(self.head) };
        self.head = node.next;
        if self.head.is_null() {
            self.tail = ptr::null_mut();
        }
        self.len -= 1;
        Some(node.value)
    }
}

impl<T> Drop for State<T> {
    fn drop(&mut self) {
        // Iterative drain: one Box reclaimed per step, so a long queue cannot
        // blow the stack the way a recursive node drop would.
        while self.pop_front().is_some() {}
    }
}

/// Unbounded blocking FIFO queue.
///
/// Values pushed by any thread are popped in push order (the mutex
/// linearizes both sides). Blocking pops park on a condition variable while
/// the queue is empty and are released by a push, an explicit [`wake`], or
/// [`close`].
///
/// The queue itself never inspects or clones payloads; it only moves them.
/// Dropping the queue drains and drops whatever is still queued.
///
/// [`wake`]: BlockingQueue::wake
/// [`close`]: BlockingQueue::close
pub struct BlockingQueue<T> {
    state: CachePadded<Mutex<State<T>>>,
    not_empty: Condvar,
}

// State<T> holds raw pointers into the node chain, but the chain is only
// touched under the mutex and nodes carry owned `T` values.
unsafe impl<T: Send> Send for BlockingQueue<T> {}
unsafe impl<T: Send> Sync for BlockingQueue<T> {}

impl<T> BlockingQueue<T> {
    /// Creates an empty, open queue.
    pub fn new() -> Self {
        Self {
            state: CachePadded::new(Mutex::new(State {
                head: ptr::null_mut(),
                tail: ptr::null_mut(),
                len: 0,
                waiters: 0,
                wake_tokens: 0,
                closed: false,
            })),
            not_empty: Condvar::new(),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().expect("queue mutex poisoned")
    }

    /// Appends `value` at the tail and wakes one parked consumer.
    ///
    /// On a closed queue the value is handed back in
    /// [`PushError::Closed`] so the caller decides what to do with it.
    pub fn push(&self, value: T) -> Result<(), PushError<T>> {
        let mut state = self.lock_state();
        if state.closed {
            return Err(PushError::Closed(value));
        }
        state.push_back(value);
        // One item, one wakeup.
        self.not_empty.notify_one();
        Ok(())
    }

    /// Removes and returns the head value, parking until one is available.
    ///
    /// Distinguishes its wake causes:
    /// - a value arrived → `Ok(value)`
    /// - [`close`] was called and the queue is drained → [`PopError::Closed`]
    /// - [`wake`] released this consumer without data → [`PopError::Empty`]
    ///
    /// [`close`]: BlockingQueue::close
    /// [`wake`]: BlockingQueue::wake
    pub fn pop(&self) -> Result<T, PopError> {
        let mut state = self.lock_state();
        loop {
            if let Some(value) = self.take_front(&mut state) {
                return Ok(value);
            }
            if state.closed {
                return Err(PopError::Closed);
            }
            if state.wake_tokens > 0 {
                state.wake_tokens -= 1;
                return Err(PopError::Empty);
            }
            state.waiters += 1;
            state = self
                .not_empty
                .wait(state)
                .expect("queue condvar wait poisoned");
            state.waiters -= 1;
        }
    }

    /// [`pop`] with a deadline. Returns [`PopError::Timeout`] once `timeout`
    /// has elapsed with no data, wakeup, or close.
    ///
    /// [`pop`]: BlockingQueue::pop
    pub fn pop_timeout(&self, timeout: Duration) -> Result<T, PopError> {
        let start = Instant::now();
        let mut state = self.lock_state();
        loop {
            if let Some(value) = self.take_front(&mut state) {
                return Ok(value);
            }
            if state.closed {
                return Err(PopError::Closed);
            }
            if state.wake_tokens > 0 {
                state.wake_tokens -= 1;
                return Err(PopError::Empty);
            }
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Err(PopError::Timeout);
            }
            state.waiters += 1;
            let (guard, _) = self
                .not_empty
                .wait_timeout(state, timeout - elapsed)
                .expect("queue condvar wait poisoned");
            state = guard;
            state.waiters -= 1;
        }
    }

    /// Non-blocking pop: never parks, never alters state on the empty path.
    pub fn try_pop(&self) -> Result<T, PopError> {
        let mut state = self.lock_state();
        if let Some(value) = self.take_front(&mut state) {
            return Ok(value);
        }
        if state.closed {
            return Err(PopError::Closed);
        }
        Err(PopError::Empty)
    }

    /// Releases one parked consumer without delivering data; it observes
    /// [`PopError::Empty`].
    ///
    /// Like a bare condition-variable signal, a wakeup with nobody parked is
    /// a no-op: it does not make a future pop return early.
    pub fn wake(&self) {
        let mut state = self.lock_state();
        if state.waiters > state.wake_tokens {
            state.wake_tokens += 1;
            self.not_empty.notify_one();
        }
    }

    /// Closes the queue and releases every parked consumer.
    ///
    /// Returns `true` if this call performed the transition. After closing,
    /// pushes fail with the payload handed back, and pops drain the
    /// remaining items before reporting [`PopError::Closed`].
    pub fn close(&self) -> bool {
        let mut state = self.lock_state();
        if state.closed {
            return false;
        }
        state.closed = true;
        self.not_empty.notify_all();
        true
    }

    /// Whether [`close`] has been called.
    ///
    /// [`close`]: BlockingQueue::close
    pub fn is_closed(&self) -> bool {
        self.lock_state().closed
    }

    /// Number of queued items. A snapshot: concurrent pushes and pops may
    /// change it before the caller acts on it.
    pub fn len(&self) -> usize {
        self.lock_state().len
    }

    /// Whether the queue currently holds no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Data path shared by the pop variants: unlink the head and propagate
    /// the wake if more items remain, so a second parked consumer is not
    /// stranded behind a single notify.
    ///
    /// A wake token aimed at this consumer must not outlive it: a racing
    /// push can hand data to the very consumer a [`wake`] targeted, so any
    /// token without a remaining waiter is discarded here, and a token that
    /// still has one is re-notified so it cannot sit on a waiter that
    /// missed the original signal.
    ///
    /// [`wake`]: BlockingQueue::wake
    fn take_front(&self, state: &mut MutexGuard<'_, State<T>>) -> Option<T> {
        let value = state.pop_front()?;
        if state.len > 0 {
            self.not_empty.notify_one();
        }
        if state.wake_tokens > state.waiters {
            state.wake_tokens = state.waiters;
        } else if state.wake_tokens > 0 {
            self.not_empty.notify_one();
        }
        Some(value)
    }
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
