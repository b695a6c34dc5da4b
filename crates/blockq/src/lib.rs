//! # Blocking FIFO Queue
//!
//! Unbounded multi-producer multi-consumer queue for handing owned values
//! between threads, built on a mutex-guarded linked list and a condition
//! variable.
//!
//! ## Features
//!
//! - **Thread-safe**: any number of producers and consumers share one queue
//! - **Blocking and non-blocking pops**: consumers park efficiently on an
//!   empty queue, or bail out immediately with [`BlockingQueue::try_pop`]
//! - **Timed waits**: [`BlockingQueue::pop_timeout`] bounds how long a
//!   consumer sleeps
//! - **Cooperative shutdown**: [`BlockingQueue::close`] releases every parked
//!   consumer and refuses further pushes, handing the rejected payload back
//! - **Ownership transfer**: values move producer → queue → consumer; the
//!   compiler rules out double-free and use-after-transfer
//!
//! ## Example
//!
//! ```
//! use blockq::BlockingQueue;
//!
//! let q = BlockingQueue::new();
//! q.push("a").unwrap();
//! q.push("b").unwrap();
//! assert_eq!(q.pop(), Ok("a"));
//! assert_eq!(q.pop(), Ok("b"));
//! assert!(q.try_pop().is_err());
//! ```

mod queue;

pub use queue::BlockingQueue;

use thiserror::Error;

/// Error occurring when pushing into a queue is unsuccessful.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum PushError<T> {
    /// The queue has been closed; the rejected value is handed back.
    #[error("queue is closed")]
    Closed(T),
}

impl<T> PushError<T> {
    /// Recovers the value that could not be pushed.
    pub fn into_inner(self) -> T {
        match self {
            PushError::Closed(value) => value,
        }
    }
}

/// Error occurring when popping from a queue is unsuccessful.
#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
pub enum PopError {
    /// The queue is empty and the consumer was released without data.
    #[error("queue is empty")]
    Empty,
    /// The queue has been closed and fully drained.
    #[error("queue is closed")]
    Closed,
    /// The wait deadline passed with no data, wakeup, or close.
    #[error("timed out waiting for an item")]
    Timeout,
}
