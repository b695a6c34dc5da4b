//! Tests for the shutdown protocol: close draining, wakeups without data,
//! and releasing parked consumers.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use blockq::{BlockingQueue, PopError, PushError};

#[test]
fn close_drains_before_reporting_closed() {
    let q = BlockingQueue::new();

    q.push(42u64).unwrap();
    q.push(43).unwrap();

    assert!(!q.is_closed());
    q.close();
    assert!(q.is_closed());

    // Cannot push after closing; the value comes back.
    assert!(matches!(q.push(44), Err(PushError::Closed(44))));

    // Existing items still drain in order.
    assert_eq!(q.pop(), Ok(42));
    assert_eq!(q.pop(), Ok(43));

    // Drained and closed: every pop variant reports Closed, none block.
    assert_eq!(q.try_pop(), Err(PopError::Closed));
    assert_eq!(q.pop(), Err(PopError::Closed));
    assert_eq!(q.pop_timeout(Duration::from_secs(5)), Err(PopError::Closed));
}

#[test]
fn close_releases_all_parked_consumers() {
    const NUM_CONSUMERS: usize = 3;

    let queue = Arc::new(BlockingQueue::<u64>::new());

    let consumers: Vec<_> = (0..NUM_CONSUMERS)
        .map(|_| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop())
        })
        .collect();

    // Give the consumers time to park, then shut down.
    thread::sleep(Duration::from_millis(100));
    assert!(queue.close());

    for consumer in consumers {
        assert_eq!(consumer.join().unwrap(), Err(PopError::Closed));
    }
}

#[test]
fn wake_releases_parked_consumer_without_data() {
    let queue = Arc::new(BlockingQueue::<u64>::new());
    let consumer_queue = Arc::clone(&queue);

    let consumer = thread::spawn(move || consumer_queue.pop());

    // Keep signalling until the consumer has been released; a wake issued
    // before it parks is deliberately a no-op.
    while !consumer.is_finished() {
        queue.wake();
        thread::sleep(Duration::from_millis(10));
    }

    assert_eq!(consumer.join().unwrap(), Err(PopError::Empty));
    // The queue survives the wakeup untouched.
    assert!(!queue.is_closed());
    assert_eq!(queue.len(), 0);
    queue.push(5).unwrap();
    assert_eq!(queue.pop(), Ok(5));
}

#[test]
fn wake_targets_one_consumer() {
    let queue = Arc::new(BlockingQueue::<u64>::new());

    let woken = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.pop())
    };
    let fed = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.pop())
    };

    // Let both consumers park, then signal exactly once.
    thread::sleep(Duration::from_millis(150));
    queue.wake();

    let deadline = Instant::now() + Duration::from_secs(10);
    while !(woken.is_finished() || fed.is_finished()) {
        assert!(Instant::now() < deadline, "wake released no consumer");
        thread::sleep(Duration::from_millis(10));
    }

    // Exactly one consumer is released empty-handed; the other still gets
    // real data.
    queue.push(11).unwrap();
    let results = [woken.join().unwrap(), fed.join().unwrap()];
    assert!(results.contains(&Err(PopError::Empty)));
    assert!(results.contains(&Ok(11)));
}

#[test]
fn wake_grant_dies_with_data_delivery() {
    // A push can race a wake and hand real data to the very consumer the
    // wake targeted. The wake grant must be retired along with that
    // consumer; it must not linger and cut a later blocking pop short.
    for _ in 0..10 {
        let queue = Arc::new(BlockingQueue::<u64>::new());
        let consumer_queue = Arc::clone(&queue);
        let consumer = thread::spawn(move || consumer_queue.pop());

        thread::sleep(Duration::from_millis(10));
        queue.wake();
        queue.push(1).unwrap();

        match consumer.join().unwrap() {
            // Data won the race; the banked grant had no waiter left.
            Ok(1) => {}
            // The wakeup won; the pushed item is still queued.
            Err(PopError::Empty) => assert_eq!(queue.try_pop(), Ok(1)),
            other => panic!("unexpected pop result: {other:?}"),
        }

        // Either way the queue is empty, open, and holds no leftover
        // grant: a timed pop must wait out its deadline.
        assert_eq!(
            queue.pop_timeout(Duration::from_millis(50)),
            Err(PopError::Timeout)
        );
    }
}

#[test]
fn pop_timeout_expires_on_open_queue() {
    let q = BlockingQueue::<u64>::new();
    assert_eq!(
        q.pop_timeout(Duration::from_millis(50)),
        Err(PopError::Timeout)
    );
    // Timing out is not a state change.
    assert!(!q.is_closed());
    assert!(q.is_empty());
}

#[test]
fn push_race_with_close_never_strands_items() {
    let queue = Arc::new(BlockingQueue::new());
    let producer_queue = Arc::clone(&queue);

    let producer = thread::spawn(move || {
        let mut accepted = 0u64;
        for i in 0..100_000u64 {
            match producer_queue.push(i) {
                Ok(()) => accepted += 1,
                Err(PushError::Closed(_)) => break,
            }
        }
        accepted
    });

    thread::sleep(Duration::from_millis(5));
    queue.close();

    let accepted = producer.join().unwrap();

    let mut drained = 0u64;
    while queue.pop() != Err(PopError::Closed) {
        drained += 1;
    }
    assert_eq!(drained, accepted);
}
