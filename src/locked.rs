//! Lock based queues. Both keep their elements in a `VecDeque` behind a single `Mutex`.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::{Error, Result};

/// Every critical section leaves the `VecDeque` consistent, so a panic while holding the lock
/// does not invalidate the data.
fn lock<T>(m: &Mutex<VecDeque<T>>) -> MutexGuard<VecDeque<T>> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A queue where every operation takes the same lock.
#[derive(Debug)]
pub struct LockedQueue<T> {
    inner: Mutex<VecDeque<T>>,
}

impl<T> LockedQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    pub fn enqueue(&self, t: T) {
        lock(&self.inner).push_back(t);
    }

    pub fn dequeue(&self) -> Option<T> {
        lock(&self.inner).pop_front()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.inner).is_empty()
    }
}

impl<T> Default for LockedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A queue where `dequeue` waits for a value to arrive.
#[derive(Debug)]
pub struct BlockingQueue<T> {
    inner: Mutex<VecDeque<T>>,
    available: Condvar,
}

impl<T> BlockingQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    pub fn enqueue(&self, t: T) {
        lock(&self.inner).push_back(t);
        self.available.notify_one();
    }

    /// Remove the front value, blocking until there is one.
    pub fn dequeue(&self) -> T {
        let mut queue = self
            .available
            .wait_while(lock(&self.inner), |q| q.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        match queue.pop_front() {
            Some(t) => t,
            None => unreachable!("woke up to an empty queue"),
        }
    }

    /// Remove the front value, waiting at most `timeout` for one to arrive.
    pub fn dequeue_timeout(&self, timeout: Duration) -> Result<T> {
        let (mut queue, _) = self
            .available
            .wait_timeout_while(lock(&self.inner), timeout, |q| q.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        queue.pop_front().ok_or(Error::Timeout(timeout))
    }

    /// Remove the front value if there is one, without blocking.
    pub fn try_dequeue(&self) -> Option<T> {
        lock(&self.inner).pop_front()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.inner).is_empty()
    }
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::thread;
    use std::time::Instant;

    #[test]
    fn locked_fifo() {
        let q = LockedQueue::new();
        assert_eq!(q.dequeue(), None);
        for i in 0..100 {
            q.enqueue(i);
        }
        for i in 0..100 {
            assert_eq!(q.dequeue(), Some(i));
        }
        assert!(q.is_empty());
    }

    #[test]
    fn blocking_dequeue_waits_for_enqueue() {
        let q = BlockingQueue::new();
        crossbeam::scope(|s| {
            s.spawn(|_| {
                thread::sleep(Duration::from_millis(50));
                q.enqueue(2);
            });
            assert_eq!(q.dequeue(), 2);
        })
        .unwrap();
    }

    #[test]
    fn blocking_dequeue_times_out() {
        let q: BlockingQueue<u32> = BlockingQueue::new();
        let timeout = Duration::from_millis(50);
        let start = Instant::now();
        assert_eq!(q.dequeue_timeout(timeout), Err(Error::Timeout(timeout)));
        assert!(start.elapsed() >= timeout);
    }

    #[test]
    fn blocking_try_dequeue() {
        let q = BlockingQueue::new();
        assert_eq!(q.try_dequeue(), None);
        q.enqueue("a");
        assert!(!q.is_empty());
        assert_eq!(q.dequeue_timeout(Duration::from_secs(1)), Ok("a"));
        assert!(q.is_empty());
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let q = LockedQueue::new();
        q.enqueue(1);
        let _ = crossbeam::scope(|s| {
            s.spawn(|_| {
                let _held = lock(&q.inner);
                panic!("poison the lock");
            });
        });
        assert_eq!(q.dequeue(), Some(1));
    }
}
