//! Lock-free collections built on CAS: a sorted key/value list and a Michael-Scott queue, both
//! using epoch based reclamation. Lock based and single threaded queues implementing the same
//! `Queue` contract are included for comparison.

#[cfg(test)]
#[macro_use]
extern crate lazy_static;

pub mod ebr;
pub mod error;
pub mod locked;
pub mod ring;
pub mod seq;

pub use crate::ebr::list::{SortedList, SortedSet};
pub use crate::error::{Error, Result};

/// The contract shared by all unbounded queues.
pub trait Queue<T> {
    /// Append `t` to the back of the queue. Returns `true` if the value was accepted.
    fn enqueue(&self, t: T) -> bool;
    /// Remove the value at the front of the queue, or `None` if the queue is empty.
    fn dequeue(&self) -> Option<T>;
    /// A snapshot, which may be stale as soon as it is returned.
    fn is_empty(&self) -> bool;
}

impl<T> Queue<T> for ebr::queue::Queue<T> {
    fn enqueue(&self, t: T) -> bool {
        ebr::queue::Queue::enqueue(self, t);
        true
    }
    fn dequeue(&self) -> Option<T> {
        ebr::queue::Queue::dequeue(self)
    }
    fn is_empty(&self) -> bool {
        ebr::queue::Queue::is_empty(self)
    }
}

impl<T> Queue<T> for locked::LockedQueue<T> {
    fn enqueue(&self, t: T) -> bool {
        locked::LockedQueue::enqueue(self, t);
        true
    }
    fn dequeue(&self) -> Option<T> {
        locked::LockedQueue::dequeue(self)
    }
    fn is_empty(&self) -> bool {
        locked::LockedQueue::is_empty(self)
    }
}

/// `dequeue` blocks until a value arrives, so it never returns `None`.
impl<T> Queue<T> for locked::BlockingQueue<T> {
    fn enqueue(&self, t: T) -> bool {
        locked::BlockingQueue::enqueue(self, t);
        true
    }
    fn dequeue(&self) -> Option<T> {
        Some(locked::BlockingQueue::dequeue(self))
    }
    fn is_empty(&self) -> bool {
        locked::BlockingQueue::is_empty(self)
    }
}

impl<T> Queue<T> for seq::SimpleQueue<T> {
    fn enqueue(&self, t: T) -> bool {
        seq::SimpleQueue::enqueue(self, t);
        true
    }
    fn dequeue(&self) -> Option<T> {
        seq::SimpleQueue::dequeue(self)
    }
    fn is_empty(&self) -> bool {
        seq::SimpleQueue::is_empty(self)
    }
}
