use std::cell::RefCell;
use std::collections::VecDeque;

/// A queue for a single thread. It is not `Sync`, and is used as the reference behaviour the
/// concurrent queues are checked against.
#[derive(Debug)]
pub struct SimpleQueue<T> {
    inner: RefCell<VecDeque<T>>,
}

impl<T> SimpleQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: RefCell::new(VecDeque::new()),
        }
    }

    pub fn enqueue(&self, t: T) {
        self.inner.borrow_mut().push_back(t);
    }

    pub fn dequeue(&self) -> Option<T> {
        self.inner.borrow_mut().pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }
}

impl<T> Default for SimpleQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
