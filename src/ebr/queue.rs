//! A Michael-Scott Queue.

use std::mem::MaybeUninit;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};

use crossbeam::epoch::{self, Atomic, Owned, Shared};
use crossbeam::utils::{Backoff, CachePadded};
use log::debug;

#[derive(Debug)]
pub struct Queue<T> {
    head: CachePadded<Atomic<Node<T>>>,
    tail: CachePadded<Atomic<Node<T>>>,
}

#[derive(Debug)]
struct Node<T> {
    /// Uninitialized for the sentinel node, and moved out by whoever dequeues it.
    data: MaybeUninit<T>,
    next: Atomic<Node<T>>,
}

// Values only ever move through the queue, they are never shared.
unsafe impl<T: Send> Send for Queue<T> {}
unsafe impl<T: Send> Sync for Queue<T> {}

impl<T> Node<T> {
    fn new(data: T) -> Self {
        Self {
            data: MaybeUninit::new(data),
            next: Atomic::null(),
        }
    }

    fn sentinel() -> Self {
        Self {
            data: MaybeUninit::uninit(),
            next: Atomic::null(),
        }
    }
}

impl<T> Queue<T> {
    pub fn new() -> Self {
        let q = Queue {
            head: CachePadded::new(Atomic::null()),
            tail: CachePadded::new(Atomic::null()),
        };
        unsafe {
            // Nobody else can see the queue yet.
            let guard = epoch::unprotected();
            let sentinel = Owned::new(Node::sentinel()).into_shared(guard);
            q.head.store(sentinel, Relaxed);
            q.tail.store(sentinel, Relaxed);
        }
        q
    }

    pub fn enqueue(&self, t: T) {
        let backoff = Backoff::new();
        let guard = &epoch::pin();
        let new_node = Owned::new(Node::new(t)).into_shared(guard);
        loop {
            let tail = self.tail.load(Acquire, guard);
            let t = unsafe { tail.deref() };
            let next = t.next.load(Acquire, guard);
            if !next.is_null() {
                // tail wasn't tail after all.
                // We try to help out by moving the tail pointer
                // on queue to the real tail we've seen, which is `next`.
                let _ = self.tail.compare_exchange(tail, next, Release, Relaxed, guard);
                continue;
            }
            if t.next
                .compare_exchange(Shared::null(), new_node, Release, Relaxed, guard)
                .is_ok()
            {
                // the CAS succeeded, and the new node is linked into the list.
                // Update `queue.tail`. If we fail here it's OK, since another
                // thread could have helped by moving the tail pointer.
                let _ = self.tail.compare_exchange(tail, new_node, Release, Relaxed, guard);
                return;
            }
            backoff.spin();
        }
    }

    pub fn dequeue(&self) -> Option<T> {
        let backoff = Backoff::new();
        let guard = &epoch::pin();
        loop {
            let head = self.head.load(Acquire, guard);
            let h = unsafe { head.deref() };
            let next = h.next.load(Acquire, guard);
            let node = unsafe { next.as_ref() }?;

            let tail = self.tail.load(Acquire, guard);
            if head == tail {
                // An enqueue linked `next` but has not swung the tail yet. Do it for them, so
                // that the tail never points to a node behind the head.
                let _ = self.tail.compare_exchange(tail, next, Release, Relaxed, guard);
                continue;
            }

            if self
                .head
                .compare_exchange(head, next, Release, Relaxed, guard)
                .is_ok()
            {
                // NOTE: the data we return lives on `next`, which is the new sentinel node.
                // The old sentinel `head` is no longer reachable from the queue.
                //
                //  HEAD ----------.
                //                 V
                //     [  xx ]-->[ 93 ]-->[  5 ]--|        returns 93
                //
                // Only the thread winning the CAS reads the data, and it is never read
                // again, since `next` is a sentinel from now on.
                unsafe {
                    guard.defer_destroy(head);
                    return Some(node.data.assume_init_read());
                }
            }
            backoff.spin();
        }
    }

    /// Returns `true` if the queue is empty. This is only a snapshot.
    pub fn is_empty(&self) -> bool {
        let guard = &epoch::pin();
        let head = self.head.load(Acquire, guard);
        let h = unsafe { head.deref() };
        h.next.load(Acquire, guard).is_null()
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Queue<T> {
    fn drop(&mut self) {
        let mut remaining = 0;
        unsafe {
            let guard = epoch::unprotected();
            // The first node is the sentinel, whose data is not initialized.
            let sentinel = self.head.load(Relaxed, guard).into_owned();
            let mut curr = sentinel.next.load(Relaxed, guard);
            drop(sentinel);
            while !curr.is_null() {
                let mut node = curr.into_owned();
                node.data.assume_init_drop();
                curr = node.next.load(Relaxed, guard);
                remaining += 1;
            }
        }
        debug!("dropped queue with {} values left", remaining);
    }
}
