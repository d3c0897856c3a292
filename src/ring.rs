//! A bounded single-producer single-consumer ring buffer.
//!
//! The two halves each own one of the positions, and only ever read the other one. This is only
//! correct with exactly one producer and one consumer, so the halves can be sent to another
//! thread but neither cloned nor shared.

use std::cell::{Cell, UnsafeCell};
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};
use std::sync::Arc;

use crossbeam::utils::{Backoff, CachePadded};

use crate::error::{Error, Result};

/// Positions run over `0..2 * capacity`, so that a full buffer can be told apart from an empty
/// one without giving up a slot.
struct Ring<T> {
    buffer: Box<[UnsafeCell<MaybeUninit<T>>]>,
    /// Next position to read. Only written by the consumer.
    head: CachePadded<AtomicUsize>,
    /// Next position to write. Only written by the producer.
    tail: CachePadded<AtomicUsize>,
}

unsafe impl<T: Send> Send for Ring<T> {}
unsafe impl<T: Send> Sync for Ring<T> {}

impl<T> Ring<T> {
    fn capacity(&self) -> usize {
        self.buffer.len()
    }

    fn advance(&self, pos: usize) -> usize {
        if pos + 1 == 2 * self.capacity() {
            0
        } else {
            pos + 1
        }
    }

    fn len(&self, head: usize, tail: usize) -> usize {
        if tail >= head {
            tail - head
        } else {
            tail + 2 * self.capacity() - head
        }
    }

    fn slot(&self, pos: usize) -> *mut MaybeUninit<T> {
        self.buffer[pos % self.capacity()].get()
    }
}

impl<T> Drop for Ring<T> {
    fn drop(&mut self) {
        let mut head = *self.head.get_mut();
        let tail = *self.tail.get_mut();
        while head != tail {
            unsafe { (*self.slot(head)).assume_init_drop() };
            head = self.advance(head);
        }
    }
}

/// Create a ring buffer holding at most `capacity` values.
pub fn channel<T>(capacity: usize) -> Result<(Producer<T>, Consumer<T>)> {
    if capacity == 0 {
        return Err(Error::ZeroCapacity);
    }
    let buffer = (0..capacity)
        .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
        .collect();
    let ring = Arc::new(Ring {
        buffer,
        head: CachePadded::new(AtomicUsize::new(0)),
        tail: CachePadded::new(AtomicUsize::new(0)),
    });
    let producer = Producer {
        ring: ring.clone(),
        _not_sync: PhantomData,
    };
    let consumer = Consumer {
        ring,
        _not_sync: PhantomData,
    };
    Ok((producer, consumer))
}

/// The writing half of a ring buffer.
pub struct Producer<T> {
    ring: Arc<Ring<T>>,
    _not_sync: PhantomData<Cell<()>>,
}

impl<T> Producer<T> {
    /// Append `t`, or hand it back if the buffer is full.
    pub fn try_enqueue(&self, t: T) -> ::std::result::Result<(), T> {
        let ring = &*self.ring;
        let tail = ring.tail.load(Relaxed);
        let head = ring.head.load(Acquire);
        if ring.len(head, tail) == ring.capacity() {
            return Err(t);
        }
        unsafe { (*ring.slot(tail)).write(t) };
        ring.tail.store(ring.advance(tail), Release);
        Ok(())
    }

    /// Append `t`, spinning while the buffer is full.
    pub fn enqueue(&self, mut t: T) {
        let backoff = Backoff::new();
        while let Err(back) = self.try_enqueue(t) {
            t = back;
            backoff.snooze();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ring.head.load(Acquire) == self.ring.tail.load(Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

/// The reading half of a ring buffer.
pub struct Consumer<T> {
    ring: Arc<Ring<T>>,
    _not_sync: PhantomData<Cell<()>>,
}

impl<T> Consumer<T> {
    /// Remove the front value, if there is one.
    pub fn try_dequeue(&self) -> Option<T> {
        let ring = &*self.ring;
        let head = ring.head.load(Relaxed);
        let tail = ring.tail.load(Acquire);
        if head == tail {
            return None;
        }
        let t = unsafe { (*ring.slot(head)).assume_init_read() };
        ring.head.store(ring.advance(head), Release);
        Some(t)
    }

    /// Remove the front value, spinning while the buffer is empty.
    pub fn dequeue(&self) -> T {
        let backoff = Backoff::new();
        loop {
            if let Some(t) = self.try_dequeue() {
                return t;
            }
            backoff.snooze();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ring.head.load(Relaxed) == self.ring.tail.load(Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::sync::atomic::Ordering;

    #[test]
    fn zero_capacity() {
        assert_eq!(channel::<u32>(0).err(), Some(Error::ZeroCapacity));
    }

    #[test]
    fn full_and_empty() {
        let (tx, rx) = channel(3).unwrap();
        assert!(tx.is_empty());
        assert_eq!(rx.try_dequeue(), None);
        for i in 0..3 {
            assert_eq!(tx.try_enqueue(i), Ok(()));
        }
        assert_eq!(tx.try_enqueue(3), Err(3));
        assert_eq!(rx.try_dequeue(), Some(0));
        assert_eq!(tx.try_enqueue(3), Ok(()));
        for i in 1..4 {
            assert_eq!(rx.dequeue(), i);
        }
        assert!(rx.is_empty());
    }

    #[test]
    fn wraps_around() {
        let (tx, rx) = channel(4).unwrap();
        for i in 0..1000 {
            tx.enqueue(i);
            tx.enqueue(i + 1);
            assert_eq!(rx.dequeue(), i);
            assert_eq!(rx.dequeue(), i + 1);
        }
        assert_eq!(tx.capacity(), 4);
    }

    #[test]
    fn spsc_keeps_order() {
        const N: usize = 100_000;
        let (tx, rx) = channel(64).unwrap();
        crossbeam::scope(|s| {
            s.spawn(move |_| {
                for i in 0..N {
                    tx.enqueue(i);
                }
            });
            s.spawn(move |_| {
                for i in 0..N {
                    assert_eq!(rx.dequeue(), i);
                }
                assert!(rx.is_empty());
            });
        })
        .unwrap();
    }

    lazy_static! {
        static ref DROPPED: AtomicUsize = AtomicUsize::new(0);
    }

    struct Counted;
    impl Drop for Counted {
        fn drop(&mut self) {
            DROPPED.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn drop_frees_values_left() {
        let (tx, rx) = channel(8).unwrap();
        for _ in 0..5 {
            tx.enqueue(Counted);
        }
        drop(rx.dequeue());
        drop(tx);
        drop(rx);
        assert_eq!(DROPPED.load(Ordering::SeqCst), 5);
    }
}
