//! A sorted lock-free linked list, in the style of Harris and Michael.
//!
//! Removal happens in two steps. First the payload slot of the node is cleared with a CAS, which
//! is the point where the entry stops being visible. Then the node is unlinked: its `next`
//! pointer is tagged, which freezes it so that no insertion can land behind a node that is on
//! its way out, and the predecessor link is swung past it. Any thread that walks into a cleared
//! node finishes the second step on behalf of the remover.
//!
//!```text
//!  head ──► [3|a] ──► [5|∅] ──► [8|c] ──► null      5 is cleared
//!  head ──► [3|a] ──► [5|∅] ─╳► [8|c] ──► null      5.next is tagged
//!  head ──► [3|a] ────────────► [8|c] ──► null      3.next is swung past 5
//!```

use std::fmt;
use std::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed, Release};

use crossbeam::epoch::{self, Atomic, Guard, Owned, Shared};
use log::{debug, trace};

/// Tag on a node's `next` pointer, meaning "this node is deleted, and its successor is frozen".
const DELETED: usize = 1;

struct Node<K, V> {
    key: K,
    /// Null once the entry is removed.
    value: Atomic<V>,
    next: Atomic<Node<K, V>>,
}

/// What a node's payload slot holds.
#[derive(Debug, PartialEq, Eq)]
enum Payload<'g, V> {
    Live(&'g V),
    Deleted,
}

impl<K, V> Node<K, V> {
    fn new(key: K, value: V) -> Self {
        Self {
            key,
            value: Atomic::new(value),
            next: Atomic::null(),
        }
    }

    fn payload<'g>(&self, guard: &'g Guard) -> Payload<'g, V> {
        match unsafe { self.value.load(Acquire, guard).as_ref() } {
            Some(value) => Payload::Live(value),
            None => Payload::Deleted,
        }
    }

    fn is_deleted(&self, guard: &Guard) -> bool {
        self.value.load(Acquire, guard).is_null()
    }

    /// Tag the `next` pointer, and return the successor it is frozen at. The payload must
    /// already be cleared.
    fn mark<'g>(&self, guard: &'g Guard) -> Shared<'g, Node<K, V>> {
        let mut next = self.next.load(Acquire, guard);
        while next.tag() != DELETED {
            match self
                .next
                .compare_exchange(next, next.with_tag(DELETED), AcqRel, Acquire, guard)
            {
                Ok(_) => break,
                // An insertion got in behind us; freeze at the new successor instead.
                Err(e) => next = e.current,
            }
        }
        next.with_tag(0)
    }
}

impl<K: fmt::Debug, V> fmt::Debug for Node<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Node")
            .field("key", &self.key)
            .field("value", &self.value)
            .field("next", &self.next)
            .finish()
    }
}

/// A sorted list of key/value entries.
///
/// Entries with equal keys are not merged: a new entry is linked in front of the older ones, so
/// lookups see the most recent live value for a key.
///
/// Removed entries are freed once no pinned thread can still see them, which may be after the
/// list itself is gone. Keys and values therefore can not borrow anything shorter lived:
///
///```compile_fail
/// use lfcollections::SortedList;
///
/// let counter = std::sync::atomic::AtomicUsize::new(0);
/// let list = SortedList::new();
/// list.insert(1, &counter);
///```
pub struct SortedList<K, V> {
    head: Atomic<Node<K, V>>,
}

/// A sorted list used as a set.
pub type SortedSet<K> = SortedList<K, ()>;

impl<K, V> SortedList<K, V>
where
    K: 'static,
    V: 'static,
{
    pub fn new() -> Self {
        Self { head: Atomic::null() }
    }
}

impl<K, V> Default for SortedList<K, V>
where
    K: 'static,
    V: 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> SortedList<K, V>
where
    K: Ord + 'static,
    V: 'static,
{
    /// Find the link leading to the first node with a key not smaller than `key`, and that
    /// node (null if there is none). Nothing is modified, and keys never change, so a stale
    /// read only means that the returned position is further back than it could have been.
    fn find_predecessor<'g>(
        &'g self,
        key: &K,
        guard: &'g Guard,
    ) -> (&'g Atomic<Node<K, V>>, Shared<'g, Node<K, V>>) {
        let mut prev = &self.head;
        let mut curr = prev.load(Acquire, guard).with_tag(0);
        while let Some(node) = unsafe { curr.as_ref() } {
            if node.key >= *key {
                break;
            }
            prev = &node.next;
            curr = node.next.load(Acquire, guard).with_tag(0);
        }
        (prev, curr)
    }

    /// Finish the removal of `curr`, whose payload is already cleared, by unlinking it from
    /// behind `prev`. Returns `true` if this call did the unlink.
    ///
    /// The unlink CAS expects an untagged `prev`, so it can only succeed on the one live link
    /// to `curr`, and only one thread ever gets to retire the node.
    fn help_unlink<'g>(
        &self,
        prev: &'g Atomic<Node<K, V>>,
        curr: Shared<'g, Node<K, V>>,
        guard: &'g Guard,
    ) -> bool {
        let node = unsafe { curr.deref() };
        let succ = node.mark(guard);
        match prev.compare_exchange(curr, succ, AcqRel, Acquire, guard) {
            Ok(_) => {
                unsafe { guard.defer_destroy(curr) };
                true
            }
            Err(_) => false,
        }
    }

    /// Unlink every cleared node with a key up to and including `bound`.
    fn help_scan(&self, bound: &K, guard: &Guard) {
        let mut prev = &self.head;
        let mut curr = prev.load(Acquire, guard).with_tag(0);
        while let Some(node) = unsafe { curr.as_ref() } {
            if node.key > *bound {
                return;
            }
            if node.is_deleted(guard) && self.help_unlink(prev, curr, guard) {
                curr = prev.load(Acquire, guard).with_tag(0);
                continue;
            }
            prev = &node.next;
            curr = node.next.load(Acquire, guard).with_tag(0);
        }
    }

    /// Insert `value` under `key`. An existing entry for `key` is not replaced, but is shadowed
    /// by the new one.
    pub fn insert(&self, key: K, value: V) {
        let guard = &epoch::pin();
        let mut node = Owned::new(Node::new(key, value));
        loop {
            let (prev, curr) = self.find_predecessor(&node.key, guard);
            if prev.load(Acquire, guard).tag() == DELETED {
                // The predecessor is on its way out, and its `next` is frozen.
                self.help_scan(&node.key, guard);
                continue;
            }
            if let Some(succ) = unsafe { curr.as_ref() } {
                if succ.is_deleted(guard) {
                    self.help_unlink(prev, curr, guard);
                    continue;
                }
            }
            node.next.store(curr, Relaxed);
            match prev.compare_exchange(curr, node, Release, Relaxed, guard) {
                Ok(_) => return,
                Err(e) => node = e.new,
            }
        }
    }

    /// Return the live value for `key`, if any.
    pub fn get<'g>(&'g self, key: &K, guard: &'g Guard) -> Option<&'g V> {
        let (mut prev, mut curr) = self.find_predecessor(key, guard);
        loop {
            let node = unsafe { curr.as_ref() }?;
            if node.key != *key {
                return None;
            }
            match node.payload(guard) {
                Payload::Live(value) => return Some(value),
                Payload::Deleted => {
                    // An older entry with the same key may still be behind this one.
                    self.help_unlink(prev, curr, guard);
                    prev = &node.next;
                    curr = node.next.load(Acquire, guard).with_tag(0);
                }
            }
        }
    }

    /// Return a copy of the live value for `key`, if any.
    pub fn lookup(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let guard = &epoch::pin();
        self.get(key, guard).cloned()
    }

    /// Return `true` if the list has a live entry for `key`.
    pub fn contains(&self, key: &K) -> bool {
        let guard = &epoch::pin();
        self.get(key, guard).is_some()
    }

    /// Remove the most recent live entry for `key`. Returns `false` if there was none.
    pub fn remove(&self, key: &K) -> bool {
        let guard = &epoch::pin();
        loop {
            let (prev, curr) = self.find_predecessor(key, guard);
            let node = match unsafe { curr.as_ref() } {
                Some(node) if node.key == *key => node,
                _ => return false,
            };
            if prev.load(Acquire, guard).tag() == DELETED {
                self.help_scan(key, guard);
                continue;
            }
            let value = node.value.load(Acquire, guard);
            if value.is_null() {
                // Someone else removed this entry. Get it out of the way, and look again.
                self.help_unlink(prev, curr, guard);
                continue;
            }
            if node
                .value
                .compare_exchange(value, Shared::null(), AcqRel, Acquire, guard)
                .is_err()
            {
                continue;
            }
            // The entry is gone as of the CAS above. The rest is cleanup.
            unsafe { guard.defer_destroy(value) };
            if !self.help_unlink(prev, curr, guard) {
                trace!("unlink raced with a concurrent update, rescanning");
                self.help_scan(key, guard);
            }
            return true;
        }
    }
}

impl<K, V> SortedList<K, V>
where
    K: Ord + 'static,
    V: Default + 'static,
{
    /// Insert `key` with a default value, to mark it as present.
    pub fn insert_key(&self, key: K) {
        self.insert(key, V::default());
    }
}

impl<K, V> fmt::Debug for SortedList<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SortedList").field("head", &self.head).finish()
    }
}

impl<K, V> Drop for SortedList<K, V> {
    fn drop(&mut self) {
        let mut freed = 0;
        unsafe {
            // We have `&mut self`, so no other thread can reach the nodes.
            let guard = epoch::unprotected();
            let mut curr = self.head.load(Relaxed, guard);
            while !curr.is_null() {
                let node = curr.into_owned();
                let value = node.value.load(Relaxed, guard);
                if !value.is_null() {
                    drop(value.into_owned());
                }
                curr = node.next.load(Relaxed, guard).with_tag(0);
                freed += 1;
            }
        }
        debug!("dropped sorted list, freed {} nodes", freed);
    }
}
