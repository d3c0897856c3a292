use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Barrier;
use std::time::Instant;

use crossbeam::queue::SegQueue;
use lfcollections::ebr::queue::Queue as MsQueue;
use lfcollections::locked::LockedQueue;
use lfcollections::{Queue, SortedList};
use log::debug;
use rand::seq::SliceRandom;

use crate::stats::BenchStats;
use crate::Opts;

/// Runs a function on `num_threads` threads at once, over shared state, and records how long it
/// takes until all of them are done. `before` runs ahead of each sample, outside the timing.
pub struct ThreadBencher<S> {
    state: S,
    num_threads: usize,
    before: Box<dyn Fn(&S)>,
}

impl<S: Sync> ThreadBencher<S> {
    pub fn new(state: S, num_threads: usize) -> Self {
        Self {
            state,
            num_threads,
            before: Box::new(|_| {}),
        }
    }

    pub fn before<F: 'static + Fn(&S)>(&mut self, f: F) {
        self.before = Box::new(f);
    }

    pub fn thread_bench(&self, samples: usize, f: fn(&S)) -> Vec<u64> {
        (0..samples)
            .map(|i| {
                (self.before)(&self.state);
                let barrier = Barrier::new(self.num_threads + 1);
                let state = &self.state;
                let elapsed = crossbeam::scope(|s| {
                    for _ in 0..self.num_threads {
                        s.spawn(|_| {
                            barrier.wait();
                            f(state);
                            barrier.wait();
                        });
                    }
                    barrier.wait();
                    let t0 = Instant::now();
                    barrier.wait();
                    t0.elapsed().as_nanos() as u64
                })
                .unwrap_or_else(|_| panic!("benchmark thread panicked in sample {}", i));
                debug!("sample {}: {} ns", i, elapsed);
                elapsed
            })
            .collect()
    }
}

/// Lets crossbeam's queue run through the same benchmarks as ours.
#[derive(Default)]
pub struct Seg(SegQueue<usize>);

impl Queue<usize> for Seg {
    fn enqueue(&self, t: usize) -> bool {
        self.0.push(t);
        true
    }
    fn dequeue(&self) -> Option<usize> {
        self.0.pop()
    }
    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

struct QueueState<Q> {
    queue: Q,
    sink: Q,
    per_thread: usize,
    elements: usize,
}

fn queue_state<Q: Default>(opts: &Opts) -> QueueState<Q> {
    QueueState {
        queue: Q::default(),
        sink: Q::default(),
        per_thread: opts.elements / opts.num_threads.max(1),
        elements: opts.elements,
    }
}

fn drain<Q: Queue<usize>>(q: &Q) {
    while q.dequeue().is_some() {}
}

pub fn queue_push<Q: Queue<usize> + Default + Sync + 'static>(variant: &str, opts: &Opts) -> BenchStats {
    fn push<Q: Queue<usize>>(state: &QueueState<Q>) {
        for i in 0..state.per_thread {
            state.queue.enqueue(i);
        }
    }

    let mut b = ThreadBencher::new(queue_state::<Q>(opts), opts.num_threads);
    b.before(|state| drain(&state.queue));
    let samples = b.thread_bench(opts.samples, push::<Q>);
    BenchStats::new(variant, "queue::push", opts.num_threads, samples)
}

pub fn queue_pop<Q: Queue<usize> + Default + Sync + 'static>(variant: &str, opts: &Opts) -> BenchStats {
    fn pop<Q: Queue<usize>>(state: &QueueState<Q>) {
        drain(&state.queue);
    }

    let mut b = ThreadBencher::new(queue_state::<Q>(opts), opts.num_threads);
    b.before(|state| {
        drain(&state.queue);
        for i in 0..state.elements {
            state.queue.enqueue(i);
        }
    });
    let samples = b.thread_bench(opts.samples, pop::<Q>);
    BenchStats::new(variant, "queue::pop", opts.num_threads, samples)
}

pub fn queue_transfer<Q: Queue<usize> + Default + Sync + 'static>(
    variant: &str,
    opts: &Opts,
) -> BenchStats {
    fn transfer<Q: Queue<usize>>(state: &QueueState<Q>) {
        while let Some(i) = state.queue.dequeue() {
            state.sink.enqueue(i);
        }
    }

    let mut b = ThreadBencher::new(queue_state::<Q>(opts), opts.num_threads);
    b.before(|state| {
        drain(&state.sink);
        for i in 0..state.elements {
            state.queue.enqueue(i);
        }
    });
    let samples = b.thread_bench(opts.samples, transfer::<Q>);
    BenchStats::new(variant, "queue::transfer", opts.num_threads, samples)
}

pub fn ms_queue_push(opts: &Opts) -> BenchStats {
    queue_push::<MsQueue<usize>>("ms", opts)
}
pub fn ms_queue_pop(opts: &Opts) -> BenchStats {
    queue_pop::<MsQueue<usize>>("ms", opts)
}
pub fn ms_queue_transfer(opts: &Opts) -> BenchStats {
    queue_transfer::<MsQueue<usize>>("ms", opts)
}
pub fn locked_queue_push(opts: &Opts) -> BenchStats {
    queue_push::<LockedQueue<usize>>("locked", opts)
}
pub fn locked_queue_pop(opts: &Opts) -> BenchStats {
    queue_pop::<LockedQueue<usize>>("locked", opts)
}
pub fn locked_queue_transfer(opts: &Opts) -> BenchStats {
    queue_transfer::<LockedQueue<usize>>("locked", opts)
}
pub fn crossbeam_queue_push(opts: &Opts) -> BenchStats {
    queue_push::<Seg>("crossbeam", opts)
}
pub fn crossbeam_queue_pop(opts: &Opts) -> BenchStats {
    queue_pop::<Seg>("crossbeam", opts)
}
pub fn crossbeam_queue_transfer(opts: &Opts) -> BenchStats {
    queue_transfer::<Seg>("crossbeam", opts)
}

struct ListState {
    list: SortedList<usize, usize>,
    keys: usize,
    num_threads: usize,
    /// Hands out a distinct index to each benchmark thread.
    thread_counter: AtomicUsize,
}

impl ListState {
    fn new(opts: &Opts) -> Self {
        Self {
            list: SortedList::new(),
            keys: opts.list_keys,
            num_threads: opts.num_threads.max(1),
            thread_counter: AtomicUsize::new(0),
        }
    }

    /// The keys owned by the calling benchmark thread.
    fn my_keys(&self) -> impl Iterator<Item = usize> + '_ {
        let t = self.thread_counter.fetch_add(1, Ordering::SeqCst);
        (0..self.keys / self.num_threads).map(move |i| i * self.num_threads + t)
    }

    fn refill(&self) {
        self.thread_counter.store(0, Ordering::SeqCst);
        for k in 0..self.keys {
            self.list.remove(&k);
        }
        let mut keys = (0..self.keys).collect::<Vec<_>>();
        keys.shuffle(&mut rand::thread_rng());
        for k in keys {
            self.list.insert(k, k);
        }
    }
}

pub fn list_remove(opts: &Opts) -> BenchStats {
    fn remove(state: &ListState) {
        for k in state.my_keys() {
            assert!(state.list.remove(&k));
        }
    }

    let mut b = ThreadBencher::new(ListState::new(opts), opts.num_threads);
    b.before(ListState::refill);
    let samples = b.thread_bench(opts.samples, remove);
    BenchStats::new("ebr", "list::remove", opts.num_threads, samples)
}

pub fn list_lookup(opts: &Opts) -> BenchStats {
    fn lookup(state: &ListState) {
        for k in state.my_keys() {
            assert_eq!(state.list.lookup(&k), Some(k));
        }
    }

    let mut b = ThreadBencher::new(ListState::new(opts), opts.num_threads);
    b.before(ListState::refill);
    let samples = b.thread_bench(opts.samples, lookup);
    BenchStats::new("ebr", "list::lookup", opts.num_threads, samples)
}

pub fn list_mixed(opts: &Opts) -> BenchStats {
    fn mixed(state: &ListState) {
        for k in state.my_keys() {
            assert!(state.list.remove(&k));
            assert_eq!(state.list.lookup(&k), None);
            state.list.insert(k, k + 1);
        }
    }

    let mut b = ThreadBencher::new(ListState::new(opts), opts.num_threads);
    b.before(ListState::refill);
    let samples = b.thread_bench(opts.samples, mixed);
    BenchStats::new("ebr", "list::mixed", opts.num_threads, samples)
}
