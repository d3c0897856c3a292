use std::sync::atomic::{AtomicBool, Ordering};

use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};

use lfcollections::ebr;
use lfcollections::SortedList;

const N_THREADS: usize = 8;

/// Each thread owns the keys `k` with `k % N_THREADS == thread`.
fn owned_keys(thread: usize, per_thread: usize) -> Vec<usize> {
    (0..per_thread).map(|i| i * N_THREADS + thread).collect()
}

#[test]
fn disjoint_insert_remove() {
    const PER_THREAD: usize = 2048;
    let list = SortedList::new();

    crossbeam::scope(|s| {
        for t in 0..N_THREADS {
            let list = &list;
            s.spawn(move |_| {
                let mut keys = owned_keys(t, PER_THREAD);
                keys.shuffle(&mut thread_rng());
                for &k in &keys {
                    list.insert(k, k * 10);
                }
                // Remove every other key again.
                for &k in keys.iter().filter(|&&k| k % 2 == 1) {
                    assert!(list.remove(&k));
                }
            });
        }
    })
    .unwrap();

    for k in 0..N_THREADS * PER_THREAD {
        if k % 2 == 0 {
            assert_eq!(list.lookup(&k), Some(k * 10), "key {}", k);
        } else {
            assert_eq!(list.lookup(&k), None, "key {}", k);
        }
    }
}

#[test]
fn churn_keeps_last_operation() {
    const PER_THREAD: usize = 64;
    const ROUNDS: usize = 20_000;
    let list = SortedList::new();

    let expected = crossbeam::scope(|s| {
        let handles = (0..N_THREADS)
            .map(|t| {
                let list = &list;
                s.spawn(move |_| {
                    let keys = owned_keys(t, PER_THREAD);
                    let mut present = vec![false; PER_THREAD];
                    let mut rng = thread_rng();
                    for round in 0..ROUNDS {
                        let i = rng.gen_range(0..PER_THREAD);
                        if present[i] {
                            assert!(list.remove(&keys[i]));
                        } else {
                            list.insert(keys[i], round);
                        }
                        present[i] = !present[i];
                    }
                    keys.into_iter().zip(present).collect::<Vec<_>>()
                })
            })
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect::<Vec<_>>()
    })
    .unwrap();

    for (k, present) in expected {
        assert_eq!(list.contains(&k), present, "key {}", k);
    }
}

#[test]
fn stable_keys_survive_neighbour_churn() {
    const KEYS: usize = 512;
    let list = SortedList::new();
    // Even keys stay for the whole test; writers churn the odd keys in between them.
    for k in (0..KEYS).step_by(2) {
        list.insert(k, k);
    }
    let stop = AtomicBool::new(false);

    crossbeam::scope(|s| {
        for _ in 0..N_THREADS / 2 {
            s.spawn(|_| {
                let mut rng = thread_rng();
                while !stop.load(Ordering::Relaxed) {
                    let k = rng.gen_range(0..KEYS / 2) * 2 + 1;
                    if rng.gen_bool(0.5) {
                        list.insert(k, k);
                    } else {
                        list.remove(&k);
                    }
                }
            });
        }
        s.spawn(|_| {
            for _ in 0..200 {
                let guard = &ebr::pin();
                for k in (0..KEYS).step_by(2) {
                    assert_eq!(list.get(&k, guard), Some(&k));
                }
            }
            stop.store(true, Ordering::Relaxed);
        });
    })
    .unwrap();
}

#[test]
fn concurrent_removers_agree() {
    const KEYS: usize = 4096;
    let list = SortedList::new();
    for k in 0..KEYS {
        list.insert_key(k);
    }

    // All threads try to remove every key; each key is removed by exactly one of them.
    let removed = crossbeam::scope(|s| {
        let handles = (0..N_THREADS)
            .map(|_| {
                let list: &SortedList<usize, ()> = &list;
                s.spawn(move |_| (0..KEYS).filter(|k| list.remove(k)).count())
            })
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .sum::<usize>()
    })
    .unwrap();

    assert_eq!(removed, KEYS);
    for k in 0..KEYS {
        assert!(!list.contains(&k));
    }
}

#[test]
fn shared_keys_count_matches_live_entries() {
    const KEYS: usize = 4;
    const ROUNDS: usize = 50_000;
    let list = SortedList::new();

    // Every thread inserts and removes on the same few keys, so removed entries are constantly
    // followed by fresh ones with the same key.
    let counts = crossbeam::scope(|s| {
        let handles = (0..N_THREADS)
            .map(|t| {
                let list = &list;
                s.spawn(move |_| {
                    let mut inserted = [0usize; KEYS];
                    let mut removed = [0usize; KEYS];
                    let mut rng = thread_rng();
                    for round in 0..ROUNDS {
                        let k = rng.gen_range(0..KEYS);
                        if rng.gen_bool(0.5) {
                            list.insert(k, (t, round));
                            inserted[k] += 1;
                        } else if list.remove(&k) {
                            removed[k] += 1;
                        }
                    }
                    (inserted, removed)
                })
            })
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect::<Vec<_>>()
    })
    .unwrap();

    for k in 0..KEYS {
        let inserted: usize = counts.iter().map(|(i, _)| i[k]).sum();
        let removed: usize = counts.iter().map(|(_, r)| r[k]).sum();
        let mut live = 0;
        while list.remove(&k) {
            live += 1;
        }
        assert_eq!(inserted - removed, live, "key {}", k);
        assert!(!list.contains(&k));
    }
}
