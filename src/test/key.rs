//! Test `ActionKey` allocation

use crate::*;
use std::collections::HashSet;
use std::thread;

#[test]
fn key_null() {
    assert!(ActionKey::NULL.is_null());
    assert_eq!(ActionKey::NULL.get(), 0);
    assert_eq!(ActionKey::default(), ActionKey::NULL);
    for _ in 0..1000 {
        assert!(!allocate().is_null());
    }
}

#[test]
fn key_increasing() {
    let mut prev = ActionKey::allocate();
    for _ in 0..1000 {
        let key = ActionKey::allocate();
        assert!(key > prev, "{} not greater than {}", key, prev);
        prev = key;
    }
    assert_eq!(format!("{}", prev), format!("#{}", prev.get()));
}

// Allocate from many threads at once.  Every key must be unique, and
// all must be greater than a key allocated before the threads
// started.
#[test]
fn key_concurrent() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 2000;

    let before = ActionKey::allocate();
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            thread::spawn(|| {
                let keys: Vec<ActionKey> = (0..PER_THREAD).map(|_| allocate()).collect();
                // Also increasing as seen from each thread
                for pair in keys.windows(2) {
                    assert!(pair[0] < pair[1]);
                }
                keys
            })
        })
        .collect();

    let mut all = HashSet::new();
    for h in handles {
        for key in h.join().unwrap() {
            assert!(key > before);
            assert!(all.insert(key), "Duplicate key: {}", key);
        }
    }
    assert_eq!(all.len(), THREADS * PER_THREAD);
    assert!(all.iter().all(|k| *k < ActionKey::allocate()));
}
