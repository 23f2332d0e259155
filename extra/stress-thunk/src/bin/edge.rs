//! This attempts to test the edge case of a thunk being submitted at
//! the same moment as the loop thread swaps out the queue to run it.
//! If the empty-to-non-empty transition was ever missed, the
//! poll-waker would not be called and the main loop below would get
//! stuck waiting forever.
//!
//! The "per run" histogram shows how many thunks were picked up by
//! each `Thunker::run` call.  A good spread of values above 1 means
//! that the crossover case is being exercised.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use stress_thunk::{Notify, Tally};
use thunker::{Thunk, Thunker};

/// Number of caller threads
const CALLERS: usize = 8;
/// Number of calls made by each caller thread
const CALLS: usize = 200000;

fn main() {
    let mut thunker = Thunker::new();
    let wake = Notify::default();
    let wake_tx = wake.clone();
    thunker.set_poll_waker(move || wake_tx.notify());

    let total = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..CALLERS)
        .map(|c| {
            let sub = thunker.submitter();
            let total = total.clone();
            thread::spawn(move || {
                let _guard = sub.register_caller();
                for i in 0..CALLS {
                    let total = total.clone();
                    let rv = Thunk::from_fn(move || {
                        total.fetch_add(1, Ordering::Relaxed);
                        Ok::<_, ()>(c ^ i)
                    })
                    .invoke();
                    assert_eq!(rv, Ok(c ^ i));
                }
            })
        })
        .collect();

    let mut per_run = Tally::default();
    let mut per_wake = Tally::default();
    let mut seen = 0;
    let mut performed = 0;
    while performed < CALLERS * CALLS {
        per_wake.add(wake.wait(&mut seen));
        let count = thunker.run();
        per_run.add(count);
        performed += count;
    }

    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(total.load(Ordering::SeqCst), CALLERS * CALLS);
    assert!(thunker.in_flight_keys().is_empty());
    per_run.report("per run");
    per_wake.report("wakes per wait");
    println!("SUCCESS");
}
