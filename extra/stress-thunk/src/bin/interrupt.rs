//! This attempts to test interrupts crossing over with completion.
//! The interrupt is raised after a varying delay, so sometimes it
//! arrives before the wait starts, sometimes during the wait, and
//! sometimes after the result is already in.  The caller must never
//! hang, and every action must run exactly once whether or not its
//! caller gave up waiting.
//!
//! Tune SPIN_RANGE so that the output shows a good mix of "ok" and
//! "intr" results.

use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Instant;
use stress_thunk::Tally;
use thunker::{LogFilter, LogLevel, LoopThread, Thunk, ThunkError};

/// Number of times to repeat the test
const REPEAT: usize = 200000;
/// Spin-count range for delaying the interrupt.  Will need adjusting
/// for different CPUs, and for release or debug builds.
const SPIN_RANGE: Range<usize> = 0..400;

fn spin(count: usize) {
    for i in 0..count {
        std::hint::black_box(i);
    }
}

fn main() {
    let closes = Arc::new(AtomicUsize::new(0));
    let closes2 = closes.clone();
    let lt = LoopThread::spawn(move |thunker| {
        thunker.set_logger(LogFilter::from(LogLevel::Close), move |r| {
            if r.level == LogLevel::Close {
                closes2.fetch_add(1, Ordering::Relaxed);
            }
        });
    });

    let runs = Arc::new(AtomicUsize::new(0));
    let guard = lt.register_caller();
    let intr = guard.interrupt().unwrap();
    let (go_tx, go_rx) = mpsc::channel::<usize>();
    let (done_tx, done_rx) = mpsc::channel::<()>();
    let intr2 = intr.clone();
    let interrupter = thread::spawn(move || {
        for delay in go_rx {
            spin(delay);
            intr2.interrupt();
            done_tx.send(()).unwrap();
        }
    });

    let start = Instant::now();
    let mut results = Tally::default();
    let mut spins = SPIN_RANGE.cycle();
    for n in 0..REPEAT {
        let delay = spins.next().unwrap();
        go_tx.send(delay).unwrap();
        let runs = runs.clone();
        let rv = Thunk::from_fn(move || {
            spin(delay / 2);
            runs.fetch_add(1, Ordering::Relaxed);
            Ok::<_, ()>(n)
        })
        .invoke();
        match rv {
            Ok(v) => {
                assert_eq!(v, n);
                results.add(0);
            }
            Err(ThunkError::InterruptedWait) => results.add(1),
            Err(e) => panic!("Unexpected result: {:?}", e),
        }
        // Make sure the interrupt has landed, then discard it so that
        // it doesn't affect the next round
        done_rx.recv().unwrap();
        intr.clear();
    }
    drop(go_tx);
    interrupter.join().unwrap();
    drop(guard);
    assert_eq!(lt.stop(), None);

    assert_eq!(runs.load(Ordering::SeqCst), REPEAT);
    assert_eq!(closes.load(Ordering::SeqCst), REPEAT);
    results.report("ok=0 intr=1");
    println!("{} rounds in {:?}", REPEAT, start.elapsed());
    println!("SUCCESS");
}
