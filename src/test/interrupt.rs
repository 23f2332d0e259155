//! Test interruption of callers blocked waiting on a thunk

use crate::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// Interrupt a caller that is blocked on an action that can't finish
// yet.  The caller must return promptly, and the action must still
// complete afterwards without harm.
#[test]
fn interrupt_blocked_caller() {
    let lt = LoopThread::spawn(|_| ());
    let sub = lt.submitter();
    let (gate_tx, gate_rx) = mpsc::channel::<()>();
    let (intr_tx, intr_rx) = mpsc::channel::<Interrupt>();
    let completed = Arc::new(AtomicBool::new(false));

    let completed2 = completed.clone();
    let caller = thread::spawn(move || {
        let guard = sub.register_caller();
        intr_tx.send(guard.interrupt().unwrap()).unwrap();
        let start = Instant::now();
        let rv = Thunk::from_fn(move || {
            gate_rx.recv().unwrap();
            completed2.store(true, Ordering::SeqCst);
            Ok::<_, ()>(())
        })
        .invoke();
        (rv, start.elapsed())
    });

    let intr = intr_rx.recv().unwrap();
    thread::sleep(Duration::from_millis(20));
    intr.interrupt();
    let (rv, elapsed) = caller.join().unwrap();
    assert_eq!(rv, Err(ThunkError::InterruptedWait));
    assert!(elapsed < Duration::from_secs(5));
    assert!(!completed.load(Ordering::SeqCst));

    // Let the action finish.  Its late completion goes nowhere.
    gate_tx.send(()).unwrap();
    let sub = lt.submitter();
    assert_eq!(Thunk::from_fn(|| Ok::<_, ()>(())).invoke_on(&sub), Ok(()));
    assert!(completed.load(Ordering::SeqCst));
    assert_eq!(lt.stop(), None);
}

// An interrupt raised before the wait starts is seen by that wait
#[test]
fn interrupt_before_wait() {
    let lt = LoopThread::spawn(|_| ());
    let guard = lt.register_caller();
    let intr = guard.interrupt().unwrap();
    let (gate_tx, gate_rx) = mpsc::channel::<()>();

    let pending = Thunk::from_fn(move || {
        gate_rx.recv().unwrap();
        Ok::<_, ()>(1)
    })
    .dispatch()
    .unwrap();
    intr.interrupt();
    assert!(intr.is_interrupted());
    assert_eq!(pending.wait(), Err(ThunkError::InterruptedWait));
    // Consumed by the wait
    assert!(!intr.is_interrupted());

    gate_tx.send(()).unwrap();
    assert_eq!(Thunk::from_fn(|| Ok::<_, ()>(2)).invoke(), Ok(2));
}

// A result that is already there takes priority over an interrupt,
// which stays raised for the next wait
#[test]
fn interrupt_after_completion() {
    let lt = LoopThread::spawn(|_| ());
    let guard = lt.register_caller();
    let intr = guard.interrupt().unwrap();

    let pending = Thunk::from_fn(|| Ok::<_, ()>(7)).dispatch().unwrap();
    let start = Instant::now();
    while !pending.is_complete() {
        assert!(start.elapsed() < Duration::from_secs(5));
        thread::sleep(Duration::from_millis(1));
    }
    intr.interrupt();
    assert_eq!(pending.wait(), Ok(7));
    assert!(intr.is_interrupted());
    assert!(intr.clear());
    assert!(!intr.clear());
}

// Interrupting a thread that isn't waiting does nothing until it
// waits.  Interrupt handles are per caller thread.
#[test]
fn interrupt_per_thread() {
    let lt = LoopThread::spawn(|_| ());
    let g1 = lt.register_caller();
    let i1 = g1.interrupt().unwrap();
    assert!(ThreadContext::interrupt().is_some());

    let sub = lt.submitter();
    let other = thread::spawn(move || {
        let g2 = sub.register_caller();
        let i2 = g2.interrupt().unwrap();
        let rv = Thunk::from_fn(|| Ok::<_, ()>(5)).invoke();
        (rv, i2.is_interrupted())
    });
    i1.interrupt();
    let (rv, other_interrupted) = other.join().unwrap();
    assert_eq!(rv, Ok(5));
    assert!(!other_interrupted);
    assert!(i1.clear());
}

#[test]
fn interrupt_unregistered() {
    // No thread context, so no interrupt, and waits are plain
    assert!(ThreadContext::interrupt().is_none());
    let lt = LoopThread::spawn(|_| ());
    assert_eq!(
        Thunk::from_fn(|| Ok::<_, ()>(3)).invoke_on(&lt.submitter()),
        Ok(3)
    );
    let intr = Interrupt::default();
    assert!(!intr.is_interrupted());
    intr.interrupt();
    assert!(intr.is_interrupted());
}

// A `Pending` waited on by another thread follows that thread's
// interrupt.  Two waits on thunks from one dispatcher don't disturb
// each other's wakeups.
#[test]
fn interrupt_waiting_thread() {
    let lt = LoopThread::spawn(|_| ());
    let guard = lt.register_caller();
    let intr_a = guard.interrupt().unwrap();
    let (gate1_tx, gate1_rx) = mpsc::channel::<()>();
    let (gate2_tx, gate2_rx) = mpsc::channel::<()>();

    let p1 = Thunk::from_fn(move || {
        gate1_rx.recv().unwrap();
        Ok::<_, ()>(1)
    })
    .dispatch()
    .unwrap();
    let p2 = Thunk::from_fn(move || {
        gate2_rx.recv().unwrap();
        Ok::<_, ()>(2)
    })
    .dispatch()
    .unwrap();

    let sub = lt.submitter();
    let waiter_b = thread::spawn(move || {
        let _guard = sub.register_caller();
        p1.wait()
    });
    let sub = lt.submitter();
    let (intr_tx, intr_rx) = mpsc::channel::<Interrupt>();
    let waiter_c = thread::spawn(move || {
        let guard = sub.register_caller();
        intr_tx.send(guard.interrupt().unwrap()).unwrap();
        let rv = p2.wait();
        (rv, Instant::now())
    });
    let intr_c = intr_rx.recv().unwrap();
    thread::sleep(Duration::from_millis(20));

    // First waiter leaves whilst the second is still blocked
    gate1_tx.send(()).unwrap();
    assert_eq!(waiter_b.join().unwrap(), Ok(1));

    // Dispatching thread's interrupt doesn't reach the other waiter
    intr_a.interrupt();
    thread::sleep(Duration::from_millis(20));
    assert!(!intr_c.is_interrupted());

    let raised = Instant::now();
    intr_c.interrupt();
    let (rv, returned) = waiter_c.join().unwrap();
    assert_eq!(rv, Err(ThunkError::InterruptedWait));
    assert!(returned.duration_since(raised) < Duration::from_secs(5));
    assert!(!intr_c.is_interrupted());
    assert!(intr_a.clear());

    gate2_tx.send(()).unwrap();
    drop(guard);
    assert_eq!(lt.stop(), None);
}
