use crate::context::ContextGuard;
use crate::{
    ActionKey, LogFilter, LogID, LogLevel, LogRecord, LogVisitor, Outcome, Perform, ThreadContext,
};
use slab::Slab;
use std::collections::VecDeque;
use std::fmt::Arguments;
use std::mem;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

/// Serial queue that runs thunks on a single loop thread
///
/// An executor accepts type-erased thunks from any thread via
/// [`Executor::submit`] and guarantees that each one has
/// [`Perform::perform_and_signal`] called exactly once, on its one
/// loop thread, in the order submitted.  Two thunks never run at the
/// same time.
///
/// [`Thunker`] is the implementation provided by this crate.  Other
/// implementations may be used to hook thunks into an existing event
/// loop.
///
/// [`Executor::submit`]: trait.Executor.html#tymethod.submit
/// [`Perform::perform_and_signal`]: trait.Perform.html#tymethod.perform_and_signal
/// [`Thunker`]: struct.Thunker.html
pub trait Executor: Send + Sync {
    /// Add a thunk to the end of the queue.  Must not block waiting
    /// for the loop thread.  If the executor is no longer running,
    /// the thunk should be dropped, which tells its caller that it
    /// was abandoned.
    fn submit(&self, thunk: Box<dyn Perform>);

    /// Test whether the calling thread is this executor's loop thread
    fn is_executor_thread(&self) -> bool;
}

struct Entry {
    slot: usize, // Index into `in_flight`
    thunk: Box<dyn Perform>,
}

type PollWaker = Arc<dyn Fn() + Send + Sync + 'static>;

// Uses a Mutex internally.  Operations whilst locked are quick, and
// no action is ever run with the lock held.
struct Queue {
    thread: ThreadId,
    mutex: Mutex<QueueInner>,
    condvar: Condvar,
}

struct QueueInner {
    closed: bool,
    queue: VecDeque<Entry>,
    in_flight: Slab<Vec<ActionKey>>,
    poll_waker: Option<PollWaker>,
}

impl Queue {
    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.mutex.lock().expect("Thunker queue lock poisoned")
    }

    fn submit(&self, thunk: Box<dyn Perform>) {
        let mut lock = self.lock();
        if lock.closed {
            drop(lock);
            // Dropping an unperformed thunk releases its caller
            drop(thunk);
            return;
        }
        let slot = lock.in_flight.insert(thunk.action_keys().to_vec());
        let empty = lock.queue.is_empty();
        lock.queue.push_back(Entry { slot, thunk });
        let poll_waker = if empty { lock.poll_waker.clone() } else { None };
        drop(lock);

        if empty {
            self.condvar.notify_all();
            if let Some(waker) = poll_waker {
                waker();
            }
        }
    }

    fn close(&self) {
        self.lock().closed = true;
        self.condvar.notify_all();
    }

    fn in_flight_keys(&self) -> Vec<ActionKey> {
        let lock = self.lock();
        let mut rv: Vec<ActionKey> = lock
            .in_flight
            .iter()
            .flat_map(|(_, keys)| keys.iter().copied())
            .collect();
        drop(lock);
        rv.sort_unstable();
        rv
    }

    fn is_in_flight(&self, key: ActionKey) -> bool {
        self.lock()
            .in_flight
            .iter()
            .any(|(_, keys)| keys.contains(&key))
    }
}

/// Handle used to submit thunks to a [`Thunker`] from other threads
///
/// This may be cloned as many times as necessary and sent to other
/// threads.  It implements [`Executor`], so may be passed to
/// [`Thunk::invoke_on`] or registered as a caller thread's executor
/// with [`Submitter::register_caller`].
///
/// [`Executor`]: trait.Executor.html
/// [`Submitter::register_caller`]: struct.Submitter.html#method.register_caller
/// [`Thunk::invoke_on`]: struct.Thunk.html#method.invoke_on
/// [`Thunker`]: struct.Thunker.html
#[derive(Clone)]
pub struct Submitter {
    queue: Arc<Queue>,
}

impl Submitter {
    /// Register the current thread as a caller thread of this
    /// executor.  See [`ThreadContext::register`].
    ///
    /// [`ThreadContext::register`]: struct.ThreadContext.html#method.register
    pub fn register_caller(&self) -> ContextGuard {
        ThreadContext::register(Arc::new(self.clone()))
    }

    /// Test whether the [`Thunker`] has been closed.  Thunks
    /// submitted after this are abandoned.
    ///
    /// [`Thunker`]: struct.Thunker.html
    pub fn is_closed(&self) -> bool {
        self.queue.lock().closed
    }

    pub(crate) fn close(&self) {
        self.queue.close();
    }

    /// Get the action keys of all thunks queued or running, in
    /// ascending order
    pub fn in_flight_keys(&self) -> Vec<ActionKey> {
        self.queue.in_flight_keys()
    }

    /// Test whether any thunk queued or running carries the given
    /// action key
    pub fn is_in_flight(&self, key: ActionKey) -> bool {
        self.queue.is_in_flight(key)
    }
}

impl Executor for Submitter {
    fn submit(&self, thunk: Box<dyn Perform>) {
        self.queue.submit(thunk);
    }

    fn is_executor_thread(&self) -> bool {
        thread::current().id() == self.queue.thread
    }
}

/// Serial executor for thunks, owned by the loop thread
///
/// The thread that creates the [`Thunker`] becomes its loop thread,
/// and the [`Thunker`] cannot be moved to another thread.  For as
/// long as it exists, that thread is registered as an executor thread
/// in the [`ThreadContext`], so any attempt to dispatch a thunk from
/// it fails instead of deadlocking.
///
/// Other threads submit thunks through a [`Submitter`].  The loop
/// thread must call [`Thunker::run`] regularly to perform them.  This
/// can be done from an existing event loop by setting a poll-waker
/// with [`Thunker::set_poll_waker`], or by blocking in
/// [`Thunker::wait`].  [`LoopThread`] runs a [`Thunker`] in a thread
/// of its own.
///
/// A failing action never stops the loop: an `Err` or a panic is
/// passed back to the caller and the next thunk runs as normal.
///
/// When the [`Thunker`] is dropped, any thunks still queued are
/// abandoned, and their callers receive [`ThunkError::Abandoned`].
///
/// [`LoopThread`]: struct.LoopThread.html
/// [`Submitter`]: struct.Submitter.html
/// [`ThreadContext`]: struct.ThreadContext.html
/// [`Thunker::run`]: struct.Thunker.html#method.run
/// [`Thunker::set_poll_waker`]: struct.Thunker.html#method.set_poll_waker
/// [`Thunker::wait`]: struct.Thunker.html#method.wait
/// [`ThunkError::Abandoned`]: enum.ThunkError.html#variant.Abandoned
/// [`Thunker`]: struct.Thunker.html
pub struct Thunker {
    queue: Arc<Queue>,
    alt_queue: VecDeque<Entry>,
    _context: ContextGuard,
    poll_waker_set: bool,
    #[cfg(feature = "logger")]
    log_filter: LogFilter,
    #[cfg(feature = "logger")]
    logger: Option<Box<dyn FnMut(&LogRecord<'_>)>>,
}

impl Thunker {
    /// Create a [`Thunker`] with the current thread as its loop
    /// thread
    ///
    /// [`Thunker`]: struct.Thunker.html
    pub fn new() -> Self {
        let queue = Arc::new(Queue {
            thread: thread::current().id(),
            mutex: Mutex::new(QueueInner {
                closed: false,
                queue: VecDeque::new(),
                in_flight: Slab::new(),
                poll_waker: None,
            }),
            condvar: Condvar::new(),
        });
        let context = ThreadContext::register_executor(Arc::new(Submitter {
            queue: queue.clone(),
        }));
        Self {
            queue,
            alt_queue: VecDeque::new(),
            _context: context,
            poll_waker_set: false,
            #[cfg(feature = "logger")]
            log_filter: LogFilter::new(),
            #[cfg(feature = "logger")]
            logger: None,
        }
    }

    /// Get a handle for submitting thunks from other threads
    pub fn submitter(&self) -> Submitter {
        Submitter {
            queue: self.queue.clone(),
        }
    }

    /// Perform all the thunks that are queued at the time of the
    /// call, in order.  Thunks submitted whilst this is running are
    /// left for the next call.  Returns the number performed.
    pub fn run(&mut self) -> usize {
        // Swap out the queue before executing it, since thunks may be
        // submitted whilst these ones are running
        let mut batch = mem::take(&mut self.alt_queue);
        mem::swap(&mut self.queue.lock().queue, &mut batch);

        let count = batch.len();
        for Entry { slot, thunk } in batch.drain(..) {
            let id = thunk.action_keys().last().map_or(0, |k| k.get());
            self.log_span_open(id, thunk.action_keys());
            let outcome = thunk.perform_and_signal();
            self.queue.lock().in_flight.remove(slot);
            self.log_span_close(id, &outcome);
        }
        self.alt_queue = batch;
        count
    }

    /// Block until there are thunks waiting to run, or the
    /// [`Thunker`] is closed, or `maxdur` has passed.  Returns `true`
    /// if there are thunks waiting.
    ///
    /// [`Thunker`]: struct.Thunker.html
    pub fn wait(&self, maxdur: Duration) -> bool {
        let deadline = Instant::now().checked_add(maxdur);
        let mut lock = self.queue.lock();
        while lock.queue.is_empty() && !lock.closed {
            match deadline {
                None => {
                    lock = self
                        .queue
                        .condvar
                        .wait(lock)
                        .expect("Thunker queue lock poisoned");
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    lock = self
                        .queue
                        .condvar
                        .wait_timeout(lock, deadline - now)
                        .expect("Thunker queue lock poisoned")
                        .0;
                }
            }
        }
        !lock.queue.is_empty()
    }

    /// Number of thunks waiting to run
    pub fn queued(&self) -> usize {
        self.queue.lock().queue.len()
    }

    /// Stop accepting thunks.  Any already queued will still be
    /// performed by [`Thunker::run`], but any submitted after this
    /// are abandoned.
    ///
    /// [`Thunker::run`]: struct.Thunker.html#method.run
    pub fn close(&self) {
        self.queue.close();
    }

    /// Test whether the [`Thunker`] is still accepting thunks
    ///
    /// [`Thunker`]: struct.Thunker.html
    pub fn not_closed(&self) -> bool {
        !self.queue.lock().closed
    }

    /// Get the action keys of all thunks queued or running, in
    /// ascending order.  A thunk's keys are removed just after it
    /// signals completion, so a caller that has just been woken may
    /// still briefly see them.
    pub fn in_flight_keys(&self) -> Vec<ActionKey> {
        self.queue.in_flight_keys()
    }

    /// Test whether any thunk queued or running carries the given
    /// action key
    pub fn is_in_flight(&self, key: ActionKey) -> bool {
        self.queue.is_in_flight(key)
    }

    /// Provide a means to wake the loop thread when thunks are
    /// submitted
    ///
    /// If the loop thread spends its time blocked in some other kind
    /// of wait, for example an I/O poller, then it needs to be woken
    /// when a thunk arrives.  The `waker` is called from the
    /// submitting thread each time the queue goes from empty to
    /// non-empty.  The loop thread should then call [`Thunker::run`].
    ///
    /// Panics if called more than once.
    ///
    /// [`Thunker::run`]: struct.Thunker.html#method.run
    pub fn set_poll_waker(&mut self, waker: impl Fn() + Send + Sync + 'static) {
        if self.poll_waker_set {
            panic!("Thunker::set_poll_waker called more than once");
        }
        self.queue.lock().poll_waker = Some(Arc::new(waker));
        self.poll_waker_set = true;
    }

    /// Set the logger and logging level
    ///
    /// The logger is called synchronously on the loop thread for
    /// every record whose level is enabled by `filter`.  For each
    /// thunk performed, an `Open` record is logged before it runs and
    /// a `Close` record after it signals completion, with the thunk's
    /// latest action key as the span ID.  Failures are also logged at
    /// `Debug` (`Err`) or `Warn` (panic).  The logger may forward
    /// these to an external logging framework.
    ///
    /// Note that the **logger** feature must be enabled for this call
    /// to succeed.
    #[inline]
    #[allow(unused_variables)]
    pub fn set_logger(&mut self, filter: LogFilter, logger: impl FnMut(&LogRecord<'_>) + 'static) {
        #[cfg(feature = "logger")]
        {
            self.log_filter = filter;
            self.logger = Some(Box::new(logger));
        }
        #[cfg(not(feature = "logger"))]
        panic!("Enable 'logger' feature before setting a logger");
    }

    /// Log a record to the current logger, if one is set and the
    /// level is enabled.  `id` should be an action key's raw value,
    /// or 0.
    #[inline]
    #[allow(unused_variables)]
    pub fn log(
        &mut self,
        id: LogID,
        level: LogLevel,
        target: &str,
        fmt: Arguments<'_>,
        kvscan: impl Fn(&mut dyn LogVisitor),
    ) {
        // `format_args!` temporaries only live until the end of the
        // calling statement, so the record has to be built here
        #[cfg(feature = "logger")]
        if self.log_filter.allows(level) {
            if let Some(ref mut logger) = self.logger {
                logger(&LogRecord {
                    id,
                    level,
                    target,
                    fmt,
                    kvscan: &kvscan,
                });
            }
        }
    }

    /// Check whether a record with the given [`LogLevel`] would be
    /// logged
    ///
    /// [`LogLevel`]: enum.LogLevel.html
    #[inline]
    #[allow(unused_variables)]
    pub fn log_check(&self, level: LogLevel) -> bool {
        #[cfg(feature = "logger")]
        {
            self.logger.is_some() && self.log_filter.allows(level)
        }
        #[cfg(not(feature = "logger"))]
        false
    }

    fn log_span_open(&mut self, id: LogID, keys: &[ActionKey]) {
        self.log(id, LogLevel::Open, "", format_args!("thunk"), |out| {
            out.kv_arr(Some("keys"));
            for key in keys {
                out.kv_u64(None, key.get());
            }
            out.kv_arrend(Some("keys"));
        });
    }

    fn log_span_close(&mut self, id: LogID, outcome: &Outcome) {
        match outcome {
            Outcome::Completed => {
                self.log(id, LogLevel::Close, "", format_args!(""), |_| ());
            }
            Outcome::Failed => {
                self.log(id, LogLevel::Debug, "", format_args!("action failed"), |_| ());
                self.log(id, LogLevel::Close, "", format_args!("action failed"), |out| {
                    out.kv_null(Some("failed"))
                });
            }
            Outcome::Panicked(msg) => {
                self.log(
                    id,
                    LogLevel::Warn,
                    "",
                    format_args!("action panicked: {}", msg),
                    |_| (),
                );
                self.log(id, LogLevel::Close, "", format_args!("{}", msg), |out| {
                    out.kv_null(Some("panicked"))
                });
            }
        }
    }
}

impl Default for Thunker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Thunker {
    fn drop(&mut self) {
        let abandoned = {
            let mut lock = self.queue.lock();
            lock.closed = true;
            lock.in_flight.clear();
            mem::take(&mut lock.queue)
        };
        self.queue.condvar.notify_all();
        if !abandoned.is_empty() {
            let count = abandoned.len() as u64;
            self.log(
                0,
                LogLevel::Warn,
                "",
                format_args!("Thunker dropped with thunks still queued"),
                |out| out.kv_u64(Some("abandoned"), count),
            );
        }
        // Releases the callers with `ThunkError::Abandoned`
        drop(abandoned);
    }
}
