use crate::context::ContextGuard;
use crate::thunk::panic_message;
use crate::{Submitter, Thunker};
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Duration;

/// A dedicated loop thread running a [`Thunker`]
///
/// This takes care of starting a thread, creating a [`Thunker`] in it
/// and then performing thunks as they arrive until stopped.  Use
/// [`LoopThread::submitter`] to get a handle to pass to caller
/// threads, or call [`LoopThread::register_caller`] from each caller
/// thread so that [`Thunk::invoke`] finds it automatically.
///
/// The `setup` closure passed to [`LoopThread::spawn`] runs in the new
/// thread before any thunks are performed.  It may be used to set a
/// logger, or to take ownership of the state that thunks will access
/// (for example, by storing it in a thread-local).
///
/// Cleanup is handled as follows:
///
/// - [`LoopThread::stop`] or dropping the [`LoopThread`] closes the
/// queue, so thunks submitted after that point are abandoned.  Thunks
/// already queued are still performed.  Then the thread is joined.
///
/// - Panics in actions are passed back to their callers and do not
/// stop the thread.  If the thread does die, e.g. due to a panic in
/// `setup` or in the logger, then [`LoopThread::stop`] returns the
/// panic message, and any thunks left queued are abandoned.
///
/// [`LoopThread::register_caller`]: struct.LoopThread.html#method.register_caller
/// [`LoopThread::spawn`]: struct.LoopThread.html#method.spawn
/// [`LoopThread::stop`]: struct.LoopThread.html#method.stop
/// [`LoopThread::submitter`]: struct.LoopThread.html#method.submitter
/// [`LoopThread`]: struct.LoopThread.html
/// [`Thunk::invoke`]: struct.Thunk.html#method.invoke
/// [`Thunker`]: struct.Thunker.html
pub struct LoopThread {
    submitter: Submitter,
    handle: Option<JoinHandle<()>>,
}

impl LoopThread {
    /// Spawn a new loop thread.  Returns once the thread's
    /// [`Thunker`] exists and can accept thunks.
    ///
    /// [`Thunker`]: struct.Thunker.html
    pub fn spawn(setup: impl FnOnce(&mut Thunker) + Send + 'static) -> Self {
        let (tx, rx) = mpsc::channel();
        let handle = std::thread::spawn(move || {
            let mut thunker = Thunker::new();
            // Anything submitted now waits until `setup` is done
            let _ = tx.send(thunker.submitter());
            setup(&mut thunker);
            while thunker.not_closed() {
                thunker.wait(Duration::from_secs(60));
                thunker.run();
            }
            // Nothing more can be queued, so this empties the queue
            thunker.run();
        });
        let submitter = rx.recv().expect("LoopThread died before starting");
        Self {
            submitter,
            handle: Some(handle),
        }
    }

    /// Get a handle for submitting thunks to this loop thread
    pub fn submitter(&self) -> Submitter {
        self.submitter.clone()
    }

    /// Register the current thread as a caller of this loop thread.
    /// See [`ThreadContext::register`].
    ///
    /// [`ThreadContext::register`]: struct.ThreadContext.html#method.register
    pub fn register_caller(&self) -> ContextGuard {
        self.submitter.register_caller()
    }

    /// Stop the thread after it has performed all thunks already
    /// queued, and wait for it to finish.  Returns `None` for a clean
    /// shutdown, or `Some(msg)` if the thread panicked.
    pub fn stop(mut self) -> Option<String> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Option<String> {
        let handle = self.handle.take()?;
        self.submitter.close();
        match handle.join() {
            Ok(()) => None,
            Err(p) => Some(panic_message(&*p)),
        }
    }
}

impl Drop for LoopThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}
