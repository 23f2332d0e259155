use crate::{ContextError, Executor, Interrupt};
use std::cell::RefCell;
use std::marker::PhantomData;
use std::mem;
use std::sync::Arc;

#[derive(Clone)]
struct Caller {
    executor: Arc<dyn Executor>,
    interrupt: Interrupt,
}

// The loop-thread marker is kept apart from the caller registration,
// so registering as a caller can never hide it
#[derive(Clone, Default)]
struct Binding {
    caller: Option<Caller>,
    executor: Option<Arc<dyn Executor>>,
}

thread_local!(
    static BINDING: RefCell<Binding> = RefCell::new(Binding::default());
);

enum Prev {
    Caller(Option<Caller>),
    Executor(Option<Arc<dyn Executor>>),
}

// Swap in a registration, returning the one it replaces.  Does
// nothing if the thread-local is being destroyed.
fn replace(new: Prev) -> Option<Prev> {
    BINDING
        .try_with(move |b| {
            let mut b = b.borrow_mut();
            match new {
                Prev::Caller(c) => Prev::Caller(mem::replace(&mut b.caller, c)),
                Prev::Executor(e) => Prev::Executor(mem::replace(&mut b.executor, e)),
            }
        })
        .ok()
}

fn with<R>(f: impl FnOnce(&Binding) -> R) -> R {
    let binding = BINDING.try_with(|b| b.borrow().clone()).unwrap_or_default();
    f(&binding)
}

/// Association between the current thread and its executor
///
/// Caller threads must be registered before they can use
/// [`Thunk::invoke`] or [`Thunk::dispatch`], so that the thunk knows
/// which loop thread to send itself to.  Registration lasts as long
/// as the returned [`ContextGuard`] is kept, which must stay within
/// the thread that it registered.
///
/// A [`Thunker`] registers its own thread as the executor thread for
/// as long as it exists.  Dispatching from that thread fails with
/// [`ContextError::ThreadContextViolation`], since the loop thread
/// would then be waiting on itself.  This holds even if the loop
/// thread is also registered as a caller of some other executor,
/// since blocking there would stall its own queue.
///
/// [`ContextError::ThreadContextViolation`]: enum.ContextError.html#variant.ThreadContextViolation
/// [`ContextGuard`]: struct.ContextGuard.html
/// [`Thunk::dispatch`]: struct.Thunk.html#method.dispatch
/// [`Thunk::invoke`]: struct.Thunk.html#method.invoke
/// [`Thunker`]: struct.Thunker.html
pub struct ThreadContext;

impl ThreadContext {
    /// Register the current thread as a caller thread of the given
    /// executor.  A fresh [`Interrupt`] is created for the thread,
    /// which may be fetched from the guard.  Any previous
    /// registration of this thread is restored when the guard is
    /// dropped.
    ///
    /// [`Interrupt`]: struct.Interrupt.html
    pub fn register(executor: Arc<dyn Executor>) -> ContextGuard {
        let interrupt = Interrupt::new();
        let prev = replace(Prev::Caller(Some(Caller {
            executor,
            interrupt: interrupt.clone(),
        })));
        ContextGuard {
            prev,
            interrupt: Some(interrupt),
            _not_send: PhantomData,
        }
    }

    // Used by `Thunker` to mark the loop thread
    pub(crate) fn register_executor(executor: Arc<dyn Executor>) -> ContextGuard {
        let prev = replace(Prev::Executor(Some(executor)));
        ContextGuard {
            prev,
            interrupt: None,
            _not_send: PhantomData,
        }
    }

    /// Get the executor that the current thread dispatches to.  On
    /// a loop thread with no caller registration, this is the loop
    /// thread's own executor.
    pub fn resolve_executor() -> Result<Arc<dyn Executor>, ContextError> {
        with(|b| {
            b.caller
                .as_ref()
                .map(|c| c.executor.clone())
                .or_else(|| b.executor.clone())
                .ok_or(ContextError::NoExecutorBound)
        })
    }

    /// Check that the current thread is not a loop thread
    pub fn assert_non_executor_thread() -> Result<(), ContextError> {
        with(|b| match b.executor {
            Some(_) => Err(ContextError::ThreadContextViolation),
            None => Ok(()),
        })
    }

    /// Get the [`Interrupt`] of the current thread, if it is
    /// registered as a caller thread
    ///
    /// [`Interrupt`]: struct.Interrupt.html
    pub fn interrupt() -> Option<Interrupt> {
        with(|b| b.caller.as_ref().map(|c| c.interrupt.clone()))
    }
}

/// Keeps a thread registered with [`ThreadContext`]
///
/// [`ThreadContext`]: struct.ThreadContext.html
pub struct ContextGuard {
    prev: Option<Prev>,
    interrupt: Option<Interrupt>,
    // Must be dropped in the thread it was created in
    _not_send: PhantomData<*const u8>,
}

impl ContextGuard {
    /// Get a handle which can be used from any thread to interrupt
    /// this thread's waits.  Returns `None` for an executor-thread
    /// registration.
    pub fn interrupt(&self) -> Option<Interrupt> {
        self.interrupt.clone()
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if let Some(prev) = self.prev.take() {
            replace(prev);
        }
    }
}
