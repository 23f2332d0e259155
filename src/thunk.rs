use crate::interrupt::WakeWaiter;
use crate::{Action, ActionKey, Executor, FnAction, ThreadContext, ThunkError};
use std::any::Any;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};

// One-shot result cell.  Written once by the loop thread, read once
// by the caller.
enum Slot<T, E> {
    Pending,
    Done(Result<T, E>),
    Panicked(Box<dyn Any + Send + 'static>),
    Abandoned,
    Taken,
}

struct Completion<T, E> {
    slot: Mutex<Slot<T, E>>,
    condvar: Condvar,
}

impl<T, E> Completion<T, E> {
    fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Pending),
            condvar: Condvar::new(),
        }
    }

    // Store the result and wake all waiters.  The value is written
    // under the lock before the notify, so no waiter can see the
    // signal without also seeing the value.
    fn signal(&self, value: Slot<T, E>) {
        let mut guard = self.slot.lock().expect("Thunk completion lock poisoned");
        if let Slot::Pending = *guard {
            *guard = value;
        }
        self.condvar.notify_all();
    }

    // Used from a drop handler, so ignore poisoning
    fn abandon(&self) {
        if let Ok(mut guard) = self.slot.lock() {
            if let Slot::Pending = *guard {
                *guard = Slot::Abandoned;
            }
            self.condvar.notify_all();
        }
    }

    fn is_complete(&self) -> bool {
        let guard = self.slot.lock().expect("Thunk completion lock poisoned");
        !matches!(*guard, Slot::Pending)
    }
}

impl<T: Send, E: Send> WakeWaiter for Completion<T, E> {
    fn wake_waiter(&self) {
        // Taking the lock means the waiter is either inside
        // `Condvar::wait` or hasn't yet checked its interrupt flag
        if let Ok(_guard) = self.slot.lock() {
            self.condvar.notify_all();
        }
    }
}

/// How a queued thunk finished on the loop thread
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Outcome {
    /// The action returned `Ok`
    Completed,
    /// The action returned `Err`, which has been passed back to the
    /// caller
    Failed,
    /// The action panicked.  The panic has been passed back to the
    /// caller, and its message is given here.
    Panicked(String),
}

/// Loop-thread side of a dispatched [`Thunk`]
///
/// This is the type-erased form of a thunk that sits on an
/// executor's queue.  An [`Executor`] calls
/// [`Perform::perform_and_signal`] exactly once on the loop thread.
/// If the executor drops it instead without performing it, the
/// waiting caller receives [`ThunkError::Abandoned`].
///
/// [`Executor`]: trait.Executor.html
/// [`Perform::perform_and_signal`]: trait.Perform.html#tymethod.perform_and_signal
/// [`Thunk`]: struct.Thunk.html
/// [`ThunkError::Abandoned`]: enum.ThunkError.html#variant.Abandoned
pub trait Perform: Send {
    /// Run the action body, capture its result or failure for the
    /// caller and then signal completion.  Completion is signalled
    /// whether or not the action succeeded, and neither an `Err` nor
    /// a panic from the action escapes from this call, so the loop
    /// thread can carry on with the next item on its queue.
    fn perform_and_signal(self: Box<Self>) -> Outcome;

    /// The action keys attached to the thunk, oldest first
    fn action_keys(&self) -> &[ActionKey];
}

struct Job<A: Action> {
    // Only `None` once performed, which lets `drop` tell an
    // abandoned job from a finished one
    action: Option<A>,
    keys: Vec<ActionKey>,
    cell: Arc<Completion<A::Output, A::Error>>,
}

impl<A: Action> Perform for Job<A> {
    fn perform_and_signal(mut self: Box<Self>) -> Outcome {
        let action = match self.action.take() {
            Some(a) => a,
            None => unreachable!(),
        };
        let (slot, outcome) = match panic::catch_unwind(AssertUnwindSafe(move || action.run())) {
            Ok(Ok(v)) => (Slot::Done(Ok(v)), Outcome::Completed),
            Ok(Err(e)) => (Slot::Done(Err(e)), Outcome::Failed),
            Err(p) => {
                let msg = panic_message(&*p);
                (Slot::Panicked(p), Outcome::Panicked(msg))
            }
        };
        self.cell.signal(slot);
        outcome
    }

    fn action_keys(&self) -> &[ActionKey] {
        &self.keys
    }
}

impl<A: Action> Drop for Job<A> {
    fn drop(&mut self) {
        // Dropped without being performed, e.g. executor shutdown
        if self.action.take().is_some() {
            self.cell.abandon();
        }
    }
}

// Pass through panic message if it is a `String` or `&str`, else
// generate some debugging output
pub(crate) fn panic_message(p: &(dyn Any + Send)) -> String {
    if let Some(s) = p.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = p.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        format!("Panic with unknown type: {:?}", p.type_id())
    }
}

/// A synchronous call to be made on the loop thread
///
/// Wrap an [`Action`] in a [`Thunk`] and call [`Thunk::invoke`] from
/// any thread other than the loop thread.  The action is queued to
/// the executor that the calling thread is registered with (see
/// [`ThreadContext`]), and the calling thread blocks until the loop
/// thread has run it.  Then:
///
/// - If the action returned `Ok(value)`, `invoke` returns
/// `Ok(value)`.
///
/// - If the action returned `Err(e)`, `invoke` returns
/// `Err(ThunkError::Action(e))` with that same error value.
///
/// - If the action panicked, the panic is caught on the loop thread
/// (which carries on running) and then resumed on the calling thread
/// with the original payload.
///
/// So as far as the caller is concerned, it is as if the call had
/// been made directly.  Dispatching from the loop thread itself
/// fails immediately with [`ThunkError::ThreadContextViolation`],
/// since waiting there would deadlock.
///
/// A [`Thunk`] can be used only once: `invoke` and `dispatch` consume
/// it.  Each dispatch appends a freshly allocated [`ActionKey`] to the
/// thunk's list of keys.  Keys may also be added by the caller with
/// [`Thunk::add_action_key`], for example to tie several thunks to
/// one logical operation.
///
/// ```
///# use thunker::{LoopThread, Thunk, ThunkError};
/// let lt = LoopThread::spawn(|_| ());
/// let value = Thunk::from_fn(|| Ok::<_, ()>(6 * 7)).invoke_on(&lt.submitter());
/// assert_eq!(value, Ok(42));
///
/// let failed = Thunk::from_fn(|| Err::<u32, _>("no device")).invoke_on(&lt.submitter());
/// assert_eq!(failed, Err(ThunkError::Action("no device")));
/// ```
///
/// [`Action`]: trait.Action.html
/// [`ActionKey`]: struct.ActionKey.html
/// [`Thunk::add_action_key`]: struct.Thunk.html#method.add_action_key
/// [`Thunk::invoke`]: struct.Thunk.html#method.invoke
/// [`ThreadContext`]: struct.ThreadContext.html
/// [`ThunkError::ThreadContextViolation`]: enum.ThunkError.html#variant.ThreadContextViolation
/// [`Thunk`]: struct.Thunk.html
pub struct Thunk<A: Action> {
    action: A,
    action_keys: Vec<ActionKey>,
}

impl<A: Action> Thunk<A> {
    /// Wrap an action.  Nothing is queued until it is dispatched.
    pub fn new(action: A) -> Self {
        Self {
            action,
            action_keys: Vec::new(),
        }
    }

    /// Append an action key to this thunk's list
    pub fn add_action_key(&mut self, key: ActionKey) {
        self.action_keys.push(key);
    }

    /// Get the action keys attached so far, oldest first
    pub fn action_keys(&self) -> &[ActionKey] {
        &self.action_keys
    }

    /// Queue the thunk to the calling thread's executor without
    /// waiting.  Use [`Pending::wait`] to collect the result.
    ///
    /// [`Pending::wait`]: struct.Pending.html#method.wait
    pub fn dispatch(self) -> Result<Pending<A::Output, A::Error>, ThunkError<A::Error>> {
        // A loop thread always resolves to its own executor, so the
        // thread check in `dispatch_to` still catches it
        let executor = ThreadContext::resolve_executor()?;
        self.dispatch_to(&*executor)
    }

    /// Queue the thunk to the given executor without waiting.  The
    /// thread context is still checked, so this fails if called on a
    /// loop thread.
    pub fn dispatch_to(
        mut self,
        executor: &dyn Executor,
    ) -> Result<Pending<A::Output, A::Error>, ThunkError<A::Error>> {
        ThreadContext::assert_non_executor_thread()?;
        if executor.is_executor_thread() {
            return Err(ThunkError::ThreadContextViolation);
        }

        self.action_keys.push(ActionKey::allocate());
        let cell = Arc::new(Completion::new());
        let pending = Pending {
            cell: cell.clone(),
            keys: self.action_keys.clone(),
        };
        executor.submit(Box::new(Job {
            action: Some(self.action),
            keys: self.action_keys,
            cell,
        }));
        Ok(pending)
    }

    /// Run the action on the calling thread's executor and wait for
    /// it to complete
    pub fn invoke(self) -> Result<A::Output, ThunkError<A::Error>> {
        self.dispatch()?.wait()
    }

    /// Run the action on the given executor and wait for it to
    /// complete
    pub fn invoke_on(self, executor: &dyn Executor) -> Result<A::Output, ThunkError<A::Error>> {
        self.dispatch_to(executor)?.wait()
    }
}

impl<F, T, E> Thunk<FnAction<F>>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    /// Wrap a closure as a thunk
    pub fn from_fn(f: F) -> Self {
        Self::new(FnAction(f))
    }
}

/// Caller side of a dispatched [`Thunk`]
///
/// [`Thunk`]: struct.Thunk.html
pub struct Pending<T, E> {
    cell: Arc<Completion<T, E>>,
    keys: Vec<ActionKey>,
}

impl<T: Send + 'static, E: Send + 'static> Pending<T, E> {
    /// Block until the loop thread has run the action, and return
    /// its result.  If the action panicked, the panic is resumed
    /// here.  If the waiting thread's [`Interrupt`] is raised whilst
    /// still waiting, returns [`ThunkError::InterruptedWait`].  In
    /// that case the action will still run, but its result is
    /// dropped.
    ///
    /// A [`Pending`] may be sent to another thread and waited on
    /// there.  It is then the interrupt of that thread which applies,
    /// not that of the thread which dispatched it.
    ///
    /// [`Interrupt`]: struct.Interrupt.html
    /// [`Pending`]: struct.Pending.html
    /// [`ThunkError::InterruptedWait`]: enum.ThunkError.html#variant.InterruptedWait
    pub fn wait(self) -> Result<T, ThunkError<E>> {
        let cell = self.cell;
        let waiter: Arc<dyn WakeWaiter> = cell.clone();
        let interrupt = ThreadContext::interrupt();
        if let Some(ref intr) = interrupt {
            intr.park(waiter.clone());
        }

        let mut guard = cell.slot.lock().expect("Thunk completion lock poisoned");
        let slot = loop {
            if !matches!(*guard, Slot::Pending) {
                break mem::replace(&mut *guard, Slot::Taken);
            }
            if let Some(ref intr) = interrupt {
                if intr.clear() {
                    // Still pending, so leave it pending
                    break Slot::Pending;
                }
            }
            guard = cell
                .condvar
                .wait(guard)
                .expect("Thunk completion lock poisoned");
        };
        drop(guard);
        if let Some(ref intr) = interrupt {
            intr.unpark(&waiter);
        }

        match slot {
            Slot::Done(Ok(v)) => Ok(v),
            Slot::Done(Err(e)) => Err(ThunkError::Action(e)),
            Slot::Panicked(p) => panic::resume_unwind(p),
            Slot::Abandoned => Err(ThunkError::Abandoned),
            Slot::Pending => Err(ThunkError::InterruptedWait),
            Slot::Taken => unreachable!("Thunk result taken twice"),
        }
    }

    /// Test whether the loop thread has finished with the action,
    /// i.e. whether [`Pending::wait`] would return without blocking
    ///
    /// [`Pending::wait`]: struct.Pending.html#method.wait
    pub fn is_complete(&self) -> bool {
        self.cell.is_complete()
    }

    /// The action keys of the dispatched thunk, oldest first.  The
    /// last one is the key allocated for this dispatch.
    pub fn action_keys(&self) -> &[ActionKey] {
        &self.keys
    }
}
